//! 逆コラッツ写像のグラフを走査し、到達した整数を区間木に記録する。
//!
//! n の前者は 2n（常に）と (n-1)/3（(n-1) mod 6 == 3 のときのみ）。
//! (n-1) mod 6 == 0 のとき (n-1)/3 は偶数になり、3x+1 で n には来ない。
//!
//! 1 と 2 を既知として記録し、4 から走査を始める。上限 stop 以上の値と
//! 既に記録済みの値で枝を刈る。
//!
//! 再帰版は明示的なフレームスタックで深さ優先に進む（訪問順は再帰呼び出しと
//! 同じ）。反復版は固定容量の作業キューを使う。どちらもキューが溢れない限り
//! 同じ葉集合に到達する。

use std::collections::TryReserveError;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, ExploreConfig, OverflowPolicy, Strategy};
use crate::progress::Progress;
use crate::range_tree::RangeTree;
use crate::work_queue::{QueueFull, WorkQueue};

/// 走査開始値（2 の次に 2 へ到達する数）
pub const FIRST_CANDIDATE: u64 = 4;

#[derive(Debug, Error)]
pub enum ExploreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("work queue overflowed (capacity {capacity}) while appending {value}")]
    QueueOverflow { value: u64, capacity: usize },
    #[error("failed to allocate a work queue of {capacity} slots")]
    QueueAlloc {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },
}

/// 走査の統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExploreStats {
    /// 調べた候補の総数（刈られたものを含む）
    pub attempts: u64,
    /// 新たに記録した値
    pub inserted: u64,
    /// stop 以上で刈った候補
    pub pruned_bound: u64,
    /// 記録済みで刈った候補
    pub pruned_visited: u64,
    /// 最大再帰深さ（再帰版）
    pub max_recursion: u64,
    /// 現在のキュー長（反復版）
    pub queue_depth: usize,
    pub peak_queue_depth: usize,
    /// キュー満杯で捨てた候補（OverflowPolicy::Drop のとき）
    pub dropped: u64,
}

/// 走査結果
#[derive(Debug, Clone)]
pub struct ExploreResult {
    pub tree: RangeTree<u64>,
    pub stats: ExploreStats,
    pub strategy: Strategy,
    pub stop: u64,
    pub elapsed: Duration,
}

impl ExploreResult {
    pub fn progress(&self) -> Progress {
        snapshot(&self.tree, &self.stats, self.strategy)
    }

    /// 候補を1つも捨てずに走査を終えたか
    pub fn is_complete(&self) -> bool {
        self.stats.dropped == 0
    }
}

/// (n-1)/3 が奇数の前者になるならそれを返す。
#[inline]
pub fn odd_predecessor(n: u64) -> Option<u64> {
    let m = n.checked_sub(1)?;
    (m % 6 == 3).then_some(m / 3)
}

/// n の前者（2n と、条件を満たせば (n-1)/3）
pub fn predecessors(n: u64) -> impl Iterator<Item = u64> {
    n.checked_mul(2).into_iter().chain(odd_predecessor(n))
}

fn snapshot(tree: &RangeTree<u64>, stats: &ExploreStats, strategy: Strategy) -> Progress {
    Progress {
        percent: tree.coverage_percent(),
        proven_last: tree.proven_last().unwrap_or(0),
        nodes: tree.node_count(),
        max_depth: tree.max_depth(),
        strategy,
        depth: match strategy {
            Strategy::Recursive => stats.max_recursion,
            Strategy::Iterative => stats.queue_depth as u64,
        },
    }
}

/// 1回の走査の状態
struct Exploration<'a, F> {
    config: &'a ExploreConfig,
    stop: u64,
    tree: RangeTree<u64>,
    stats: ExploreStats,
    on_progress: F,
    countdown: u64,
}

impl<'a, F: FnMut(&Progress)> Exploration<'a, F> {
    fn new(config: &'a ExploreConfig, on_progress: F) -> Self {
        Exploration {
            config,
            stop: config.stop(),
            tree: RangeTree::new(1, 2),
            stats: ExploreStats::default(),
            on_progress,
            countdown: config.progress_interval,
        }
    }

    fn tick(&mut self) {
        self.stats.attempts += 1;
        self.countdown -= 1;
        if self.countdown == 0 {
            self.countdown = self.config.progress_interval;
            let progress = snapshot(&self.tree, &self.stats, self.config.strategy);
            (self.on_progress)(&progress);
        }
    }

    /// 候補 n を記録する。さらに前者を辿るべきなら true。
    fn visit(&mut self, n: u64) -> bool {
        self.tick();
        trace!(n, attempt = self.stats.attempts, "visiting");
        if n >= self.stop {
            trace!(n, "beyond stop");
            self.stats.pruned_bound += 1;
            return false;
        }
        if self.tree.insert_value(n) {
            self.stats.pruned_visited += 1;
            return false;
        }
        self.stats.inserted += 1;
        true
    }

    fn run_recursive(&mut self) {
        // (値, 再帰深さ)。2n を後に積むので先に処理される
        let mut frames: Vec<(u64, u64)> = vec![(FIRST_CANDIDATE, 1)];
        while let Some((n, depth)) = frames.pop() {
            self.stats.max_recursion = self.stats.max_recursion.max(depth);
            if !self.visit(n) {
                continue;
            }
            if let Some(p) = odd_predecessor(n) {
                frames.push((p, depth + 1));
            }
            frames.push((n * 2, depth + 1));
        }
    }

    fn run_iterative(&mut self) -> Result<(), ExploreError> {
        let capacity = self.config.queue_capacity;
        let mut queue = WorkQueue::with_capacity(capacity)
            .map_err(|source| ExploreError::QueueAlloc { capacity, source })?;

        self.enqueue(&mut queue, FIRST_CANDIDATE)?;
        while let Some(n) = queue.fetch() {
            self.stats.queue_depth = queue.len();
            if !self.visit(n) {
                continue;
            }
            self.enqueue(&mut queue, n * 2)?;
            if let Some(p) = odd_predecessor(n) {
                self.enqueue(&mut queue, p)?;
            }
        }
        self.stats.queue_depth = 0;
        Ok(())
    }

    fn enqueue(&mut self, queue: &mut WorkQueue<u64>, value: u64) -> Result<(), ExploreError> {
        match queue.append(value) {
            Ok(()) => {
                self.stats.queue_depth = queue.len();
                self.stats.peak_queue_depth = self.stats.peak_queue_depth.max(queue.len());
                Ok(())
            }
            Err(QueueFull(value)) => match self.config.overflow {
                OverflowPolicy::Fail => Err(ExploreError::QueueOverflow {
                    value,
                    capacity: queue.capacity(),
                }),
                OverflowPolicy::Drop => {
                    if self.stats.dropped == 0 {
                        warn!(value, capacity = queue.capacity(), "work queue full, dropping candidates");
                    }
                    self.stats.dropped += 1;
                    Ok(())
                }
            },
        }
    }
}

/// 進捗表示なしで走査する。
pub fn explore(config: &ExploreConfig) -> Result<ExploreResult, ExploreError> {
    explore_with_progress(config, |_| {})
}

/// 走査し、`progress_interval` 回の試行ごとに on_progress を呼ぶ。
pub fn explore_with_progress(
    config: &ExploreConfig,
    on_progress: impl FnMut(&Progress),
) -> Result<ExploreResult, ExploreError> {
    config.validate()?;

    let timer = Instant::now();
    info!("stop at {}", config.stop());
    debug!(strategy = %config.strategy, "exploring");

    let mut exploration = Exploration::new(config, on_progress);
    match config.strategy {
        Strategy::Recursive => exploration.run_recursive(),
        Strategy::Iterative => exploration.run_iterative()?,
    }

    let elapsed = timer.elapsed();
    info!("done in {}.{:03} s", elapsed.as_secs(), elapsed.subsec_millis());

    let Exploration { tree, stats, .. } = exploration;
    debug!(
        covered = tree.covered(),
        nodes = tree.node_count(),
        peak_nodes = tree.peak_node_count(),
        attempts = stats.attempts,
        "exploration finished"
    );
    if stats.dropped > 0 {
        warn!(dropped = stats.dropped, "work queue overflowed; result may be incomplete");
    }

    Ok(ExploreResult {
        tree,
        stats,
        strategy: config.strategy,
        stop: config.stop(),
        elapsed,
    })
}
