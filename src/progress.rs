//! 端末への進捗表示。
//!
//! 一定回数の挿入試行ごとに1行を上書き表示し、終了時に改行付きで確定する。
//! 出力先が端末でなければ何も書かない。

use std::io::{self, IsTerminal, Write};

use tracing::debug;

use crate::config::Strategy;

/// 進捗表示に使う木と探索の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 根の区間のうち記録済みの割合（%）
    pub percent: u32,
    /// 1 から欠番なしで到達済みの最大値
    pub proven_last: u64,
    pub nodes: usize,
    pub max_depth: u32,
    pub strategy: Strategy,
    /// 反復版は現在のキュー長、再帰版は最大再帰深さ
    pub depth: u64,
}

/// `[1, proven]` とノード数・深さを並べた1行
pub fn format_line(p: &Progress) -> String {
    format!(
        "{:3}% [1, {}] (n {:9} d {:9} {} {:9})",
        p.percent,
        p.proven_last,
        p.nodes,
        p.max_depth,
        p.strategy.tag(),
        p.depth
    )
}

pub struct ProgressReporter<W: Write> {
    out: W,
    enabled: bool,
}

impl ProgressReporter<io::Stderr> {
    /// 標準エラー出力が端末のときだけ表示する。
    pub fn stderr() -> Self {
        let out = io::stderr();
        let enabled = out.is_terminal();
        ProgressReporter { out, enabled }
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, enabled: bool) -> Self {
        ProgressReporter { out, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 途中経過（行を上書き）
    pub fn tick(&mut self, progress: &Progress) {
        if self.enabled {
            let written = write!(self.out, "\x1b[2K\r{}", format_line(progress)).and_then(|()| self.out.flush());
            self.disable_on_error(written);
        }
    }

    /// 最終行（改行で確定）
    pub fn finish(&mut self, progress: &Progress) {
        if self.enabled {
            let written = writeln!(self.out, "\x1b[2K\r{}", format_line(progress)).and_then(|()| self.out.flush());
            self.disable_on_error(written);
        }
    }

    // 書き込みに一度失敗したら以後は何も書かない（探索は続行する）
    fn disable_on_error(&mut self, written: io::Result<()>) {
        if let Err(err) = written {
            debug!(%err, "progress output failed, disabling");
            self.enabled = false;
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
