use collatz_reach::*;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

fn run(log2max: u32, strategy: Strategy) -> ExploreResult {
    let config = ExploreConfig::new(log2max).unwrap().with_strategy(strategy);
    explore(&config).unwrap()
}

fn leaves(result: &ExploreResult) -> Vec<RangeInclusive<u64>> {
    result.tree.leaves().collect()
}

/// 集合を使った素朴な到達可能性の計算
fn reachable_model(stop: u64) -> BTreeSet<u64> {
    let mut seen: BTreeSet<u64> = [1, 2].into_iter().collect();
    let mut pending = vec![4u64];
    while let Some(n) = pending.pop() {
        if n >= stop || !seen.insert(n) {
            continue;
        }
        pending.extend(predecessors(n));
    }
    seen
}

fn runs(set: &BTreeSet<u64>) -> Vec<RangeInclusive<u64>> {
    let mut out: Vec<RangeInclusive<u64>> = Vec::new();
    for &v in set {
        match out.last_mut() {
            Some(r) if *r.end() + 1 == v => *r = *r.start()..=v,
            _ => out.push(v..=v),
        }
    }
    out
}

// ===== シナリオ =====

#[test]
fn test_scenario_stop_8() {
    for strategy in [Strategy::Recursive, Strategy::Iterative] {
        let result = run(3, strategy);
        assert_eq!(result.stop, 8);
        assert_eq!(leaves(&result), vec![1..=2, 4..=4], "{}", strategy);
        assert_eq!(result.tree.covered(), 3);
        assert_eq!(result.tree.span(), 4);
        assert_eq!(result.tree.coverage_percent(), 75);
        assert_eq!(result.tree.proven_last(), Some(2));
        assert_eq!(result.stats.inserted, 1);
        assert_eq!(result.stats.pruned_bound, 1);
        assert_eq!(result.stats.pruned_visited, 1);
        assert_eq!(result.stats.attempts, 3);
        result.tree.validate().unwrap();
    }
}

#[test]
fn test_scenario_stop_16_strategies_agree() {
    let r = run(4, Strategy::Recursive);
    let i = run(4, Strategy::Iterative);
    assert_eq!(leaves(&r), vec![1..=2, 4..=4, 8..=8]);
    assert_eq!(leaves(&r), leaves(&i));
    assert_eq!(r.tree.covered(), 4);
    assert_eq!(r.tree.covered(), i.tree.covered());
}

#[test]
fn test_recursion_depth_statistic() {
    // 4 -> 8 -> 16（刈り）で深さ 3、4 -> 1 で深さ 2
    let result = run(4, Strategy::Recursive);
    assert_eq!(result.stats.max_recursion, 3);
    assert_eq!(result.progress().depth, 3);
    assert_eq!(result.progress().strategy, Strategy::Recursive);
}

#[test]
fn test_queue_depth_statistic() {
    let result = run(3, Strategy::Iterative);
    assert_eq!(result.stats.peak_queue_depth, 2);
    assert_eq!(result.stats.queue_depth, 0);
}

// ===== 境界 =====

#[test]
fn test_stop_is_exclusive() {
    for log2max in 3..=12 {
        let result = run(log2max, Strategy::Recursive);
        let stop = result.stop;
        assert!(!result.tree.lookup(stop), "stop {} must be pruned", stop);
        assert!(result.tree.lookup(stop / 2), "{} must be recorded", stop / 2);
        assert!(result.tree.last() < stop);
        assert!(result.stats.pruned_bound > 0);
    }
}

// ===== 正しさ =====

#[test]
fn test_matches_set_model() {
    for log2max in 3..=16 {
        let stop = 1u64 << log2max;
        let model = reachable_model(stop);
        for strategy in [Strategy::Recursive, Strategy::Iterative] {
            let result = run(log2max, strategy);
            assert_eq!(result.tree.covered(), model.len() as u64, "log2max={} {}", log2max, strategy);
            assert_eq!(leaves(&result), runs(&model), "log2max={} {}", log2max, strategy);
            assert_eq!(result.stats.inserted + 2, model.len() as u64);
            result.tree.validate().unwrap();
        }
    }
}

#[test]
fn test_strategies_agree_on_larger_bound() {
    let r = run(18, Strategy::Recursive);
    let i = run(18, Strategy::Iterative);
    assert_eq!(r.tree.covered(), i.tree.covered());
    assert_eq!(leaves(&r), leaves(&i));
    assert_eq!(r.tree.proven_last(), i.tree.proven_last());
    assert!(r.is_complete() && i.is_complete());
}

#[test]
fn test_proven_prefix_grows() {
    let result = run(20, Strategy::Recursive);
    let proven = result.tree.proven_last().unwrap();
    assert!(proven > 2);
    for v in 1..=proven {
        assert!(result.tree.lookup(v), "{} in proven prefix", v);
    }
    assert!(!result.tree.lookup(proven + 1));
}

// ===== キュー溢れ =====

#[test]
fn test_queue_overflow_fails_by_default() {
    let config = ExploreConfig::new(4)
        .unwrap()
        .with_strategy(Strategy::Iterative)
        .with_queue_capacity(1);
    match explore(&config) {
        Err(ExploreError::QueueOverflow { value, capacity }) => {
            assert_eq!(value, 1);
            assert_eq!(capacity, 1);
        }
        other => panic!("expected overflow, got {:?}", other.map(|r| r.stats)),
    }
}

#[test]
fn test_queue_overflow_drop_is_counted() {
    let config = ExploreConfig::new(4)
        .unwrap()
        .with_strategy(Strategy::Iterative)
        .with_queue_capacity(1)
        .with_overflow(OverflowPolicy::Drop);
    let result = explore(&config).unwrap();
    assert_eq!(result.stats.dropped, 1);
    assert!(!result.is_complete());
    assert_eq!(leaves(&result), vec![1..=2, 4..=4, 8..=8]);
}

// ===== 設定・進捗 =====

#[test]
fn test_invalid_config_is_rejected_before_exploring() {
    let config = ExploreConfig::new(10).unwrap().with_queue_capacity(0);
    assert!(matches!(
        explore(&config),
        Err(ExploreError::Config(ConfigError::ZeroQueueCapacity))
    ));
    assert!(ExploreConfig::new(64).is_err());
}

#[test]
fn test_progress_callback_interval() {
    let config = ExploreConfig::new(10).unwrap().with_progress_interval(1);
    let mut calls = 0u64;
    let result = explore_with_progress(&config, |p| {
        calls += 1;
        assert!(p.percent <= 100);
        assert!(p.proven_last >= 2);
    })
    .unwrap();
    assert_eq!(calls, result.stats.attempts);

    let config = ExploreConfig::new(10).unwrap().with_progress_interval(16);
    let mut calls = 0u64;
    let result = explore_with_progress(&config, |_| calls += 1).unwrap();
    assert_eq!(calls, result.stats.attempts / 16);
}

#[test]
fn test_reporter_prints_final_line() {
    let result = run(3, Strategy::Recursive);
    let mut reporter = ProgressReporter::new(Vec::new(), true);
    reporter.finish(&result.progress());
    let out = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(out.contains(" 75% [1, 2] (n         3 d         1 r         2)"), "{:?}", out);
}
