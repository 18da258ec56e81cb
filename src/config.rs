//! 探索の設定。上限は 2^log2max（log2max ∈ [3, 63]）。

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const MIN_LOG2MAX: u32 = 3;
pub const MAX_LOG2MAX: u32 = 63;
pub const DEFAULT_LOG2MAX: u32 = 30;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1 << 20;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1 << 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("log2max must be between 3 and 63 (got {0})")]
    Log2MaxOutOfRange(u32),
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("progress interval must be at least 1")]
    ZeroProgressInterval,
    #[error("unknown {kind}: {value}")]
    UnknownName { kind: &'static str, value: String },
}

/// 逆写像グラフの走査方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// 深さ優先（再帰と同じ訪問順）。統計は最大再帰深さ。
    #[default]
    Recursive,
    /// 作業キューによる走査。統計はキュー長。
    Iterative,
}

impl Strategy {
    /// 進捗行で使う1文字（r / q）
    pub fn tag(self) -> char {
        match self {
            Strategy::Recursive => 'r',
            Strategy::Iterative => 'q',
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Recursive => "recursive",
            Strategy::Iterative => "iterative",
        })
    }
}

/// キューが満杯のときの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// 探索をエラーで打ち切る
    #[default]
    Fail,
    /// 溢れた候補を捨てて続行する（結果は不完全になりうる）
    Drop,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(OverflowPolicy::Fail),
            "drop" => Ok(OverflowPolicy::Drop),
            other => Err(ConfigError::UnknownName { kind: "overflow policy", value: other.to_string() }),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverflowPolicy::Fail => "fail",
            OverflowPolicy::Drop => "drop",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreConfig {
    log2max: u32,
    pub strategy: Strategy,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
    pub progress_interval: u64,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        ExploreConfig {
            log2max: DEFAULT_LOG2MAX,
            strategy: Strategy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ExploreConfig {
    /// 上限 2^log2max の設定を作る。範囲外ならエラー。
    pub fn new(log2max: u32) -> Result<Self, ConfigError> {
        if !(MIN_LOG2MAX..=MAX_LOG2MAX).contains(&log2max) {
            return Err(ConfigError::Log2MaxOutOfRange(log2max));
        }
        Ok(ExploreConfig { log2max, ..Default::default() })
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn log2max(&self) -> u32 {
        self.log2max
    }

    /// 探索の上限（この値以上は記録しない）
    pub fn stop(&self) -> u64 {
        1u64 << self.log2max
    }

    /// 公開フィールドを書き換えた後の再検査
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_LOG2MAX..=MAX_LOG2MAX).contains(&self.log2max) {
            return Err(ConfigError::Log2MaxOutOfRange(self.log2max));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::ZeroProgressInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log2max_bounds() {
        assert_eq!(ExploreConfig::new(2), Err(ConfigError::Log2MaxOutOfRange(2)));
        assert_eq!(ExploreConfig::new(64), Err(ConfigError::Log2MaxOutOfRange(64)));
        assert_eq!(ExploreConfig::new(3).unwrap().stop(), 8);
        assert_eq!(ExploreConfig::new(63).unwrap().stop(), 1 << 63);
        assert_eq!(ExploreConfig::default().stop(), 1 << 30);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = ExploreConfig::new(10).unwrap().with_queue_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueCapacity));
        let config = ExploreConfig::new(10).unwrap().with_progress_interval(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroProgressInterval));
    }

    #[test]
    fn test_overflow_policy_names() {
        assert_eq!("drop".parse::<OverflowPolicy>(), Ok(OverflowPolicy::Drop));
        assert_eq!("fail".parse::<OverflowPolicy>(), Ok(OverflowPolicy::Fail));
        assert!("retry".parse::<OverflowPolicy>().is_err());
    }
}
