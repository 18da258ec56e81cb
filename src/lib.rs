//! 逆コラッツ写像による到達可能性の探索
//!
//! 1 から逆向きに辿れる列をすべて構成し、上限 2^log2max 未満で到達した
//! 整数を区間木（互いに素で隣接しない区間の二分木）に記録する。
//! 到達集合はほぼ連続になるため、ハッシュ集合ではなく区間で圧縮して持つ。

pub mod config;
pub mod explorer;
pub mod progress;
pub mod range_tree;
pub mod work_queue;

pub use config::{ConfigError, ExploreConfig, OverflowPolicy, Strategy};
pub use explorer::{explore, explore_with_progress, odd_predecessor, predecessors, ExploreError, ExploreResult, ExploreStats};
pub use progress::{format_line, Progress, ProgressReporter};
pub use range_tree::{InvariantViolation, Leaves, RangeTree, RangeValue, TreeStats};
pub use work_queue::{QueueFull, WorkQueue};
