use anyhow::Context;
use clap::Parser;
use collatz_reach::*;
use std::io::{self, BufWriter, Write};
use tracing_subscriber::EnvFilter;

/// 逆コラッツ列を構成し、2^log2max 未満の到達可能な整数を記録する
#[derive(Parser, Debug)]
#[command(name = "collatz-reach", version, about)]
struct Cli {
    /// 探索上限の2進対数（3〜63）
    #[arg(value_name = "LOG2MAX", default_value_t = config::DEFAULT_LOG2MAX)]
    log2max: u32,

    /// 1ステップごとのトレースを出力する
    #[arg(short, long)]
    debug: bool,

    /// 再帰ではなく作業キューで走査する
    #[arg(short, long)]
    iterative: bool,

    /// 所要時間と最終的な区間一覧を出力する
    #[arg(short, long)]
    verbose: bool,

    /// 作業キューの容量
    #[arg(long, value_name = "N", default_value_t = config::DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// キューが溢れたときの扱い（fail / drop）
    #[arg(long, value_name = "POLICY", default_value_t = OverflowPolicy::Fail)]
    on_overflow: OverflowPolicy,

    /// 進捗表示の間隔（挿入試行の回数）
    #[arg(long, value_name = "N", default_value_t = config::DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.debug {
        "collatz_reach=trace"
    } else if cli.verbose {
        "collatz_reach=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let strategy = if cli.iterative { Strategy::Iterative } else { Strategy::Recursive };
    let config = ExploreConfig::new(cli.log2max)?
        .with_strategy(strategy)
        .with_queue_capacity(cli.queue_capacity)
        .with_overflow(cli.on_overflow)
        .with_progress_interval(cli.progress_interval);

    let mut reporter = ProgressReporter::stderr();
    let result = explore_with_progress(&config, |p| reporter.tick(p))?;
    reporter.finish(&result.progress());

    if cli.verbose {
        tracing::info!(
            covered = result.tree.covered(),
            inserted = result.stats.inserted,
            complete = result.is_complete(),
            "summary"
        );
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        result.tree.write_leaves(&mut out).context("writing interval dump")?;
        out.flush().context("writing interval dump")?;
    }

    Ok(())
}
