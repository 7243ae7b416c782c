//! Replay scripted GraphQL traffic through the operation monitor and report
//! what it measured.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use clap::Parser;
use opwatch::{
    Config, Monitor,
    clock::TokioClock,
    config,
    replay::{self, Script},
};
use serde_json::json;
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("Replay script error: {0}")]
    Replay(#[from] replay::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the replay script
    script: PathBuf,
    /// Path to the monitor configuration, defaults apply when absent
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Print statistics as JSON on stdout instead of logging a report
    #[clap(long)]
    json: bool,
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let script = Script::from_path(&args.script)?;
    info!(
        operations = script.total_operations(),
        max_metrics = config.max_metrics.get(),
        slow_query_threshold_ms = config.slow_query_threshold_ms,
        "Starting opwatch replay"
    );

    let runtime = Builder::new_current_thread().enable_time().build()?;
    let monitor = runtime.block_on(async {
        let monitor = Monitor::with_clock(config, TokioClock::default());
        let summary = replay::run(&script, &monitor).await;
        info!(
            operations = summary.operations,
            results = summary.results,
            graphql_errors = summary.graphql_errors,
            transport_errors = summary.transport_errors,
            "Replay complete"
        );
        monitor
    });

    if args.json {
        let report = json!({
            "stats": monitor.performance_stats(),
            "operations": monitor.operation_summaries(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        monitor.log_performance_report();
        for summary in monitor.operation_summaries() {
            info!("{summary}");
        }
    }

    Ok(())
}
