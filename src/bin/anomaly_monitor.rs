//! Live anomaly monitor over the shared trade state document
//!
//! Usage: cargo run --bin anomaly_monitor -- --state state/state.json --poll-ms 1000

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rust_anomaly_stream::{load_config, Monitor, MonitorConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time trade stream anomaly monitor")]
struct Args {
    /// Config file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shared state document written by the ingester
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Rolling window size
    #[arg(short, long)]
    window: Option<usize>,

    /// CUSUM slack k
    #[arg(long)]
    cusum_slack: Option<f64>,

    /// CUSUM threshold h
    #[arg(long)]
    cusum_threshold: Option<f64>,

    /// Number of recent prices the outlier model is trained on
    #[arg(long)]
    retrain_window: Option<usize>,

    /// Expected anomaly fraction for the outlier model
    #[arg(long)]
    contamination: Option<f64>,

    /// Polling interval in milliseconds
    #[arg(short, long)]
    poll_ms: Option<u64>,

    /// Run for N cycles (0 = until interrupted)
    #[arg(long, default_value_t = 0)]
    iterations: usize,
}

impl Args {
    fn into_config(self) -> Result<(MonitorConfig, usize)> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => MonitorConfig::default(),
        };

        if let Some(state) = self.state {
            config.state_path = state;
        }
        if let Some(window) = self.window {
            config.window_size = window;
        }
        if let Some(slack) = self.cusum_slack {
            config.cusum.slack = slack;
        }
        if let Some(threshold) = self.cusum_threshold {
            config.cusum.threshold = threshold;
        }
        if let Some(retrain_window) = self.retrain_window {
            config.outlier.retrain_window = retrain_window;
        }
        if let Some(contamination) = self.contamination {
            config.outlier.contamination = contamination;
        }
        if let Some(poll_ms) = self.poll_ms {
            config.poll_interval_ms = poll_ms;
        }

        Ok((config, self.iterations))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let (config, iterations) = Args::parse().into_config()?;
    let mut monitor = Monitor::new(config).context("invalid monitor configuration")?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl-C handler")?;

    let max_cycles = (iterations > 0).then_some(iterations);
    let summary = monitor.run(&running, max_cycles);

    if !running.load(Ordering::SeqCst) {
        info!("interrupted, analyzer stopped");
    }
    info!(
        cycles = summary.cycles,
        decisions = summary.decisions,
        anomalies = summary.anomalies,
        failed = summary.failed_cycles,
        "summary"
    );

    Ok(())
}
