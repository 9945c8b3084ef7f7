//! gesture-stream - hand-landmark gesture classification pipeline
//!
//! Reads hand detections, classifies per-hand gestures and streams one
//! JSON object per frame to a single TCP client.

mod config;
mod hand;
mod ipc;
mod pipeline;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use config::{Config, ConfigWatcher, SharedConfig};
use ipc::PublisherListener;
use pipeline::source::{RecordedDetections, ReplaySource};
use pipeline::{PipelineOptions, StopSignal};

#[derive(Parser, Debug)]
#[command(name = "gesture-stream", about = "Hand gesture classification stream")]
struct Cli {
    /// JSON config file, watched for changes
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address the publisher listens on
    #[arg(long, default_value = ipc::DEFAULT_BIND)]
    bind: String,

    /// Recorded detections to replay (newline-delimited JSON)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Pace replay by recorded timestamps
    #[arg(long)]
    realtime: bool,

    /// Consumer wait on an empty queue, in milliseconds
    #[arg(long, default_value_t = 100)]
    queue_timeout_ms: u64,

    /// Minimum interval between config file checks, in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_RELOAD_INTERVAL.as_millis() as u64)]
    reload_interval_ms: u64,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("gesture-stream {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_stream=info".into()),
        )
        .init();

    info!("gesture-stream v{} starting", env!("CARGO_PKG_VERSION"));
    pipeline::install_signal_handlers();

    let (initial, watcher) = match cli.config {
        Some(path) => {
            let mut watcher =
                ConfigWatcher::new(path, Duration::from_millis(cli.reload_interval_ms));
            let cfg = watcher.initial();
            info!(path = %watcher.path().display(), "config loaded");
            (cfg, Some(watcher))
        }
        None => {
            warn!("no --config given; using defaults without hot reload");
            (Config::default(), None)
        }
    };
    let shared = SharedConfig::new(initial);

    let replay = cli
        .replay
        .context("no frame source: pass --replay <file> with recorded detections")?;
    let source = ReplaySource::open(&replay, cli.realtime)?;
    let listener = PublisherListener::bind(&cli.bind)?;

    let options = PipelineOptions {
        queue_timeout: Duration::from_millis(cli.queue_timeout_ms),
    };
    let summary = pipeline::run(
        source,
        RecordedDetections,
        |stop: &StopSignal| listener.accept_one(stop),
        shared,
        watcher,
        options,
        StopSignal::new(),
    )?;

    info!(
        captured = summary.capture.frames,
        dropped = summary.capture.dropped,
        published = summary.classifier.published,
        "gesture-stream exiting"
    );
    Ok(())
}
