//! Two-stage pipeline: capture worker → single-slot queue → classifier
//! worker → stream publisher.
//!
//! Supports graceful signal handling (SIGINT/SIGTERM raise the shared
//! stop signal) and config hot reload polled by the classifier worker.

pub mod frame_rate;
pub mod slot;
pub mod source;
pub mod worker;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use tracing::info;

use crate::config::{ConfigWatcher, SharedConfig};
use crate::hand::HandRecord;
use slot::LatestSlot;
use source::{FrameSource, LandmarkDetector};
use worker::{CaptureStats, ClassifierStats};

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

// ── Stop signal ────────────────────────────────────────────

/// Shared cancellation flag checked by both workers between iterations.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once raised here or by a process signal.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst) || SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
    }
}

// ── Frame ──────────────────────────────────────────────────

/// Everything the capture worker hands to the classifier for one frame.
#[derive(Debug)]
pub struct Frame {
    /// 1-based capture counter.
    pub sequence: u64,
    pub timestamp: f64,
    pub fps: f64,
    pub hands: Vec<HandRecord>,
}

// ── Run ────────────────────────────────────────────────────

/// Tunables for [`run`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// How long the classifier waits on an empty slot before re-checking.
    pub queue_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            queue_timeout: Duration::from_millis(100),
        }
    }
}

/// Totals from both workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub capture: CaptureStats,
    pub classifier: ClassifierStats,
}

/// Run both workers to completion.
///
/// Returns when the source is exhausted, `stop` is raised, or either
/// worker fails; a failure in one worker stops the other.
pub fn run<S, D, W, C>(
    mut source: S,
    mut detector: D,
    connect: C,
    config: SharedConfig,
    watcher: Option<ConfigWatcher>,
    options: PipelineOptions,
    stop: StopSignal,
) -> anyhow::Result<PipelineSummary>
where
    S: FrameSource,
    D: LandmarkDetector<S::Image>,
    W: Write,
    C: FnOnce(&StopSignal) -> anyhow::Result<Option<W>> + Send,
{
    let slot = LatestSlot::new();
    let capture_reader = config.reader();

    let (capture, classifier) = thread::scope(|scope| -> anyhow::Result<_> {
        let capture = thread::Builder::new()
            .name("capture".into())
            .spawn_scoped(scope, || {
                let result =
                    worker::run_capture(&mut source, &mut detector, &slot, capture_reader, &stop);
                if result.is_err() {
                    stop.raise();
                }
                result
            })?;

        let classifier = thread::Builder::new()
            .name("classifier".into())
            .spawn_scoped(scope, || {
                let result = worker::run_classifier(
                    &slot,
                    &config,
                    watcher,
                    connect,
                    options.queue_timeout,
                    &stop,
                );
                stop.raise();
                result
            })?;

        let capture = capture
            .join()
            .map_err(|_| anyhow!("capture worker panicked"))?;
        let classifier = classifier
            .join()
            .map_err(|_| anyhow!("classifier worker panicked"))?;
        Ok((capture, classifier))
    })?;

    let summary = PipelineSummary {
        capture: capture?,
        classifier: classifier?,
    };
    info!(?summary, "pipeline finished");
    Ok(summary)
}
