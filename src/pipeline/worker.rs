//! The two pipeline workers.
//!
//! The capture worker owns the frame source, the detector and the feature
//! extractor; the classifier worker owns the classifier, the config
//! watcher and the publisher. Frames move between them through a
//! [`LatestSlot`] and nothing else is shared except the config snapshot.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::frame_rate::FrameRate;
use super::slot::LatestSlot;
use super::source::{FrameSource, Grab, LandmarkDetector};
use super::{Frame, StopSignal};
use crate::config::{ConfigReader, ConfigWatcher, SharedConfig};
use crate::hand::{FeatureExtractor, GestureClassifier, HandRecord, TrackingKey};
use crate::ipc::{FramePacket, StreamPublisher};

// ── Capture ────────────────────────────────────────────────

/// Counters reported by the capture worker on exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    /// Frames overwritten in the slot before the classifier took them.
    pub dropped: u64,
}

/// Grab, detect and extract until the source ends or `stop` is raised.
pub fn run_capture<S, D>(
    source: &mut S,
    detector: &mut D,
    slot: &LatestSlot<Frame>,
    mut config: ConfigReader,
    stop: &StopSignal,
) -> anyhow::Result<CaptureStats>
where
    S: FrameSource,
    D: LandmarkDetector<S::Image>,
{
    let cfg = config.snapshot();
    let mut extractor = FeatureExtractor::from_config(&cfg.classifier);
    let mut frame_rate = FrameRate::new(cfg.pipeline.fps_window);
    let mut stats = CaptureStats::default();

    info!("capture worker started");
    let result = loop {
        if stop.is_raised() {
            break Ok(());
        }
        let cfg = config.snapshot();
        extractor.configure(&cfg.classifier);
        frame_rate.set_window(cfg.pipeline.fps_window);

        let captured = match source.grab() {
            Ok(Grab::Frame(captured)) => captured,
            Ok(Grab::Exhausted) => {
                info!(frames = stats.frames, "source exhausted");
                stop.raise();
                break Ok(());
            }
            Err(e) => break Err(e),
        };

        let observations = match detector.detect(&captured.image, captured.timestamp) {
            Ok(obs) => obs,
            Err(e) => break Err(e),
        };
        let fps = frame_rate.record_frame(captured.timestamp);
        let hands = observations
            .into_iter()
            .enumerate()
            .map(|(slot_index, obs)| {
                let key = TrackingKey::for_slot(obs.handedness, slot_index);
                let features = extractor.extract(&obs, &key);
                HandRecord::new(obs, slot_index).with_features(features)
            })
            .collect();

        stats.frames += 1;
        let frame = Frame {
            sequence: stats.frames,
            timestamp: captured.timestamp,
            fps,
            hands,
        };
        if let Some(old) = slot.put(frame) {
            stats.dropped += 1;
            debug!(sequence = old.sequence, "frame overwritten before classification");
        }
    };

    source.close();
    info!(frames = stats.frames, dropped = stats.dropped, "capture worker stopped");
    result.map(|()| stats)
}

// ── Classifier ─────────────────────────────────────────────

/// Counters reported by the classifier worker on exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierStats {
    pub frames: u64,
    pub published: u64,
}

/// Per-frame state of the classifier worker.
struct Classification<W: Write> {
    classifier: GestureClassifier,
    config: ConfigReader,
    publisher: StreamPublisher<W>,
    /// Last timestamp seen per hand key, for `dt`.
    last_seen: HashMap<TrackingKey, f64>,
    stats: ClassifierStats,
}

impl<W: Write> Classification<W> {
    fn process(&mut self, mut frame: Frame) -> std::io::Result<()> {
        let cfg = self.config.snapshot();
        frame.hands.truncate(cfg.pipeline.max_hands);
        for hand in frame.hands.iter_mut() {
            let t = hand.timestamp();
            if let Some(prev) = self.last_seen.insert(hand.key(), t) {
                hand.dt = t - prev;
            }
        }

        debug!(
            sequence = frame.sequence,
            timestamp = frame.timestamp,
            hands = frame.hands.len(),
            "classifying frame"
        );
        self.classifier.classify_frame(&mut frame.hands, &cfg);
        self.stats.frames += 1;
        if frame.hands.is_empty() {
            return Ok(());
        }

        self.publisher.publish(&FramePacket::new(&frame.hands, frame.fps))?;
        self.stats.published = self.publisher.sent();
        Ok(())
    }
}

/// Classify and publish frames until `stop` is raised.
///
/// `connect` yields the outbound stream; `None` means the stop signal
/// arrived while waiting for it. A failed send raises `stop` and returns
/// the error.
pub fn run_classifier<W, C>(
    slot: &LatestSlot<Frame>,
    shared: &SharedConfig,
    mut watcher: Option<ConfigWatcher>,
    connect: C,
    queue_timeout: Duration,
    stop: &StopSignal,
) -> anyhow::Result<ClassifierStats>
where
    W: Write,
    C: FnOnce(&StopSignal) -> anyhow::Result<Option<W>>,
{
    let Some(writer) = connect(stop)? else {
        info!("classifier worker stopped before a client connected");
        return Ok(ClassifierStats::default());
    };

    let mut config = shared.reader();
    let mut work = Classification {
        classifier: GestureClassifier::new(config.snapshot()),
        config,
        publisher: StreamPublisher::new(writer),
        last_seen: HashMap::new(),
        stats: ClassifierStats::default(),
    };

    info!("classifier worker started");
    while !stop.is_raised() {
        if let Some(w) = watcher.as_mut() {
            w.poll(shared);
        }
        let Some(frame) = slot.take_timeout(queue_timeout) else {
            continue;
        };
        if let Err(e) = work.process(frame) {
            error!("publish failed: {}", e);
            stop.raise();
            return Err(anyhow::Error::new(e).context("client disconnected"));
        }
    }

    // The capture worker may have handed over a last frame before stopping.
    if let Some(frame) = slot.try_take() {
        if let Err(e) = work.process(frame) {
            warn!("publish of final frame failed: {}", e);
        }
    }

    info!(
        frames = work.stats.frames,
        published = work.stats.published,
        "classifier worker stopped"
    );
    Ok(work.stats)
}
