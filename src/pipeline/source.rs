//! Frame acquisition seams and the recorded-stream source.
//!
//! Capture and landmark detection are external collaborators: the capture
//! worker only sees a [`FrameSource`] yielding images and a
//! [`LandmarkDetector`] turning an image into hand observations.
//! [`ReplaySource`] plays back newline-delimited JSON detections, paired
//! with [`RecordedDetections`], which passes them through unchanged.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::hand::HandObservation;

/// One image from a source with its capture time (monotonic seconds).
#[derive(Debug, Clone)]
pub struct CapturedFrame<I> {
    pub image: I,
    pub timestamp: f64,
}

/// Outcome of one acquisition attempt.
#[derive(Debug)]
pub enum Grab<I> {
    Frame(CapturedFrame<I>),
    /// The source has ended for good.
    Exhausted,
}

/// Anything producing frames for the capture worker.
pub trait FrameSource: Send {
    type Image;

    fn grab(&mut self) -> anyhow::Result<Grab<Self::Image>>;

    /// Release capture resources. Called once when the worker stops.
    fn close(&mut self) {}
}

/// Black-box hand detector.
pub trait LandmarkDetector<I>: Send {
    fn detect(&mut self, image: &I, timestamp: f64) -> anyhow::Result<Vec<HandObservation>>;
}

// ── Replay ─────────────────────────────────────────────────

/// One line of a recorded stream.
#[derive(Debug, Deserialize)]
struct RecordedFrame {
    /// Seconds; wall-clock time since opening is used when absent.
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    hands: Vec<HandObservation>,
}

/// Plays back recorded detections, one JSON object per line.
pub struct ReplaySource<R> {
    reader: R,
    line: String,
    line_no: usize,
    realtime: bool,
    opened: Instant,
    /// First recorded timestamp, anchoring real-time pacing.
    origin: Option<f64>,
}

impl ReplaySource<BufReader<File>> {
    /// Open a recording. Failure here is fatal for start-up.
    pub fn open(path: &Path, realtime: bool) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open recording {}", path.display()))?;
        info!(path = %path.display(), realtime, "replaying recorded detections");
        Ok(Self::from_reader(BufReader::new(file), realtime))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn from_reader(reader: R, realtime: bool) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
            realtime,
            opened: Instant::now(),
            origin: None,
        }
    }

    fn pace(&mut self, timestamp: f64) {
        let origin = *self.origin.get_or_insert(timestamp);
        let due = timestamp - origin;
        let elapsed = self.opened.elapsed().as_secs_f64();
        if due > elapsed {
            match Duration::try_from_secs_f64(due - elapsed) {
                Ok(wait) => thread::sleep(wait),
                Err(_) => warn!(timestamp, "recorded timestamp out of range, not pacing"),
            }
        }
    }
}

impl<R: BufRead + Send> FrameSource for ReplaySource<R> {
    type Image = Vec<HandObservation>;

    fn grab(&mut self) -> anyhow::Result<Grab<Self::Image>> {
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .context("failed to read recording")?;
            if n == 0 {
                debug!(lines = self.line_no, "recording exhausted");
                return Ok(Grab::Exhausted);
            }
            self.line_no += 1;
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<RecordedFrame>(text) {
                Ok(frame) => {
                    let timestamp = frame
                        .timestamp
                        .unwrap_or_else(|| self.opened.elapsed().as_secs_f64());
                    if self.realtime {
                        self.pace(timestamp);
                    }
                    return Ok(Grab::Frame(CapturedFrame {
                        image: frame.hands,
                        timestamp,
                    }));
                }
                Err(e) => {
                    warn!(line = self.line_no, "skipping malformed frame: {}", e);
                }
            }
        }
    }
}

/// Detector for recorded streams: the "image" already is the detection.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordedDetections;

impl LandmarkDetector<Vec<HandObservation>> for RecordedDetections {
    fn detect(
        &mut self,
        image: &Vec<HandObservation>,
        timestamp: f64,
    ) -> anyhow::Result<Vec<HandObservation>> {
        Ok(image
            .iter()
            .cloned()
            .map(|mut hand| {
                hand.timestamp = timestamp;
                hand
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) fn recorded_line(
    timestamp: f64,
    hands: &[(&str, [crate::hand::landmarks::Landmark; 21])],
) -> String {
    let hands: Vec<serde_json::Value> = hands
        .iter()
        .map(|(handedness, lm)| {
            serde_json::json!({
                "handedness": handedness,
                "landmarks": lm.iter().map(|p| [p.x, p.y, p.z]).collect::<Vec<_>>(),
                "score": 0.9,
            })
        })
        .collect();
    serde_json::json!({ "timestamp": timestamp, "hands": hands }).to_string()
}
