//! Runtime configuration with hot reload.
//!
//! The JSON file mirrors [`Config`]: every section and key is optional,
//! unknown keys are ignored. [`ConfigWatcher`] polls the file's
//! modification time and swaps a fresh snapshot into [`SharedConfig`];
//! workers read through a [`ConfigReader`], which never blocks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default interval between modification-time checks.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_millis(500);

// ── Sections ───────────────────────────────────────────────

/// Relative weights of the pinch-strength sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinchWeights {
    pub tip: f64,
    pub depth: f64,
    pub angle: f64,
}

impl Default for PinchWeights {
    fn default() -> Self {
        Self {
            tip: 0.5,
            depth: 0.2,
            angle: 0.3,
        }
    }
}

/// Per-hand classifier thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Length of the label and motion windows.
    pub history_len: usize,
    /// Wrist speed (normalized units/s) for a swipe.
    pub swipe_speed_thresh: f64,
    /// Pinch-distance speed for a zoom while pinching.
    pub zoom_speed_thresh: f64,
    /// Wrist speed turning a fist into a grab.
    pub drag_speed_thresh: f64,
    pub pinch_weights: PinchWeights,
    /// Tip distance, in palm sizes, at which the tip score reaches 0.
    pub pinch_distance_norm: f64,
    /// Thumb/index depth gap, in palm sizes, at which the depth score reaches 0.
    pub pinch_depth_norm: f64,
    pub pinch_ema_alpha: f64,
    pub pinch_strength_enter: f64,
    pub pinch_strength_exit: f64,
    pub curl_strong_angle: f64,
    pub curl_partial_angle: f64,
    /// Moving-average window for joint angles.
    pub joint_angle_buffer: usize,
    /// Window spans at or below this (seconds) yield zero velocity.
    pub velocity_noise_floor: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            history_len: 4,
            swipe_speed_thresh: 1.0,
            zoom_speed_thresh: 0.15,
            drag_speed_thresh: 0.05,
            pinch_weights: PinchWeights::default(),
            pinch_distance_norm: 0.6,
            pinch_depth_norm: 0.4,
            pinch_ema_alpha: 0.5,
            pinch_strength_enter: 0.75,
            pinch_strength_exit: 0.6,
            curl_strong_angle: 90.0,
            curl_partial_angle: 120.0,
            joint_angle_buffer: 5,
            velocity_noise_floor: 1e-6,
        }
    }
}

/// Two-hand composite gestures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiHandConfig {
    pub enable_two_hand_zoom: bool,
    pub two_hand_zoom_window: usize,
    pub two_hand_zoom_thresh: f64,
}

impl Default for MultiHandConfig {
    fn default() -> Self {
        Self {
            enable_two_hand_zoom: true,
            two_hand_zoom_window: 4,
            two_hand_zoom_thresh: 0.03,
        }
    }
}

/// Label stabilization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    #[default]
    Voting,
    Ema,
    Hysteresis,
}

impl SmoothingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voting => "voting",
            Self::Ema => "ema",
            Self::Hysteresis => "hysteresis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub mode: SmoothingMode,
    pub ema_alpha: f64,
    pub hysteresis_enter: f64,
    pub hysteresis_exit: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            mode: SmoothingMode::Voting,
            ema_alpha: 0.4,
            hysteresis_enter: 0.7,
            hysteresis_exit: 0.4,
        }
    }
}

/// Worker-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames in the rolling FPS estimate.
    pub fps_window: usize,
    /// Hands kept per frame; detector output beyond this is dropped.
    pub max_hands: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps_window: 20,
            max_hands: 2,
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Complete runtime configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub multi_hand: MultiHandConfig,
    pub smoothing: SmoothingConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_json::from_str(text)?;
        Ok(cfg.sanitized())
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Load `path`, falling back to defaults with a warning on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            warn!(path = %path.display(), "config not found, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Clamp lengths to at least one and rates to `[0, 1]`.
    pub fn sanitized(mut self) -> Self {
        let c = &mut self.classifier;
        c.history_len = c.history_len.max(1);
        c.joint_angle_buffer = c.joint_angle_buffer.max(1);
        c.pinch_ema_alpha = c.pinch_ema_alpha.clamp(0.0, 1.0);
        c.velocity_noise_floor = c.velocity_noise_floor.max(0.0);
        self.multi_hand.two_hand_zoom_window = self.multi_hand.two_hand_zoom_window.max(1);
        self.smoothing.ema_alpha = self.smoothing.ema_alpha.clamp(0.0, 1.0);
        self.pipeline.fps_window = self.pipeline.fps_window.max(2);
        self
    }
}

// ── Sharing ────────────────────────────────────────────────

/// Process-wide slot holding the current snapshot.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    current: Arc<RwLock<Arc<Config>>>,
}

impl SharedConfig {
    pub fn new(cfg: Config) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(cfg))),
        }
    }

    /// Atomically replace the snapshot.
    pub fn replace(&self, cfg: Config) {
        let next = Arc::new(cfg);
        *self.current.write() = next;
    }

    /// Per-worker non-blocking reader.
    pub fn reader(&self) -> ConfigReader {
        let last = self.current.read().clone();
        ConfigReader {
            shared: self.clone(),
            last,
        }
    }
}

/// A worker's view of [`SharedConfig`].
#[derive(Debug, Clone)]
pub struct ConfigReader {
    shared: SharedConfig,
    last: Arc<Config>,
}

impl ConfigReader {
    /// Current snapshot, or the last one seen while a swap holds the lock.
    pub fn snapshot(&mut self) -> Arc<Config> {
        if let Some(guard) = self.shared.current.try_read() {
            if !Arc::ptr_eq(&self.last, &*guard) {
                self.last = guard.clone();
            }
        }
        self.last.clone()
    }
}

// ── Watcher ────────────────────────────────────────────────

/// Polls a config file's modification time and reloads on change.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    interval: Duration,
    mtime: Option<SystemTime>,
    last_checked: Option<Instant>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf, interval: Duration) -> Self {
        let mtime = modified(&path);
        Self {
            path,
            interval,
            mtime,
            last_checked: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the initial snapshot (defaults on failure).
    pub fn initial(&mut self) -> Config {
        self.mtime = modified(&self.path);
        Config::load_or_default(&self.path)
    }

    /// Cheap per-iteration check. Returns true when a new snapshot was
    /// installed.
    pub fn poll(&mut self, shared: &SharedConfig) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_checked {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_checked = Some(now);
        self.reload_if_changed(shared)
    }

    /// Reload when the modification time differs from the last load.
    ///
    /// A missing file keeps the current snapshot; so does a malformed one.
    pub fn reload_if_changed(&mut self, shared: &SharedConfig) -> bool {
        let Some(mtime) = modified(&self.path) else {
            return false;
        };
        if self.mtime == Some(mtime) {
            return false;
        }
        self.mtime = Some(mtime);

        match Config::load(&self.path) {
            Ok(cfg) => {
                info!(path = %self.path.display(), "config reloaded");
                debug!(?cfg, "new config snapshot");
                shared.replace(cfg);
                true
            }
            Err(e) => {
                warn!("{:#}; keeping previous config", e);
                false
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, text: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f.sync_all().unwrap();
    }

    /// Force a distinct modification time without sleeping.
    fn bump_mtime(path: &Path, secs: u64) {
        let f = fs::OpenOptions::new().write(true).open(path).unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs);
        f.set_modified(t).unwrap();
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.classifier.history_len, 4);
        assert_eq!(cfg.classifier.pinch_weights, PinchWeights::default());
        assert_eq!(cfg.classifier.joint_angle_buffer, 5);
        assert_eq!(cfg.multi_hand.two_hand_zoom_window, 4);
        assert_eq!(cfg.smoothing.mode, SmoothingMode::Voting);
        assert!((cfg.smoothing.hysteresis_exit - 0.4).abs() < f64::EPSILON);
        assert_eq!(cfg.pipeline.max_hands, 2);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let cfg = Config::from_json(
            r#"{"classifier": {"swipe_speed_thresh": 2.5, "pinch_weights": {"tip": 1.0}},
                "smoothing": {"mode": "hysteresis"},
                "debug": {"draw_landmarks": false}}"#,
        )
        .unwrap();
        assert_eq!(cfg.classifier.swipe_speed_thresh, 2.5);
        assert_eq!(cfg.classifier.pinch_weights.tip, 1.0);
        assert_eq!(cfg.classifier.pinch_weights.depth, 0.2);
        assert_eq!(cfg.classifier.history_len, 4);
        assert_eq!(cfg.smoothing.mode, SmoothingMode::Hysteresis);
    }

    #[test]
    fn test_sanitize_clamps() {
        let cfg = Config::from_json(
            r#"{"classifier": {"history_len": 0, "joint_angle_buffer": 0},
                "smoothing": {"ema_alpha": 3.0},
                "multi_hand": {"two_hand_zoom_window": 0}}"#,
        )
        .unwrap();
        assert_eq!(cfg.classifier.history_len, 1);
        assert_eq!(cfg.classifier.joint_angle_buffer, 1);
        assert_eq!(cfg.smoothing.ema_alpha, 1.0);
        assert_eq!(cfg.multi_hand.two_hand_zoom_window, 1);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_file(&path, "{ not json");
        assert_eq!(Config::load_or_default(&path), Config::default());
        assert_eq!(
            Config::load_or_default(&dir.path().join("missing.json")),
            Config::default()
        );
    }

    #[test]
    fn test_reload_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_file(&path, r#"{"classifier": {"history_len": 6}}"#);
        bump_mtime(&path, 1);

        let mut watcher = ConfigWatcher::new(path.clone(), Duration::ZERO);
        let shared = SharedConfig::new(watcher.initial());
        let mut reader = shared.reader();
        assert_eq!(reader.snapshot().classifier.history_len, 6);

        // Unchanged mtime: nothing to do.
        assert!(!watcher.poll(&shared));

        write_file(&path, r#"{"classifier": {"history_len": 8}}"#);
        bump_mtime(&path, 2);
        assert!(watcher.poll(&shared));
        assert_eq!(reader.snapshot().classifier.history_len, 8);
    }

    #[test]
    fn test_malformed_reload_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_file(&path, r#"{"smoothing": {"mode": "ema"}}"#);
        bump_mtime(&path, 1);

        let mut watcher = ConfigWatcher::new(path.clone(), Duration::ZERO);
        let shared = SharedConfig::new(watcher.initial());
        let mut reader = shared.reader();

        write_file(&path, r#"{"smoothing": {"mode": "#);
        bump_mtime(&path, 2);
        assert!(!watcher.poll(&shared));
        assert_eq!(reader.snapshot().smoothing.mode, SmoothingMode::Ema);
    }

    #[test]
    fn test_missing_file_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_file(&path, r#"{"multi_hand": {"enable_two_hand_zoom": false}}"#);
        let mut watcher = ConfigWatcher::new(path.clone(), Duration::ZERO);
        let shared = SharedConfig::new(watcher.initial());
        fs::remove_file(&path).unwrap();
        assert!(!watcher.poll(&shared));
        assert!(!shared.reader().snapshot().multi_hand.enable_two_hand_zoom);
    }

    #[test]
    fn test_poll_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_file(&path, "{}");
        bump_mtime(&path, 1);
        let mut watcher = ConfigWatcher::new(path.clone(), Duration::from_secs(3600));
        let shared = SharedConfig::new(watcher.initial());

        // First poll runs the check, the change lands after it.
        assert!(!watcher.poll(&shared));
        write_file(&path, r#"{"classifier": {"history_len": 9}}"#);
        bump_mtime(&path, 2);
        assert!(!watcher.poll(&shared));
        assert_eq!(shared.reader().snapshot().classifier.history_len, 4);
    }

    #[test]
    fn test_reader_does_not_block_during_write() {
        let shared = SharedConfig::new(Config::default());
        let mut reader = shared.reader();
        let guard = shared.current.write();
        // Write lock held: reader still answers with its last snapshot.
        assert_eq!(reader.snapshot().classifier.history_len, 4);
        drop(guard);
    }
}
