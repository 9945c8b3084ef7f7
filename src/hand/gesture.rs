//! Gesture classification from per-hand features.
//!
//! Each frame, every hand goes through static pose rules, swipe and zoom
//! overlays driven by its motion windows, a composite pinch score with a
//! two-threshold latch, and finally the configured label stabilizer. When
//! exactly two hands are present, a shared inter-wrist window can override
//! both hands with a two-hand zoom.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::features::{FeatureExtractor, FeatureSet};
use super::geometry;
use super::landmarks::{Finger, HandObservation, Handedness, TrackingKey};
use super::motion::{MotionHistory, MotionSample, TimedWindow};
use super::stabilizer::{Stabilizer, StabilizerSettings};
use crate::config::{ClassifierConfig, Config};

/// Floor for palm size and distance norms in the pinch score.
const SCALE_FLOOR: f64 = 1e-6;

// ── Gesture labels ─────────────────────────────────────────

/// Labels the classifier can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    /// Not yet classified.
    #[default]
    None,
    /// No rule matched.
    Unknown,
    ThumbsUp,
    Fist,
    OpenPalm,
    PointIndex,
    /// Fist moving faster than the drag threshold.
    Grab,
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
    ZoomIn,
    ZoomOut,
}

impl GestureLabel {
    /// String representation for the outbound stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Unknown => "unknown",
            Self::ThumbsUp => "thumbs_up",
            Self::Fist => "fist",
            Self::OpenPalm => "open_palm",
            Self::PointIndex => "point_index",
            Self::Grab => "grab",
            Self::SwipeLeft => "swipe_left",
            Self::SwipeRight => "swipe_right",
            Self::SwipeUp => "swipe_up",
            Self::SwipeDown => "swipe_down",
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
        }
    }

    fn zoom(velocity: f64) -> Self {
        if velocity > 0.0 {
            Self::ZoomIn
        } else {
            Self::ZoomOut
        }
    }
}

// ── Pinch ──────────────────────────────────────────────────

/// Sub-scores of the pinch strength, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PinchComponents {
    pub tip: f64,
    pub depth: f64,
    pub angle: f64,
}

/// Pinch estimate for one hand in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PinchReading {
    pub strength: f64,
    /// Smoothed strength.
    pub confidence: f64,
    pub active: bool,
    pub components: PinchComponents,
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Composite thumb/index pinch score in `[0, 1]`.
pub fn pinch_strength(features: &FeatureSet, cfg: &ClassifierConfig) -> (f64, PinchComponents) {
    let palm = features.palm_size.max(SCALE_FLOOR);
    let tip = 1.0 - clamp01(features.pinch_distance / (palm * cfg.pinch_distance_norm.max(SCALE_FLOOR)));
    let depth = 1.0 - clamp01(features.pinch_depth / (palm * cfg.pinch_depth_norm.max(SCALE_FLOOR)));
    let angle = 1.0
        - clamp01(
            geometry::angle_between(
                features.finger(Finger::Thumb).direction,
                features.finger(Finger::Index).direction,
            ) / 180.0,
        );

    let w = cfg.pinch_weights;
    let total = (w.tip + w.depth + w.angle).max(SCALE_FLOOR);
    let strength = clamp01((w.tip * tip + w.depth * depth + w.angle * angle) / total);
    (strength, PinchComponents { tip, depth, angle })
}

/// Exponentially smoothed pinch strength with a Schmitt-trigger latch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinchLatch {
    ema: f64,
    active: bool,
}

impl PinchLatch {
    /// Fold in a new strength; returns `(confidence, active)`.
    pub fn update(&mut self, strength: f64, alpha: f64, enter: f64, exit: f64) -> (f64, bool) {
        self.ema = clamp01((1.0 - alpha) * self.ema + alpha * strength);
        if self.active {
            if self.ema < exit {
                self.active = false;
            }
        } else if self.ema > enter {
            self.active = true;
        }
        (self.ema, self.active)
    }
}

// ── Hand record ────────────────────────────────────────────

/// One hand flowing through the pipeline for one frame.
#[derive(Debug, Clone)]
pub struct HandRecord {
    pub observation: HandObservation,
    /// Position in the detector's output for this frame.
    pub slot: usize,
    pub visible: bool,
    /// Attached by the producer; computed on demand otherwise.
    pub features: Option<FeatureSet>,
    /// Seconds since this hand key's previous frame (0 for the first).
    pub dt: f64,
    pub motion: MotionSample,
    pub pinch: PinchReading,
    pub gesture: GestureLabel,
    pub confidence: f64,
}

impl HandRecord {
    pub fn new(observation: HandObservation, slot: usize) -> Self {
        Self {
            observation,
            slot,
            visible: true,
            features: None,
            dt: 0.0,
            motion: MotionSample::default(),
            pinch: PinchReading::default(),
            gesture: GestureLabel::None,
            confidence: 0.0,
        }
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = Some(features);
        self
    }

    pub fn handedness(&self) -> Handedness {
        self.observation.handedness
    }

    pub fn timestamp(&self) -> f64 {
        self.observation.timestamp
    }

    /// Key for motion, pinch and label state.
    pub fn key(&self) -> TrackingKey {
        TrackingKey::for_hand(self.handedness())
    }

    /// Key for the feature smoothing buffers.
    pub fn slot_key(&self) -> TrackingKey {
        TrackingKey::for_slot(self.handedness(), self.slot)
    }

    fn wrist_xy(&self) -> [f64; 2] {
        match &self.features {
            Some(f) => [f.wrist.x, f.wrist.y],
            None => {
                let w = self.observation.wrist();
                [w.x, w.y]
            }
        }
    }
}

// ── Rules ──────────────────────────────────────────────────

/// Static pose, first match wins.
pub fn static_pose(features: &FeatureSet) -> GestureLabel {
    let thumb_extended = features.finger(Finger::Thumb).curl.is_extended();
    let curls = features.curls();

    if thumb_extended && curls.iter().all(|&c| c) {
        GestureLabel::ThumbsUp
    } else if features.curled_count() >= 3 {
        GestureLabel::Fist
    } else if features.extended_count() >= 3 {
        GestureLabel::OpenPalm
    } else if !curls[0] && curls[1] && curls[2] && curls[3] {
        GestureLabel::PointIndex
    } else {
        GestureLabel::Unknown
    }
}

/// Swipe from wrist velocity; image y grows downward.
pub fn swipe(vx: f64, vy: f64, threshold: f64) -> Option<GestureLabel> {
    if vx.abs() > vy.abs() && vx.abs() > threshold {
        Some(if vx > 0.0 {
            GestureLabel::SwipeRight
        } else {
            GestureLabel::SwipeLeft
        })
    } else if vy.abs() > vx.abs() && vy.abs() > threshold {
        Some(if vy > 0.0 {
            GestureLabel::SwipeDown
        } else {
            GestureLabel::SwipeUp
        })
    } else {
        None
    }
}

// ── Classifier ─────────────────────────────────────────────

/// Persistent per-key classifier state.
#[derive(Debug, Clone)]
struct HandState {
    pinch: PinchLatch,
    stabilizer: Stabilizer<GestureLabel>,
}

/// Stateful classifier owned by the consumer worker.
pub struct GestureClassifier {
    config: Arc<Config>,
    features: FeatureExtractor,
    motion: MotionHistory,
    hands: HashMap<TrackingKey, HandState>,
    interhand: TimedWindow<f64>,
    settings: StabilizerSettings,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(Arc::new(Config::default()))
    }
}

impl GestureClassifier {
    pub fn new(config: Arc<Config>) -> Self {
        let c = &config.classifier;
        Self {
            features: FeatureExtractor::from_config(c),
            motion: MotionHistory::new(c.history_len, c.velocity_noise_floor),
            hands: HashMap::new(),
            interhand: TimedWindow::new(config.multi_hand.two_hand_zoom_window),
            settings: StabilizerSettings::from_config(&config),
            config,
        }
    }

    /// Switch to a new snapshot if it differs from the current one.
    pub fn configure(&mut self, config: &Arc<Config>) {
        if Arc::ptr_eq(&self.config, config) || *self.config == **config {
            self.config = Arc::clone(config);
            return;
        }
        let c = &config.classifier;
        self.features.configure(c);
        self.motion.configure(c.history_len, c.velocity_noise_floor);
        self.interhand
            .set_capacity(config.multi_hand.two_hand_zoom_window);

        let settings = StabilizerSettings::from_config(config);
        if settings != self.settings {
            if settings.mode != self.settings.mode {
                debug!(
                    from = self.settings.mode.as_str(),
                    to = settings.mode.as_str(),
                    "smoothing mode changed"
                );
            }
            for state in self.hands.values_mut() {
                state.stabilizer.reconfigure(&settings);
            }
            self.settings = settings;
        }
        self.config = Arc::clone(config);
    }

    /// Classify every hand of one frame in place.
    pub fn classify_frame(&mut self, hands: &mut [HandRecord], config: &Arc<Config>) {
        self.configure(config);
        for hand in hands.iter_mut() {
            self.classify_hand(hand);
        }
        if hands.len() == 2 && self.config.multi_hand.enable_two_hand_zoom {
            self.two_hand_zoom(hands);
        }
    }

    /// Classify one hand against the current snapshot.
    pub fn classify_hand(&mut self, hand: &mut HandRecord) {
        let cfg = &self.config.classifier;
        let features = match hand.features.take() {
            Some(f) => f,
            None => self.features.extract(&hand.observation, &hand.slot_key()),
        };
        let key = hand.key();

        let motion = self.motion.record(
            &key,
            hand.timestamp(),
            [features.wrist.x, features.wrist.y],
            features.pinch_distance,
        );

        let pose = static_pose(&features);
        let dynamic = match pose {
            GestureLabel::OpenPalm | GestureLabel::PointIndex => {
                swipe(motion.vx, motion.vy, cfg.swipe_speed_thresh)
            }
            _ => None,
        };

        let (strength, components) = pinch_strength(&features, cfg);
        let settings = self.settings;
        let state = self.hands.entry(key.clone()).or_insert_with(|| HandState {
            pinch: PinchLatch::default(),
            stabilizer: Stabilizer::new(&settings),
        });
        let (confidence, active) = state.pinch.update(
            strength,
            cfg.pinch_ema_alpha,
            cfg.pinch_strength_enter,
            cfg.pinch_strength_exit,
        );

        let zoom = (active && motion.pinch_velocity.abs() > cfg.zoom_speed_thresh)
            .then(|| GestureLabel::zoom(motion.pinch_velocity));
        let dragging = motion.vx.abs() > cfg.drag_speed_thresh || motion.vy.abs() > cfg.drag_speed_thresh;

        let candidate = match (zoom, dynamic) {
            (Some(z), _) => z,
            (None, Some(d)) => d,
            (None, None) if pose == GestureLabel::Fist && dragging => GestureLabel::Grab,
            (None, None) => pose,
        };
        let (label, label_confidence) = state.stabilizer.stabilize(candidate);

        debug!(
            key = %key,
            candidate = candidate.as_str(),
            gesture = label.as_str(),
            confidence = label_confidence,
            "classified hand"
        );

        hand.motion = motion;
        hand.pinch = PinchReading {
            strength,
            confidence,
            active,
            components,
        };
        hand.gesture = label;
        hand.confidence = label_confidence;
        hand.features = Some(features);
    }

    fn two_hand_zoom(&mut self, hands: &mut [HandRecord]) {
        let left = hands.iter().position(|h| h.handedness() == Handedness::Left);
        let right = hands.iter().position(|h| h.handedness() == Handedness::Right);
        let (a, b) = match (left, right) {
            (Some(l), Some(r)) => (l, r),
            _ => (0, 1),
        };

        let wa = hands[a].wrist_xy();
        let wb = hands[b].wrist_xy();
        let distance = ((wa[0] - wb[0]).powi(2) + (wa[1] - wb[1]).powi(2)).sqrt();
        let t = hands[a].timestamp().max(hands[b].timestamp());
        self.interhand.push(t, distance);

        // Spans at or below the noise floor read as zero; dt is not clamped up.
        let velocity = self
            .interhand
            .velocity(self.config.classifier.velocity_noise_floor);
        if velocity.abs() > self.config.multi_hand.two_hand_zoom_thresh {
            let label = GestureLabel::zoom(velocity);
            debug!(velocity, gesture = label.as_str(), "two-hand zoom");
            for hand in hands.iter_mut() {
                hand.gesture = label;
                hand.confidence = 1.0;
            }
        }
    }

    /// Number of hand keys with classifier state.
    #[cfg(test)]
    pub fn tracked_hands(&self) -> usize {
        self.hands.len()
    }
}

// ── Tests ──────────────────────────────────────────────────
