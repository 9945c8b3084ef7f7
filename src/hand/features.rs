//! Per-hand feature extraction.
//!
//! Turns one hand's landmarks into smoothed signed joint angles, curl
//! states, finger directions and scale references. Each hand is smoothed
//! through its own [`AngleBuffer`], keyed by handedness and detection slot
//! so same-handed duplicates stay independent.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::angle_buffer::AngleBuffer;
use super::geometry::{self, Vec3};
use super::landmarks::{Finger, HandLandmark, HandObservation, Landmark, TrackingKey};
use crate::config::ClassifierConfig;

// ── Curl classification ────────────────────────────────────

/// Qualitative bend of a finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CurlState {
    #[default]
    Extended,
    Partial,
    Curled,
}

impl CurlState {
    /// Score in `[0, 1]`: 0 extended, 0.5 partial, 1 curled.
    pub fn score(&self) -> f64 {
        match self {
            Self::Extended => 0.0,
            Self::Partial => 0.5,
            Self::Curled => 1.0,
        }
    }

    pub fn is_extended(&self) -> bool {
        *self == Self::Extended
    }
}

/// Ordered curl thresholds, tolerant of swapped configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurlThresholds {
    high: f64,
    low: f64,
}

impl CurlThresholds {
    pub fn new(strong: f64, partial: f64) -> Self {
        Self {
            high: strong.max(partial),
            low: strong.min(partial),
        }
    }

    /// Classify a finger from its maximum bend.
    pub fn classify(&self, max_bend: f64) -> CurlState {
        if max_bend >= self.high {
            CurlState::Curled
        } else if max_bend >= self.low {
            CurlState::Partial
        } else {
            CurlState::Extended
        }
    }
}

impl Default for CurlThresholds {
    fn default() -> Self {
        Self::new(90.0, 120.0)
    }
}

// ── Feature set ────────────────────────────────────────────

/// Summary of one finger's smoothed joint angles this frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FingerBend {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub latest: f64,
}

impl FingerBend {
    fn from_angles(angles: &[f64]) -> Self {
        let Some(&latest) = angles.last() else {
            return Self::default();
        };
        Self {
            avg: angles.iter().sum::<f64>() / angles.len() as f64,
            max: angles.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: angles.iter().copied().fold(f64::INFINITY, f64::min),
            latest,
        }
    }
}

/// Derived features for one finger.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerFeatures {
    /// Smoothed signed joint angles in triplet order (degrees).
    pub joint_angles: Vec<f64>,
    pub bend: FingerBend,
    pub curl: CurlState,
    /// Unit vector from the landmark below the tip to the tip.
    pub direction: Vec3,
}

/// Everything the classifier needs from one hand in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// Wrist to middle-MCP distance; scale reference for distances.
    pub palm_size: f64,
    /// Indexed by [`Finger::index`].
    pub fingers: [FingerFeatures; 5],
    /// Thumb tip to index tip.
    pub pinch_distance: f64,
    /// Thumb tip to index tip depth gap.
    pub pinch_depth: f64,
    /// Angle at the thumb IP between tip and MCP (degrees).
    pub thumb_angle: f64,
    pub wrist: Landmark,
}

impl FeatureSet {
    pub fn finger(&self, finger: Finger) -> &FingerFeatures {
        &self.fingers[finger.index()]
    }

    pub fn curl_states(&self) -> [CurlState; 4] {
        Finger::NON_THUMB.map(|f| self.finger(f).curl)
    }

    pub fn curl_scores(&self) -> [f64; 4] {
        Finger::NON_THUMB.map(|f| self.finger(f).curl.score())
    }

    pub fn curl_angles(&self) -> [f64; 4] {
        Finger::NON_THUMB.map(|f| self.finger(f).bend.max)
    }

    /// Non-thumb fingers that are not extended.
    pub fn curls(&self) -> [bool; 4] {
        Finger::NON_THUMB.map(|f| !self.finger(f).curl.is_extended())
    }

    pub fn curled_count(&self) -> usize {
        self.curls().iter().filter(|&&c| c).count()
    }

    pub fn extended_count(&self) -> usize {
        4 - self.curled_count()
    }
}

// ── Extractor ──────────────────────────────────────────────

/// Stateful extractor owning one angle buffer per tracking key.
#[derive(Debug)]
pub struct FeatureExtractor {
    window: usize,
    thresholds: CurlThresholds,
    buffers: HashMap<TrackingKey, AngleBuffer>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

impl FeatureExtractor {
    pub fn from_config(cfg: &ClassifierConfig) -> Self {
        Self {
            window: cfg.joint_angle_buffer.max(1),
            thresholds: CurlThresholds::new(cfg.curl_strong_angle, cfg.curl_partial_angle),
            buffers: HashMap::new(),
        }
    }

    /// Apply a new snapshot. A different smoothing window discards every
    /// buffer; thresholds apply from the next frame.
    pub fn configure(&mut self, cfg: &ClassifierConfig) {
        let window = cfg.joint_angle_buffer.max(1);
        if window != self.window {
            debug!(old = self.window, new = window, "angle window changed, dropping buffers");
            self.window = window;
            for buffer in self.buffers.values_mut() {
                buffer.set_capacity(window);
            }
        }
        self.thresholds = CurlThresholds::new(cfg.curl_strong_angle, cfg.curl_partial_angle);
    }

    /// Extract features for one hand, smoothing through `key`'s buffer.
    pub fn extract(&mut self, hand: &HandObservation, key: &TrackingKey) -> FeatureSet {
        let window = self.window;
        let buffer = self
            .buffers
            .entry(key.clone())
            .or_insert_with(|| AngleBuffer::new(window));
        let normal = geometry::oriented_palm_normal(hand);
        let thresholds = self.thresholds;

        let fingers = Finger::ALL.map(|finger| {
            let raw: Vec<f64> = finger
                .joint_triplets()
                .iter()
                .map(|&triplet| geometry::signed_joint_angle(hand, triplet, normal))
                .collect();
            let joint_angles = buffer.smooth(finger, &raw);
            let bend = FingerBend::from_angles(&joint_angles);
            FingerFeatures {
                curl: thresholds.classify(bend.max),
                bend,
                joint_angles,
                direction: geometry::normalize(geometry::sub(
                    hand.point(finger.tip()),
                    hand.point(finger.direction_base()),
                )),
            }
        });

        let thumb_tip = hand.point(HandLandmark::ThumbTip);
        let index_tip = hand.point(HandLandmark::IndexTip);
        FeatureSet {
            palm_size: geometry::distance(
                hand.point(HandLandmark::Wrist),
                hand.point(HandLandmark::MiddleMcp),
            ),
            fingers,
            pinch_distance: geometry::distance(thumb_tip, index_tip),
            pinch_depth: (thumb_tip[2] - index_tip[2]).abs(),
            thumb_angle: geometry::angle_at(
                thumb_tip,
                hand.point(HandLandmark::ThumbIp),
                hand.point(HandLandmark::ThumbMcp),
            ),
            wrist: hand.wrist(),
        }
    }

    /// Number of tracking keys with live buffers.
    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.buffers.len()
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Feature set with the given non-thumb curl states and a thumb state,
/// everything else neutral.
#[cfg(test)]
pub(crate) fn make_features(thumb: CurlState, others: [CurlState; 4]) -> FeatureSet {
    let finger = |curl: CurlState| FingerFeatures {
        joint_angles: vec![0.0; 3],
        bend: FingerBend::default(),
        curl,
        direction: [0.0, -1.0, 0.0],
    };
    FeatureSet {
        palm_size: 1.0,
        fingers: [
            finger(thumb),
            finger(others[0]),
            finger(others[1]),
            finger(others[2]),
            finger(others[3]),
        ],
        pinch_distance: 0.5,
        pinch_depth: 0.0,
        thumb_angle: 180.0,
        wrist: Landmark::new(0.5, 0.5, 0.0),
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::{open_hand_landmarks, posed_hand_landmarks, Handedness};
    use proptest::prelude::*;

    fn right(lm: [Landmark; 21]) -> HandObservation {
        HandObservation::new(Handedness::Right, lm, 0.0)
    }

    #[test]
    fn test_thresholds_ordered() {
        let t = CurlThresholds::new(90.0, 120.0);
        assert_eq!(t.classify(150.0), CurlState::Curled);
        assert_eq!(t.classify(120.0), CurlState::Curled);
        assert_eq!(t.classify(100.0), CurlState::Partial);
        assert_eq!(t.classify(89.9), CurlState::Extended);
        assert_eq!(t.classify(-170.0), CurlState::Extended);
    }

    #[test]
    fn test_thresholds_swapped_config() {
        assert_eq!(CurlThresholds::new(120.0, 90.0), CurlThresholds::new(90.0, 120.0));
    }

    #[test]
    fn test_curl_scores() {
        assert_eq!(CurlState::Extended.score(), 0.0);
        assert_eq!(CurlState::Partial.score(), 0.5);
        assert_eq!(CurlState::Curled.score(), 1.0);
    }

    proptest! {
        #[test]
        fn prop_curl_monotonic(a in -180.0f64..180.0, b in -180.0f64..180.0,
                               strong in 0.0f64..180.0, partial in 0.0f64..180.0) {
            let t = CurlThresholds::new(strong, partial);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(t.classify(lo).score() <= t.classify(hi).score());
        }
    }

    #[test]
    fn test_bent_hand_all_curled() {
        let mut fx = FeatureExtractor::default();
        let hand = right(posed_hand_landmarks([150.0; 5]));
        let fs = fx.extract(&hand, &TrackingKey::for_slot(Handedness::Right, 0));
        for finger in Finger::ALL {
            let f = fs.finger(finger);
            assert!((f.bend.max - 150.0).abs() < 1e-6, "{:?}: {:?}", finger, f.bend);
            assert_eq!(f.curl, CurlState::Curled);
        }
        assert_eq!(fs.curl_states(), [CurlState::Curled; 4]);
        assert_eq!(fs.curl_scores(), [1.0; 4]);
        assert_eq!(fs.curled_count(), 4);
    }

    #[test]
    fn test_reverse_bend_is_extended() {
        let mut fx = FeatureExtractor::default();
        let hand = right(posed_hand_landmarks([-170.0; 5]));
        let fs = fx.extract(&hand, &TrackingKey::for_slot(Handedness::Right, 0));
        assert_eq!(fs.curl_states(), [CurlState::Extended; 4]);
        assert_eq!(fs.finger(Finger::Thumb).curl, CurlState::Extended);
        assert_eq!(fs.extended_count(), 4);
        assert!((fs.finger(Finger::Index).bend.min + 170.0).abs() < 1e-6);
    }

    #[test]
    fn test_palm_size_and_pinch() {
        let mut fx = FeatureExtractor::default();
        let fs = fx.extract(&right(open_hand_landmarks()), &TrackingKey::for_slot(Handedness::Right, 0));
        assert!((fs.palm_size - 0.2).abs() < 1e-9);
        // Thumb tip (0.30, 0.60) to index tip (0.45, 0.45).
        let expected = (0.15f64.powi(2) * 2.0).sqrt();
        assert!((fs.pinch_distance - expected).abs() < 1e-9);
        assert_eq!(fs.wrist, Landmark::new(0.5, 0.8, 0.0));
    }

    #[test]
    fn test_direction_vectors_unit() {
        let mut fx = FeatureExtractor::default();
        let fs = fx.extract(&right(open_hand_landmarks()), &TrackingKey::for_slot(Handedness::Right, 0));
        let d = fs.finger(Finger::Middle).direction;
        assert!(d[0].abs() < 1e-9 && (d[1] + 1.0).abs() < 1e-9);
        for finger in Finger::ALL {
            assert!((geometry::length(fs.finger(finger).direction) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_smoothing_per_key() {
        let mut fx = FeatureExtractor::default();
        let curled = right(posed_hand_landmarks([150.0; 5]));
        let reverse = right(posed_hand_landmarks([-170.0; 5]));
        let a = TrackingKey::for_slot(Handedness::Right, 0);
        let b = TrackingKey::for_slot(Handedness::Right, 1);

        fx.extract(&curled, &a);
        // Key b has no history, so it sees the raw angles.
        let fb = fx.extract(&reverse, &b);
        assert!((fb.finger(Finger::Index).bend.max + 170.0).abs() < 1e-6);
        // Key a averages 150 with -170.
        let fa = fx.extract(&reverse, &a);
        assert!((fa.finger(Finger::Index).bend.max + 10.0).abs() < 1e-6);
        assert_eq!(fx.tracked_keys(), 2);
    }

    #[test]
    fn test_window_change_discards_history() {
        let mut cfg = ClassifierConfig::default();
        let mut fx = FeatureExtractor::from_config(&cfg);
        let key = TrackingKey::for_slot(Handedness::Left, 0);
        fx.extract(&right(posed_hand_landmarks([150.0; 5])), &key);

        cfg.joint_angle_buffer = 3;
        fx.configure(&cfg);
        assert_eq!(fx.tracked_keys(), 1);
        let fs = fx.extract(&right(posed_hand_landmarks([-170.0; 5])), &key);
        assert!((fs.finger(Finger::Ring).bend.max + 170.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_change_keeps_history() {
        let mut cfg = ClassifierConfig::default();
        let mut fx = FeatureExtractor::from_config(&cfg);
        let key = TrackingKey::for_slot(Handedness::Right, 0);
        fx.extract(&right(posed_hand_landmarks([150.0; 5])), &key);
        cfg.curl_strong_angle = 160.0;
        cfg.curl_partial_angle = 140.0;
        fx.configure(&cfg);
        assert_eq!(fx.tracked_keys(), 1);
        let fs = fx.extract(&right(posed_hand_landmarks([150.0; 5])), &key);
        assert_eq!(fs.finger(Finger::Index).curl, CurlState::Partial);
    }

    #[test]
    fn test_collapsed_hand_is_neutral() {
        let mut fx = FeatureExtractor::default();
        let hand = right([Landmark::default(); 21]);
        let fs = fx.extract(&hand, &TrackingKey::for_slot(Handedness::Right, 0));
        assert_eq!(fs.palm_size, 0.0);
        for finger in Finger::ALL {
            let f = fs.finger(finger);
            assert!(f.joint_angles.iter().all(|a| *a == 0.0));
            assert_eq!(f.direction, [0.0; 3]);
        }
    }
}
