//! Hand skeleton data structures for detector output.
//!
//! Models the 21-point hand skeleton produced by the external landmark
//! detector, the coarse handedness label, and the tracking key used to
//! address per-hand persistent state.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Landmark definitions ───────────────────────────────────

/// The 21 landmarks of the standard hand skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }
}

// ── Fingers ────────────────────────────────────────────────

/// (previous, joint, next) landmark triplet describing one finger joint.
pub type JointTriplet = (HandLandmark, HandLandmark, HandLandmark);

/// The five fingers, in skeleton order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Self::Thumb,
        Self::Index,
        Self::Middle,
        Self::Ring,
        Self::Pinky,
    ];

    /// Non-thumb fingers in curl-report order.
    pub const NON_THUMB: [Finger; 4] = [Self::Index, Self::Middle, Self::Ring, Self::Pinky];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }

    /// Joint triplets used for signed bend angles.
    ///
    /// The thumb has two measured joints, every other finger three (the
    /// first one anchored at the wrist).
    pub fn joint_triplets(&self) -> &'static [JointTriplet] {
        use HandLandmark::*;
        match self {
            Self::Thumb => &[(ThumbCmc, ThumbMcp, ThumbIp), (ThumbMcp, ThumbIp, ThumbTip)],
            Self::Index => &[
                (Wrist, IndexMcp, IndexPip),
                (IndexMcp, IndexPip, IndexDip),
                (IndexPip, IndexDip, IndexTip),
            ],
            Self::Middle => &[
                (Wrist, MiddleMcp, MiddlePip),
                (MiddleMcp, MiddlePip, MiddleDip),
                (MiddlePip, MiddleDip, MiddleTip),
            ],
            Self::Ring => &[
                (Wrist, RingMcp, RingPip),
                (RingMcp, RingPip, RingDip),
                (RingPip, RingDip, RingTip),
            ],
            Self::Pinky => &[
                (Wrist, PinkyMcp, PinkyPip),
                (PinkyMcp, PinkyPip, PinkyDip),
                (PinkyPip, PinkyDip, PinkyTip),
            ],
        }
    }

    pub fn tip(&self) -> HandLandmark {
        match self {
            Self::Thumb => HandLandmark::ThumbTip,
            Self::Index => HandLandmark::IndexTip,
            Self::Middle => HandLandmark::MiddleTip,
            Self::Ring => HandLandmark::RingTip,
            Self::Pinky => HandLandmark::PinkyTip,
        }
    }

    /// Landmark directly below the tip; start of the direction vector.
    pub fn direction_base(&self) -> HandLandmark {
        match self {
            Self::Thumb => HandLandmark::ThumbIp,
            Self::Index => HandLandmark::IndexDip,
            Self::Middle => HandLandmark::MiddleDip,
            Self::Ring => HandLandmark::RingDip,
            Self::Pinky => HandLandmark::PinkyDip,
        }
    }
}

// ── Handedness ─────────────────────────────────────────────

/// Coarse left/right label reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Unknown => "Unknown",
        }
    }
}

// ── Landmark ───────────────────────────────────────────────

/// One normalized image-space point (z is relative depth).
///
/// Deserializes from either `[x, y, z]` or `{"x":..,"y":..,"z":..}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "LandmarkRepr")]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarkRepr {
    Array([f64; 3]),
    Object { x: f64, y: f64, z: f64 },
}

impl From<LandmarkRepr> for Landmark {
    fn from(repr: LandmarkRepr) -> Self {
        match repr {
            LandmarkRepr::Array([x, y, z]) => Self { x, y, z },
            LandmarkRepr::Object { x, y, z } => Self { x, y, z },
        }
    }
}

impl Landmark {
    #[cfg(test)]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

// ── Observation ────────────────────────────────────────────

/// One detector result for one hand in one frame.
#[derive(Debug, Clone, Deserialize)]
pub struct HandObservation {
    #[serde(default)]
    pub handedness: Handedness,
    /// 21 landmarks indexed by [`HandLandmark`].
    pub landmarks: [Landmark; LANDMARK_COUNT],
    /// Capture timestamp (monotonic seconds).
    #[serde(default)]
    pub timestamp: f64,
    /// Detector confidence; carried, not used for classification.
    #[serde(default, alias = "confidence")]
    pub score: f64,
}

impl HandObservation {
    pub fn new(handedness: Handedness, landmarks: [Landmark; LANDMARK_COUNT], timestamp: f64) -> Self {
        Self {
            handedness,
            landmarks,
            timestamp,
            score: 1.0,
        }
    }

    pub fn landmark(&self, lm: HandLandmark) -> &Landmark {
        &self.landmarks[lm.index()]
    }

    pub fn point(&self, lm: HandLandmark) -> [f64; 3] {
        self.landmarks[lm.index()].to_array()
    }

    pub fn wrist(&self) -> Landmark {
        *self.landmark(HandLandmark::Wrist)
    }
}

// ── Tracking key ───────────────────────────────────────────

/// Address of per-hand persistent state.
///
/// Built from the coarse handedness label (optionally with the detection
/// slot), so it is not a stable identity: a hand that vanishes and comes
/// back, or flips handedness, lands on whatever state the key holds.
/// Classifier code only ever sees this type, so a real identity scheme
/// can replace the construction without touching it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingKey(String);

impl TrackingKey {
    /// Key shared by every hand with the same handedness.
    pub fn for_hand(handedness: Handedness) -> Self {
        Self(handedness.as_str().to_string())
    }

    /// Key distinguishing same-handedness duplicates by detection slot.
    pub fn for_slot(handedness: Handedness, slot: usize) -> Self {
        Self(format!("{}_{}", handedness.as_str(), slot))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Flat open hand: fingers straight along -y from their MCPs, palm in the
/// z=0 plane, wrist at `(0.5, 0.8)`.
#[cfg(test)]
pub(crate) fn open_hand_landmarks() -> [Landmark; LANDMARK_COUNT] {
    let mut lm = [Landmark::default(); LANDMARK_COUNT];
    lm[HandLandmark::Wrist.index()] = Landmark::new(0.5, 0.8, 0.0);
    // Thumb sweeps out sideways.
    lm[HandLandmark::ThumbCmc.index()] = Landmark::new(0.45, 0.75, 0.0);
    lm[HandLandmark::ThumbMcp.index()] = Landmark::new(0.40, 0.70, 0.0);
    lm[HandLandmark::ThumbIp.index()] = Landmark::new(0.35, 0.65, 0.0);
    lm[HandLandmark::ThumbTip.index()] = Landmark::new(0.30, 0.60, 0.0);
    let columns = [
        (Finger::Index, 0.45),
        (Finger::Middle, 0.50),
        (Finger::Ring, 0.55),
        (Finger::Pinky, 0.60),
    ];
    for (finger, x) in columns {
        let base = finger.joint_triplets()[0].1.index();
        for seg in 0..4 {
            lm[base + seg] = Landmark::new(x, 0.6 - 0.05 * seg as f64, 0.0);
        }
    }
    lm
}

/// Hand with every finger chain re-posed so each measured joint bends to
/// `bends[finger]` degrees (thumb first). Positive values bend about the
/// palm normal, negative values against it; MCPs and wrist stay put so the
/// palm normal is `(0, 0, 1)`.
#[cfg(test)]
pub(crate) fn posed_hand_landmarks(bends: [f64; 5]) -> [Landmark; LANDMARK_COUNT] {
    let mut lm = open_hand_landmarks();
    for finger in Finger::ALL {
        let bend = bends[finger.index()];
        let turn = if bend >= 0.0 {
            -(180.0 - bend)
        } else {
            180.0 + bend
        }
        .to_radians();
        let triplets = finger.joint_triplets();
        let (start, first, _) = triplets[0];
        let s = lm[start.index()];
        let j = lm[first.index()];
        let len = ((j.x - s.x).powi(2) + (j.y - s.y).powi(2)).sqrt();
        let mut dir = ((j.x - s.x) / len, (j.y - s.y) / len);
        let mut prev = j;
        for &(_, _, next) in triplets {
            let (c, sn) = (turn.cos(), turn.sin());
            dir = (dir.0 * c - dir.1 * sn, dir.0 * sn + dir.1 * c);
            let p = Landmark::new(prev.x + 0.05 * dir.0, prev.y + 0.05 * dir.1, 0.0);
            lm[next.index()] = p;
            prev = p;
        }
    }
    lm
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_count() {
        assert_eq!(HandLandmark::Wrist.index(), 0);
        assert_eq!(HandLandmark::ThumbTip.index(), 4);
        assert_eq!(HandLandmark::IndexTip.index(), 8);
        assert_eq!(HandLandmark::MiddleMcp.index(), 9);
        assert_eq!(HandLandmark::PinkyMcp.index(), 17);
        assert_eq!(HandLandmark::PinkyTip.index(), 20);
        assert_eq!(LANDMARK_COUNT, 21);
    }

    #[test]
    fn test_joint_topology() {
        assert_eq!(Finger::Thumb.joint_triplets().len(), 2);
        for finger in Finger::NON_THUMB {
            let joints = finger.joint_triplets();
            assert_eq!(joints.len(), 3);
            assert_eq!(joints[0].0, HandLandmark::Wrist);
            assert_eq!(joints[2].2, finger.tip());
        }
    }

    #[test]
    fn test_handedness_parse() {
        let h: Handedness = serde_json::from_str("\"Left\"").unwrap();
        assert_eq!(h, Handedness::Left);
        let h: Handedness = serde_json::from_str("\"Ambidextrous\"").unwrap();
        assert_eq!(h, Handedness::Unknown);
    }

    #[test]
    fn test_landmark_accepts_both_forms() {
        let a: Landmark = serde_json::from_str("[0.1, 0.2, 0.3]").unwrap();
        let b: Landmark = serde_json::from_str(r#"{"x":0.1,"y":0.2,"z":0.3}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_observation_rejects_short_skeleton() {
        let json = r#"{"handedness":"Right","landmarks":[[0,0,0],[1,1,1]]}"#;
        assert!(serde_json::from_str::<HandObservation>(json).is_err());
    }

    #[test]
    fn test_tracking_keys() {
        assert_eq!(TrackingKey::for_hand(Handedness::Left).as_str(), "Left");
        assert_eq!(
            TrackingKey::for_slot(Handedness::Right, 1).to_string(),
            "Right_1"
        );
        assert_ne!(
            TrackingKey::for_slot(Handedness::Left, 0),
            TrackingKey::for_slot(Handedness::Left, 1)
        );
    }
}
