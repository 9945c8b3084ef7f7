//! Outbound message schema: one JSON object per processed frame.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::hand::features::{CurlState, FingerBend};
use crate::hand::geometry::Vec3;
use crate::hand::gesture::{GestureLabel, HandRecord, PinchComponents};
use crate::hand::landmarks::{Finger, Handedness, Landmark};

/// Per-frame message.
#[derive(Debug, Clone, Serialize)]
pub struct FramePacket {
    pub hands: Vec<HandPacket>,
    pub fps: f64,
}

impl FramePacket {
    pub fn new(hands: &[HandRecord], fps: f64) -> Self {
        Self {
            hands: hands.iter().map(HandPacket::from_record).collect(),
            fps,
        }
    }
}

/// Per-hand portion of a [`FramePacket`]. Finger maps are keyed by
/// finger name; four-element arrays run index, middle, ring, pinky.
#[derive(Debug, Clone, Serialize)]
pub struct HandPacket {
    pub handedness: Handedness,
    pub visible: bool,
    pub gesture: GestureLabel,
    pub confidence: f64,
    pub pinch_distance: f64,
    pub pinch_strength: f64,
    pub pinch_confidence: f64,
    pub pinch_components: PinchComponents,
    pub thumb_angle: f64,
    pub curls: [bool; 4],
    pub curl_scores: [f64; 4],
    pub curl_states: [CurlState; 4],
    pub curl_angles: [f64; 4],
    pub curled_count: usize,
    pub extended_count: usize,
    pub joint_angles: BTreeMap<&'static str, Vec<f64>>,
    pub finger_bends: BTreeMap<&'static str, FingerBend>,
    pub finger_states_map: BTreeMap<&'static str, CurlState>,
    pub finger_scores_map: BTreeMap<&'static str, f64>,
    pub palm_size: f64,
    pub direction_vectors: BTreeMap<&'static str, Vec3>,
    pub wrist: Landmark,
    pub timestamp: f64,
    pub dt: f64,
}

impl HandPacket {
    pub fn from_record(hand: &HandRecord) -> Self {
        let mut packet = Self {
            handedness: hand.handedness(),
            visible: hand.visible,
            gesture: hand.gesture,
            confidence: hand.confidence,
            pinch_distance: 0.0,
            pinch_strength: hand.pinch.strength,
            pinch_confidence: hand.pinch.confidence,
            pinch_components: hand.pinch.components,
            thumb_angle: 0.0,
            curls: [false; 4],
            curl_scores: [0.0; 4],
            curl_states: [CurlState::Extended; 4],
            curl_angles: [0.0; 4],
            curled_count: 0,
            extended_count: 4,
            joint_angles: BTreeMap::new(),
            finger_bends: BTreeMap::new(),
            finger_states_map: BTreeMap::new(),
            finger_scores_map: BTreeMap::new(),
            palm_size: 0.0,
            direction_vectors: BTreeMap::new(),
            wrist: hand.observation.wrist(),
            timestamp: hand.timestamp(),
            dt: hand.dt,
        };

        let Some(f) = hand.features.as_ref() else {
            return packet;
        };
        packet.pinch_distance = f.pinch_distance;
        packet.thumb_angle = f.thumb_angle;
        packet.curls = f.curls();
        packet.curl_scores = f.curl_scores();
        packet.curl_states = f.curl_states();
        packet.curl_angles = f.curl_angles();
        packet.curled_count = f.curled_count();
        packet.extended_count = f.extended_count();
        packet.palm_size = f.palm_size;
        packet.wrist = f.wrist;
        for finger in Finger::ALL {
            let ff = f.finger(finger);
            let name = finger.as_str();
            packet.joint_angles.insert(name, ff.joint_angles.clone());
            packet.finger_bends.insert(name, ff.bend);
            packet.finger_states_map.insert(name, ff.curl);
            packet.finger_scores_map.insert(name, ff.curl.score());
            packet.direction_vectors.insert(name, ff.direction);
        }
        packet
    }
}
