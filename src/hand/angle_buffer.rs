//! Fixed-window moving average of joint angles, keyed by (finger, joint).

use std::collections::{HashMap, VecDeque};

use super::landmarks::Finger;

/// Default number of frames averaged per joint.
pub const DEFAULT_ANGLE_WINDOW: usize = 5;

/// Per-joint moving-average accumulator.
///
/// Queries before the window is full average the samples present; nothing
/// is zero-padded.
#[derive(Debug, Clone)]
pub struct AngleBuffer {
    capacity: usize,
    windows: HashMap<(Finger, usize), VecDeque<f64>>,
}

impl Default for AngleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_ANGLE_WINDOW)
    }
}

impl AngleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `value` for the joint and return the current window mean.
    pub fn update(&mut self, finger: Finger, joint: usize, value: f64) -> f64 {
        let capacity = self.capacity;
        let window = self
            .windows
            .entry((finger, joint))
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        window.push_back(value);
        while window.len() > capacity {
            window.pop_front();
        }
        window.iter().sum::<f64>() / window.len() as f64
    }

    /// Smooth one finger's raw angles in joint order.
    pub fn smooth(&mut self, finger: Finger, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .enumerate()
            .map(|(joint, &value)| self.update(finger, joint, value))
            .collect()
    }

    /// Drop every joint's history.
    pub fn reset(&mut self) {
        self.windows.clear();
    }

    /// Change the window length. History is discarded.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.reset();
    }

    /// Samples currently held for a joint.
    #[cfg(test)]
    pub fn len(&self, finger: Finger, joint: usize) -> usize {
        self.windows.get(&(finger, joint)).map_or(0, VecDeque::len)
    }
}
