//! Bounded motion windows and finite-difference velocities.
//!
//! Velocity is taken across the whole window span (newest minus oldest
//! over their time gap) rather than between the last two samples, which
//! smooths detector jitter at the cost of some lag.

use std::collections::{HashMap, VecDeque};

use super::landmarks::TrackingKey;

/// Default window length in samples.
pub const DEFAULT_HISTORY_LEN: usize = 4;

/// Default time span at or below which velocity is reported as zero.
pub const DEFAULT_NOISE_FLOOR: f64 = 1e-6;

// ── Timed window ───────────────────────────────────────────

/// Bounded oldest-first sequence of `(t, sample)` pairs.
#[derive(Debug, Clone)]
pub struct TimedWindow<T> {
    capacity: usize,
    samples: VecDeque<(f64, T)>,
}

impl<T: Copy> TimedWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn push(&mut self, t: f64, sample: T) {
        self.samples.push_back((t, sample));
        self.trim();
    }

    /// Change the capacity, dropping the oldest samples on shrink.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.trim();
    }

    fn trim(&mut self) {
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Oldest and newest samples, if at least two are held.
    pub fn endpoints(&self) -> Option<((f64, T), (f64, T))> {
        if self.samples.len() < 2 {
            return None;
        }
        Some((*self.samples.front()?, *self.samples.back()?))
    }

    /// Time between oldest and newest sample (0 with fewer than two).
    #[cfg(test)]
    pub fn span(&self) -> f64 {
        self.endpoints().map_or(0.0, |((t0, _), (t1, _))| t1 - t0)
    }
}

impl TimedWindow<f64> {
    /// Rate of change across the window, 0 when the span is at or below
    /// `noise_floor`.
    pub fn velocity(&self, noise_floor: f64) -> f64 {
        match self.endpoints() {
            Some(((t0, d0), (t1, d1))) if t1 - t0 > noise_floor => (d1 - d0) / (t1 - t0),
            _ => 0.0,
        }
    }
}

impl TimedWindow<[f64; 2]> {
    /// Per-axis rate of change across the window.
    pub fn velocity_xy(&self, noise_floor: f64) -> [f64; 2] {
        match self.endpoints() {
            Some(((t0, p0), (t1, p1))) if t1 - t0 > noise_floor => {
                let dt = t1 - t0;
                [(p1[0] - p0[0]) / dt, (p1[1] - p0[1]) / dt]
            }
            _ => [0.0; 2],
        }
    }
}

// ── Motion history ─────────────────────────────────────────

/// Velocities derived for one hand in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSample {
    pub vx: f64,
    pub vy: f64,
    pub pinch_velocity: f64,
}

#[derive(Debug, Clone)]
struct HandMotion {
    wrist: TimedWindow<[f64; 2]>,
    pinch: TimedWindow<f64>,
}

/// Per-hand wrist and pinch-distance windows.
#[derive(Debug, Clone)]
pub struct MotionHistory {
    capacity: usize,
    noise_floor: f64,
    hands: HashMap<TrackingKey, HandMotion>,
}

impl Default for MotionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN, DEFAULT_NOISE_FLOOR)
    }
}

impl MotionHistory {
    pub fn new(capacity: usize, noise_floor: f64) -> Self {
        Self {
            capacity: capacity.max(1),
            noise_floor: noise_floor.max(0.0),
            hands: HashMap::new(),
        }
    }

    /// Apply new limits; existing windows are trimmed oldest-first.
    pub fn configure(&mut self, capacity: usize, noise_floor: f64) {
        let capacity = capacity.max(1);
        self.noise_floor = noise_floor.max(0.0);
        if capacity != self.capacity {
            self.capacity = capacity;
            for motion in self.hands.values_mut() {
                motion.wrist.set_capacity(capacity);
                motion.pinch.set_capacity(capacity);
            }
        }
    }

    /// Record this frame's wrist position and pinch distance for `key` and
    /// return the resulting velocities.
    pub fn record(
        &mut self,
        key: &TrackingKey,
        t: f64,
        wrist: [f64; 2],
        pinch_distance: f64,
    ) -> MotionSample {
        let capacity = self.capacity;
        let motion = self.hands.entry(key.clone()).or_insert_with(|| HandMotion {
            wrist: TimedWindow::new(capacity),
            pinch: TimedWindow::new(capacity),
        });
        motion.wrist.push(t, wrist);
        motion.pinch.push(t, pinch_distance);

        let [vx, vy] = motion.wrist.velocity_xy(self.noise_floor);
        MotionSample {
            vx,
            vy,
            pinch_velocity: motion.pinch.velocity(self.noise_floor),
        }
    }

    /// Number of samples held for `key`'s wrist window.
    #[cfg(test)]
    pub fn len(&self, key: &TrackingKey) -> usize {
        self.hands.get(key).map_or(0, |m| m.wrist.len())
    }
}
