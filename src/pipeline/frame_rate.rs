//! Rolling frame-rate estimate for the capture worker.
//!
//! Keeps the arrival times of the last `window_size` frames; the rate is
//! `(n - 1) / (t_last - t_first)` over that window.

use std::collections::VecDeque;

/// Rolling frame arrival statistics.
#[derive(Debug)]
pub struct FrameRate {
    /// Arrival timestamps (seconds), oldest first.
    arrivals: VecDeque<f64>,
    /// Maximum number of samples to keep.
    pub window_size: usize,
    /// Total frames recorded since start.
    pub total_frames: u64,
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new(20)
    }
}

impl FrameRate {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(2);
        Self {
            arrivals: VecDeque::with_capacity(window_size),
            window_size,
            total_frames: 0,
        }
    }

    /// Record a frame arrival and return the updated rate.
    pub fn record_frame(&mut self, t: f64) -> f64 {
        self.arrivals.push_back(t);
        while self.arrivals.len() > self.window_size {
            self.arrivals.pop_front();
        }
        self.total_frames += 1;
        self.fps()
    }

    /// Change the window, dropping the oldest samples on shrink.
    pub fn set_window(&mut self, window_size: usize) {
        self.window_size = window_size.max(2);
        while self.arrivals.len() > self.window_size {
            self.arrivals.pop_front();
        }
    }

    /// Frames per second over the current window, 0 until two frames with
    /// distinct times have arrived.
    pub fn fps(&self) -> f64 {
        match (self.arrivals.front(), self.arrivals.back()) {
            (Some(first), Some(last)) if last - first > 0.0 => {
                (self.arrivals.len() - 1) as f64 / (last - first)
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rate() {
        let fr = FrameRate::new(20);
        assert_eq!(fr.fps(), 0.0);
        assert_eq!(fr.total_frames, 0);
    }

    #[test]
    fn test_single_frame() {
        let mut fr = FrameRate::new(20);
        assert_eq!(fr.record_frame(1.0), 0.0);
    }

    #[test]
    fn test_steady_rate() {
        let mut fr = FrameRate::new(20);
        let mut fps = 0.0;
        for i in 0..31 {
            fps = fr.record_frame(i as f64 / 30.0);
        }
        assert!((fps - 30.0).abs() < 1e-6);
        assert_eq!(fr.total_frames, 31);
    }

    #[test]
    fn test_window_trim() {
        let mut fr = FrameRate::new(5);
        // Slow start, then 10 Hz.
        fr.record_frame(0.0);
        fr.record_frame(1.0);
        for i in 1..=5 {
            fr.record_frame(1.0 + i as f64 * 0.1);
        }
        assert!((fr.fps() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_timestamps() {
        let mut fr = FrameRate::new(5);
        fr.record_frame(2.0);
        assert_eq!(fr.record_frame(2.0), 0.0);
    }

    #[test]
    fn test_shrink_window() {
        let mut fr = FrameRate::new(10);
        for i in 0..10 {
            fr.record_frame(i as f64);
        }
        fr.set_window(3);
        assert!((fr.fps() - 1.0).abs() < 1e-9);
        fr.set_window(0);
        assert_eq!(fr.window_size, 2);
    }
}
