//! Temporal label stabilization.
//!
//! Three interchangeable strategies turn a per-frame candidate label into
//! a steadier label with a confidence in `[0, 1]`:
//!
//! - **voting**: majority over a bounded window of recent candidates.
//! - **ema**: exponentially decayed score per label.
//! - **hysteresis**: keep the current label until a challenger wins a
//!   large enough share of the recent window.
//!
//! The mode is fixed per configuration snapshot, so [`Stabilizer`] is a
//! plain enum rather than a trait object.

use std::collections::VecDeque;

use crate::config::{Config, SmoothingMode};

/// EMA scores below this are dropped.
const EMA_PRUNE: f64 = 1e-6;

/// Parameters for building or reconfiguring a [`Stabilizer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizerSettings {
    pub mode: SmoothingMode,
    /// Voting and hysteresis window length.
    pub window: usize,
    pub ema_alpha: f64,
    pub enter: f64,
    pub exit: f64,
}

impl StabilizerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            mode: cfg.smoothing.mode,
            window: cfg.classifier.history_len.max(1),
            ema_alpha: cfg.smoothing.ema_alpha.clamp(0.0, 1.0),
            enter: cfg.smoothing.hysteresis_enter,
            exit: cfg.smoothing.hysteresis_exit,
        }
    }
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ── Label window ───────────────────────────────────────────

/// Bounded window of recent labels.
#[derive(Debug, Clone)]
struct LabelWindow<L> {
    capacity: usize,
    labels: VecDeque<L>,
}

impl<L: Copy + PartialEq> LabelWindow<L> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            labels: VecDeque::new(),
        }
    }

    fn push(&mut self, label: L) {
        self.labels.push_back(label);
        self.trim();
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.trim();
    }

    fn trim(&mut self) {
        while self.labels.len() > self.capacity {
            self.labels.pop_front();
        }
    }

    fn count(&self, label: L) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    fn fraction(&self, label: L) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.count(label) as f64 / self.labels.len() as f64
    }

    /// Most frequent label; ties go to the one seen first in the window.
    fn majority(&self) -> Option<(L, usize)> {
        let mut best: Option<(L, usize)> = None;
        for &label in &self.labels {
            let votes = self.count(label);
            if best.map_or(true, |(_, b)| votes > b) {
                best = Some((label, votes));
            }
        }
        best
    }
}

// ── Strategies ─────────────────────────────────────────────

/// Majority vote over the last `window` candidates.
#[derive(Debug, Clone)]
pub struct Voting<L> {
    window: LabelWindow<L>,
}

impl<L: Copy + PartialEq> Voting<L> {
    pub fn new(window: usize) -> Self {
        Self {
            window: LabelWindow::new(window),
        }
    }

    pub fn stabilize(&mut self, candidate: L) -> (L, f64) {
        self.window.push(candidate);
        match self.window.majority() {
            Some((label, votes)) => (label, votes as f64 / self.window.labels.len() as f64),
            None => (candidate, 0.0),
        }
    }
}

/// Exponentially decayed per-label score.
#[derive(Debug, Clone)]
pub struct EmaScores<L> {
    alpha: f64,
    /// Insertion-ordered so ties resolve to the older label.
    scores: Vec<(L, f64)>,
}

impl<L: Copy + PartialEq> EmaScores<L> {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            scores: Vec::new(),
        }
    }

    pub fn stabilize(&mut self, candidate: L) -> (L, f64) {
        let keep = 1.0 - self.alpha;
        for (_, score) in self.scores.iter_mut() {
            *score *= keep;
        }
        self.scores.retain(|(_, score)| *score >= EMA_PRUNE);

        match self.scores.iter_mut().find(|(l, _)| *l == candidate) {
            Some((_, score)) => *score += self.alpha,
            None => self.scores.push((candidate, self.alpha)),
        }

        let mut top: Option<(L, f64)> = None;
        for &(label, score) in &self.scores {
            if top.map_or(true, |(_, s)| score > s) {
                top = Some((label, score));
            }
        }
        let total: f64 = self.scores.iter().map(|(_, s)| s).sum();
        match top {
            Some((label, score)) if total > 0.0 => (label, score / total),
            Some((label, _)) => (label, 0.0),
            None => (candidate, 0.0),
        }
    }

    /// Current decayed score for `label`.
    #[cfg(test)]
    pub fn score(&self, label: L) -> f64 {
        self.scores
            .iter()
            .find(|(l, _)| *l == label)
            .map_or(0.0, |(_, s)| *s)
    }
}

/// Two-threshold label latch backed by a voting window.
#[derive(Debug, Clone)]
pub struct Hysteresis<L> {
    window: LabelWindow<L>,
    enter: f64,
    exit: f64,
    last: Option<L>,
}

impl<L: Copy + PartialEq> Hysteresis<L> {
    pub fn new(window: usize, enter: f64, exit: f64) -> Self {
        Self {
            window: LabelWindow::new(window),
            enter,
            exit,
            last: None,
        }
    }

    pub fn stabilize(&mut self, candidate: L) -> (L, f64) {
        self.window.push(candidate);
        let last = match self.last {
            None => {
                self.last = Some(candidate);
                return (candidate, 1.0);
            }
            Some(last) if last == candidate => return (last, 1.0),
            Some(last) => last,
        };

        let share = self.window.fraction(candidate);
        if share >= self.enter {
            self.last = Some(candidate);
            (candidate, share)
        } else {
            (last, share.max(self.exit))
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<L> {
        self.last
    }
}

// ── Dispatch ───────────────────────────────────────────────

/// Label stabilizer for one hand.
#[derive(Debug, Clone)]
pub enum Stabilizer<L> {
    Voting(Voting<L>),
    Ema(EmaScores<L>),
    Hysteresis(Hysteresis<L>),
}

impl<L: Copy + PartialEq> Stabilizer<L> {
    pub fn new(settings: &StabilizerSettings) -> Self {
        match settings.mode {
            SmoothingMode::Voting => Self::Voting(Voting::new(settings.window)),
            SmoothingMode::Ema => Self::Ema(EmaScores::new(settings.ema_alpha)),
            SmoothingMode::Hysteresis => Self::Hysteresis(Hysteresis::new(
                settings.window,
                settings.enter,
                settings.exit,
            )),
        }
    }

    pub fn mode(&self) -> SmoothingMode {
        match self {
            Self::Voting(_) => SmoothingMode::Voting,
            Self::Ema(_) => SmoothingMode::Ema,
            Self::Hysteresis(_) => SmoothingMode::Hysteresis,
        }
    }

    /// Apply new settings. A mode change starts from scratch; otherwise
    /// history is kept and windows are trimmed oldest-first.
    pub fn reconfigure(&mut self, settings: &StabilizerSettings) {
        if settings.mode != self.mode() {
            *self = Self::new(settings);
            return;
        }
        match self {
            Self::Voting(v) => v.window.set_capacity(settings.window),
            Self::Ema(e) => e.alpha = settings.ema_alpha.clamp(0.0, 1.0),
            Self::Hysteresis(h) => {
                h.window.set_capacity(settings.window);
                h.enter = settings.enter;
                h.exit = settings.exit;
            }
        }
    }

    /// Fold this frame's candidate in and return `(label, confidence)`.
    pub fn stabilize(&mut self, candidate: L) -> (L, f64) {
        match self {
            Self::Voting(v) => v.stabilize(candidate),
            Self::Ema(e) => e.stabilize(candidate),
            Self::Hysteresis(h) => h.stabilize(candidate),
        }
    }
}
