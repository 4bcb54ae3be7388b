//! Piecewise-constant pacing schedule.

use crate::error::{Error, Result};

/// One entry of a pacing schedule: a stimulus of `level` (scaled by
/// `multiplier` on each successive repetition) active for `length` time
/// units starting at `start`, repeating every `period` until the next step
/// begins (or forever if this is the last step and `period` is finite).
#[derive(Clone, Copy, Debug)]
pub struct PacingStep {
    pub start: f64,
    pub length: f64,
    pub level: f64,
    pub period: f64,
    pub multiplier: f64,
}

impl PacingStep {
    pub fn new(start: f64, length: f64, level: f64, period: f64, multiplier: f64) -> Result<Self> {
        if length <= 0.0 || period <= 0.0 || length > period {
            return Err(Error::Protocol(format!(
                "pacing step at t={start} has length={length}, period={period} (need 0 < length <= period)"
            )));
        }
        Ok(Self { start, length, level, period, multiplier })
    }

    /// Level contributed by this step at time `t`, or `None` if `t` lies
    /// outside every repetition of this step.
    fn level_at(&self, t: f64) -> Option<f64> {
        if t < self.start {
            return None;
        }
        let elapsed = t - self.start;
        let rep = (elapsed / self.period).floor();
        let phase = elapsed - rep * self.period;
        if phase < self.length {
            Some(self.level * self.multiplier.powf(rep))
        } else {
            None
        }
    }

    /// Least time `> t` at which this step's contribution changes, or
    /// `+inf` if this step contributes nothing more after `t`.
    fn next_transition_after(&self, t: f64) -> f64 {
        if t < self.start {
            return self.start;
        }
        let elapsed = t - self.start;
        let rep = (elapsed / self.period).floor();
        let phase = elapsed - rep * self.period;
        if phase < self.length {
            self.start + rep * self.period + self.length
        } else {
            self.start + (rep + 1.0) * self.period
        }
    }
}

/// The external collaborator producing a piecewise-constant `pace(t)`.
///
/// This is a stateful cursor, not a pure function: `advance` is the one
/// operation the integrator loop calls each inner iteration (`spec.md`
/// §4.7 step 4), and `level`/`next_time` read back what it left behind.
/// Implementors own whatever internal position makes `advance` cheap to
/// call every iteration; callers never reach around it to recompute
/// `pace(t)` themselves.
pub trait Protocol {
    /// Advances internal position so that the current level is `pace(t_to)`
    /// and the next event time is the least `t_e > t_to` at which the level
    /// changes (or `+inf` if none). Idempotent when `t_to` does not cross a
    /// boundary.
    fn advance(&mut self, t_from: f64, t_to: f64);
    /// The level as of the most recent `advance`.
    fn level(&self) -> f64;
    /// The next transition time as of the most recent `advance`.
    fn next_time(&self) -> f64;
}

/// A finite list of [`PacingStep`]s forming a piecewise-constant `pace(t)`.
/// Steps may overlap; overlapping contributions sum, matching a stimulus
/// train built from several superimposed protocols.
#[derive(Clone, Debug)]
pub struct PacingDriver {
    steps: Vec<PacingStep>,
    pace: f64,
    t_next_pace: f64,
}

impl PacingDriver {
    pub fn new(steps: Vec<PacingStep>) -> Self {
        Self { steps, pace: 0.0, t_next_pace: f64::INFINITY }
    }

    /// An empty protocol: zero stimulus for all time.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }
}

impl Protocol for PacingDriver {
    fn advance(&mut self, _t_from: f64, t_to: f64) {
        self.pace = self.steps.iter().filter_map(|s| s.level_at(t_to)).sum();
        self.t_next_pace = self
            .steps
            .iter()
            .map(|s| s.next_transition_after(t_to))
            .fold(f64::INFINITY, f64::min);
    }

    fn level(&self) -> f64 {
        self.pace
    }

    fn next_time(&self) -> f64 {
        self.t_next_pace
    }
}
