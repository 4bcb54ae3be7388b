//! Periodic snapshot of selected variables into host-side sequences.

use crate::error::{Error, Result};
use crate::kernels::{KernelDescriptor, VariableBinding};
use crate::state::cell_index;

/// A log key as parsed from its string form, before being resolved against
/// a [`KernelDescriptor`].
#[derive(Clone, Debug, PartialEq)]
pub enum LogKey {
    /// `{component}.{var}` — a scalar binding (time, pace, time_step).
    Scalar { qualified: String },
    /// `{x}.{component}.{var}` — per-cell value in a 1-D grid.
    Cell1D { x: usize, qualified: String },
    /// `{x}.{y}.{component}.{var}` — per-cell value in a 2-D grid.
    Cell2D { x: usize, y: usize, qualified: String },
}

impl LogKey {
    /// Parses a log key. Whether 1-D or 2-D cell keys are expected is
    /// determined by the grid's own `ny` (`ny == 1` means 1-D).
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        match parts.as_slice() {
            [component, var] => Ok(LogKey::Scalar { qualified: format!("{component}.{var}") }),
            [x, component, var] => {
                let x: usize = x
                    .parse()
                    .map_err(|_| Error::UnknownLogKey(raw.to_string()))?;
                Ok(LogKey::Cell1D { x, qualified: format!("{component}.{var}") })
            }
            [x, y, component, var] => {
                let x: usize = x
                    .parse()
                    .map_err(|_| Error::UnknownLogKey(raw.to_string()))?;
                let y: usize = y
                    .parse()
                    .map_err(|_| Error::UnknownLogKey(raw.to_string()))?;
                Ok(LogKey::Cell2D { x, y, qualified: format!("{component}.{var}") })
            }
            _ => Err(Error::UnknownLogKey(raw.to_string())),
        }
    }
}

/// Where a resolved log entry actually reads its value from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogSource {
    Time,
    Pace,
    Dt,
    Diffusion(usize),
    State(usize, usize),
}

/// An appendable host-side sequence a logged variable's values are written
/// into. The caller owns the concrete storage (e.g. a `Vec<f64>` behind a
/// handle); the integrator only ever pushes.
pub trait LogSink {
    fn push(&mut self, value: f64);
}

impl LogSink for Vec<f64> {
    fn push(&mut self, value: f64) {
        Vec::push(self, value)
    }
}

struct Entry {
    source: LogSource,
    sink: Box<dyn LogSink>,
}

/// Ordered mapping from log key to source and sink, built once at `init`.
pub struct LogRegistry {
    entries: Vec<Entry>,
    logging_diffusion: bool,
    logging_states: bool,
}

impl LogRegistry {
    /// Parses every `(key, sink)` pair against `descriptor`, rejecting
    /// unknown keys and out-of-range cell coordinates at init time.
    pub fn build(
        raw: Vec<(String, Box<dyn LogSink>)>,
        descriptor: &KernelDescriptor,
        nx: usize,
        ny: usize,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(raw.len());
        let mut logging_diffusion = false;
        let mut logging_states = false;
        for (key, sink) in raw {
            let parsed = LogKey::parse(&key)?;
            let (qualified, cell) = match &parsed {
                LogKey::Scalar { qualified } => (qualified, None),
                LogKey::Cell1D { x, qualified } => {
                    if *x >= nx {
                        return Err(Error::UnknownLogKey(key));
                    }
                    (qualified, Some(cell_index(*x, 0, nx)))
                }
                LogKey::Cell2D { x, y, qualified } => {
                    if *x >= nx || *y >= ny {
                        return Err(Error::UnknownLogKey(key));
                    }
                    (qualified, Some(cell_index(*x, *y, nx)))
                }
            };
            let binding = descriptor
                .resolve(qualified)
                .ok_or_else(|| Error::UnknownLogKey(key.clone()))?;
            let source = match (binding, cell) {
                (VariableBinding::Time, None) => LogSource::Time,
                (VariableBinding::Pace, None) => LogSource::Pace,
                (VariableBinding::TimeStep, None) => LogSource::Dt,
                (VariableBinding::DiffusionCurrent, Some(c)) => {
                    logging_diffusion = true;
                    LogSource::Diffusion(c)
                }
                (VariableBinding::State(slot), Some(c)) => {
                    logging_states = true;
                    LogSource::State(c, slot)
                }
                _ => return Err(Error::UnknownLogKey(key)),
            };
            entries.push(Entry { source, sink });
        }
        Ok(Self { entries, logging_diffusion, logging_states })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn logging_diffusion(&self) -> bool {
        self.logging_diffusion
    }

    pub fn logging_states(&self) -> bool {
        self.logging_states
    }

    /// Appends the current value of every registered variable.
    /// `state`/`idiff` are the freshly read-back host mirrors;
    /// `time`/`pace`/`dt` are the current scalars.
    pub fn log_all(&mut self, time: f64, pace: f64, dt: f64, state: &[f64], idiff: &[f64], s_count: usize) {
        for entry in &mut self.entries {
            let value = match entry.source {
                LogSource::Time => time,
                LogSource::Pace => pace,
                LogSource::Dt => dt,
                LogSource::Diffusion(c) => idiff[c] as f64,
                LogSource::State(c, s) => state[c * s_count + s] as f64,
            };
            entry.sink.push(value);
        }
    }
}
