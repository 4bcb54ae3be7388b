//! Integrator loop and lifecycle: ties the device, state buffers, fixed
//! and derivative kernels, pacing schedule and log registry into one
//! object with an explicit `init` / `step` / `clean` lifecycle.

use tracing::{debug, warn};

use crate::device::{DeviceCore, Kernels};
use crate::error::{Error, Result};
use crate::kernels::KernelDescriptor;
use crate::logger::{LogRegistry, LogSink};
use crate::pacing::Protocol;
use crate::precision::{DeviceFloat, Real};
use crate::state::StateStore;

/// Result of one call to [`Integrator::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// A cooperative yield point was reached; `t` is the current
    /// simulation time and the run is not finished. Call `step` again to
    /// resume.
    Yielded(f64),
    /// The run reached `tmax`; `t == tmax` and the final state has been
    /// written to the output slice and `clean` has been invoked.
    Completed(f64),
    /// A NaN was detected in the voltage of cell 0 after a log snapshot;
    /// the output slice holds the last state read (which may itself
    /// contain the NaN) and `clean` has been invoked.
    Halted,
}

/// Initialization inputs collected into one struct rather than a long
/// positional argument list.
pub struct IntegratorConfig {
    pub kernel_source: String,
    pub nx: usize,
    pub ny: usize,
    pub gx: f64,
    pub gy: f64,
    pub tmin: f64,
    pub tmax: f64,
    pub default_dt: f64,
    pub state_in: Vec<f64>,
    pub protocol: Box<dyn Protocol>,
    pub nx_paced: usize,
    pub ny_paced: usize,
    pub log_entries: Vec<(String, Box<dyn LogSink>)>,
    pub log_interval: f64,
    pub ratio: u32,
    pub device_preference: Option<String>,
}

impl IntegratorConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel_source: String,
        nx: usize,
        ny: usize,
        gx: f64,
        gy: f64,
        tmin: f64,
        tmax: f64,
        default_dt: f64,
        state_in: Vec<f64>,
        protocol: impl Protocol + 'static,
        nx_paced: usize,
        ny_paced: usize,
        log_interval: f64,
        ratio: u32,
    ) -> Result<Self> {
        let config = Self {
            kernel_source,
            nx,
            ny,
            gx,
            gy,
            tmin,
            tmax,
            default_dt,
            state_in,
            protocol: Box::new(protocol),
            nx_paced,
            ny_paced,
            log_entries: Vec::new(),
            log_interval,
            ratio,
            device_preference: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_log_entries(mut self, entries: Vec<(String, Box<dyn LogSink>)>) -> Self {
        self.log_entries = entries;
        self
    }

    pub fn with_device_preference(mut self, preference: impl Into<String>) -> Self {
        self.device_preference = Some(preference.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(Error::Configuration("nx and ny must be positive".into()));
        }
        if self.gx < 0.0 || self.gy < 0.0 {
            return Err(Error::Configuration("gx and gy must be non-negative".into()));
        }
        if !(self.tmax > self.tmin) {
            return Err(Error::Configuration("tmax must be greater than tmin".into()));
        }
        if self.default_dt <= 0.0 {
            return Err(Error::Configuration("default_dt must be positive".into()));
        }
        if self.ratio < 1 {
            return Err(Error::Configuration("ratio must be >= 1".into()));
        }
        if self.nx_paced > self.nx || self.ny_paced > self.ny {
            return Err(Error::Configuration(
                "nx_paced/ny_paced must not exceed the grid dimensions".into(),
            ));
        }
        Ok(())
    }
}

/// A single tissue simulation. Holds its device resources behind
/// `Option` so `clean` can release them exactly once and tolerate being
/// called again (on drop) without double-freeing anything.
pub struct Integrator {
    device: Option<DeviceCore>,
    kernels: Option<Kernels>,
    store: Option<StateStore>,
    log_registry: LogRegistry,
    protocol: Box<dyn Protocol>,

    s_count: usize,
    tmax: f64,
    default_dt: f64,
    dt_min: f64,
    log_interval: f64,
    ratio: u32,
    yield_every: u64,

    t: f64,
    dt: f64,
    pace: f64,
    t_next_pace: f64,
    t_next_log: f64,
    steps_till_slow: u32,
    halt: bool,
    iters_since_yield: u64,
}

impl Integrator {
    /// Acquires a device, builds the program and buffers, binds the log
    /// registry and takes the first snapshot at `t = tmin`.
    pub fn init(config: IntegratorConfig, descriptor: KernelDescriptor) -> Result<Self> {
        config.validate()?;

        let device = DeviceCore::new(
            &config.kernel_source,
            config.nx,
            config.ny,
            &descriptor,
            config.device_preference.as_deref(),
        )?;
        let store = StateStore::new(
            &device.queue,
            config.nx,
            config.ny,
            descriptor.state_count,
            descriptor.cache_count,
            &config.state_in,
        )?;
        let kernels = Kernels::build(
            &device,
            &store,
            config.nx as i32,
            config.ny as i32,
            Real::from_f64(config.gx),
            Real::from_f64(config.gy),
            config.nx_paced as i32,
            config.ny_paced as i32,
        )?;
        let log_registry =
            LogRegistry::build(config.log_entries, &descriptor, config.nx, config.ny)?;

        let dt_min = config.default_dt * 1e-2;
        let logging_enabled = config.log_interval > 0.0 && !log_registry.is_empty();
        let t_next_log = if logging_enabled { config.tmin } else { config.tmax + 1.0 };

        let mut protocol = config.protocol;
        protocol.advance(config.tmin, config.tmin);
        let pace = protocol.level();
        let t_next_pace = protocol.next_time();

        let n = config.nx * config.ny;
        let yield_every = (1000usize).max(500 + 200_000 / n.max(1)) as u64;

        let mut integrator = Self {
            device: Some(device),
            kernels: Some(kernels),
            store: Some(store),
            log_registry,
            protocol,
            s_count: descriptor.state_count,
            tmax: config.tmax,
            default_dt: config.default_dt,
            dt_min,
            log_interval: config.log_interval,
            ratio: config.ratio,
            yield_every,
            t: config.tmin,
            dt: config.default_dt,
            pace,
            t_next_pace,
            t_next_log,
            steps_till_slow: 0,
            halt: false,
            iters_since_yield: 0,
        };

        if logging_enabled {
            integrator.log_snapshot()?;
        }

        Ok(integrator)
    }

    pub fn state_len(&self) -> usize {
        self.store.as_ref().map_or(0, |s| s.len())
    }

    /// Runs inner iterations until a yield boundary, NaN halt, or `tmax`
    /// is reached. On `Completed`/`Halted`, the final state is written to
    /// `state_out` and `clean` is invoked.
    pub fn step(&mut self, state_out: &mut [f64]) -> Result<StepOutcome> {
        if self.device.is_none() {
            return Err(Error::NotInitialized);
        }
        loop {
            self.run_inner_iteration()?;

            if self.t >= self.t_next_log {
                self.log_snapshot()?;
                if self.check_nan()? {
                    self.halt = true;
                }
                self.t_next_log += self.log_interval;
            }

            if self.t >= self.tmax || self.halt {
                let halted = self.halt;
                self.finish(state_out)?;
                return Ok(if halted {
                    StepOutcome::Halted
                } else {
                    StepOutcome::Completed(self.t)
                });
            }

            self.choose_next_dt();

            self.iters_since_yield += 1;
            if self.iters_since_yield >= self.yield_every {
                self.iters_since_yield = 0;
                self.flush()?;
                return Ok(StepOutcome::Yielded(self.t));
            }
        }
    }

    /// One diffusion + derivative + Euler-update cycle. Diffusion always
    /// observes the pre-iteration state; the derivative kernel alternates
    /// between a "slow" evaluation every `ratio` iterations (which
    /// refills the cache) and cheaper "fast" evaluations that reuse it.
    fn run_inner_iteration(&mut self) -> Result<()> {
        let kernels = self.kernels.as_mut().unwrap();
        unsafe { kernels.enqueue_diffusion()? };

        let (run_slow, next_steps_till_slow) = next_slow_decision(self.steps_till_slow, self.ratio);
        kernels.set_derivative_args(
            run_slow,
            Real::from_f64(self.t),
            Real::from_f64(self.dt),
            Real::from_f64(self.pace),
        )?;
        unsafe { kernels.enqueue_derivative(run_slow)? };
        self.steps_till_slow = next_steps_till_slow;

        kernels.set_step_dt(Real::from_f64(self.dt))?;
        unsafe { kernels.enqueue_step()? };

        let t_before = self.t;
        self.t += self.dt;
        self.advance_pacing(t_before, self.t);
        Ok(())
    }

    fn advance_pacing(&mut self, t_from: f64, t_to: f64) {
        self.protocol.advance(t_from, t_to);
        self.pace = self.protocol.level();
        self.t_next_pace = self.protocol.next_time();
    }

    /// Shrinks `dt` toward `tmax` or the next pacing transition so the
    /// run lands exactly on either boundary, but never below `dt_min`.
    /// Log boundaries never shrink `dt` — a run can overshoot a log point
    /// and catch it on the following iteration's check instead.
    fn choose_next_dt(&mut self) {
        self.dt = choose_dt(self.t, self.tmax, self.t_next_pace, self.default_dt, self.dt_min);
    }

    /// Reads back only the buffers the log registry actually references
    /// and appends the current value of every logged variable. The
    /// logged `dt` is the step size that just advanced the run past the
    /// log point, not the (possibly shrunk) step about to be taken next.
    fn log_snapshot(&mut self) -> Result<()> {
        let store = self.store.as_mut().unwrap();
        if self.log_registry.logging_states() {
            store.dev_state.cmd().read(&mut store.host_state).enq()?;
        }
        if self.log_registry.logging_diffusion() {
            store.read_idiff()?;
        }
        let state_f64: Vec<f64> = store.host_state.iter().map(|v| *v as f64).collect();
        let idiff_f64: Vec<f64> = store.host_idiff.iter().map(|v| *v as f64).collect();
        self.log_registry
            .log_all(self.t, self.pace, self.dt, &state_f64, &idiff_f64, self.s_count);
        Ok(())
    }

    /// Only cell 0's membrane potential is checked; this is deliberate
    /// and not widened to every cell (see the design notes on this
    /// decision).
    fn check_nan(&mut self) -> Result<bool> {
        let store = self.store.as_mut().unwrap();
        if !self.log_registry.logging_states() {
            store.dev_state.cmd().read(&mut store.host_state).enq()?;
        }
        let v0 = store.host_state[0] as f64;
        if !v0.is_finite() {
            warn!(target: "cardiac_ddft.integrator", t = self.t, "nan_halt");
        }
        Ok(!v0.is_finite())
    }

    fn flush(&mut self) -> Result<()> {
        self.device.as_ref().unwrap().queue.finish()?;
        debug!(target: "cardiac_ddft.integrator", t = self.t, "yield");
        Ok(())
    }

    fn finish(&mut self, state_out: &mut [f64]) -> Result<()> {
        self.store.as_mut().unwrap().read_state_into(state_out)?;
        self.clean();
        Ok(())
    }

    /// Releases device objects and host arrays in reverse allocation
    /// order. Idempotent: calling it twice, or calling it after `step`
    /// has already done so, is a no-op.
    pub fn clean(&mut self) {
        self.kernels.take();
        self.store.take();
        self.device.take();
    }
}

impl Drop for Integrator {
    fn drop(&mut self) {
        self.clean();
    }
}

/// Pure `spec.md` §4.7 step 2 slow/fast decision, split out of
/// [`Integrator::run_inner_iteration`] so it is testable without a device.
/// Returns `(run_slow_this_iteration, steps_till_slow_for_next_iteration)`.
fn next_slow_decision(steps_till_slow: u32, ratio: u32) -> (bool, u32) {
    let run_slow = steps_till_slow == 0;
    let next = if run_slow { ratio - 1 } else { steps_till_slow - 1 };
    (run_slow, next)
}

/// Pure `spec.md` §4.7 step 7 dt-chooser, split out of
/// [`Integrator::choose_next_dt`] so it is testable without a device.
fn choose_dt(t: f64, tmax: f64, t_next_pace: f64, default_dt: f64, dt_min: f64) -> f64 {
    let mut dt = default_dt;
    let remaining_tmax = tmax - t;
    if remaining_tmax > dt_min && remaining_tmax < dt {
        dt = remaining_tmax;
    }
    let remaining_pace = t_next_pace - t;
    if remaining_pace > dt_min && remaining_pace < dt {
        dt = remaining_pace;
    }
    dt
}
