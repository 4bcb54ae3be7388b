//! Device acquisition, program build, and kernel lifetime.
//!
//! Construction is split in two because the fixed and caller-supplied
//! kernels bind directly to the state-store's buffers: [`DeviceCore::new`]
//! only needs `nx`/`ny` and the model source to pick a device and build the
//! program; [`Kernels::build`] is called once a [`crate::state::StateStore`]
//! exists to bind its buffers as kernel arguments.

use ocl::{Context, Device, Kernel, Platform, Program, Queue};
use tracing::debug;

use crate::error::{Error, Result};
use crate::kernels::{assemble_program_source, KernelDescriptor};
use crate::precision::{DeviceFloat, Real};
use crate::state::StateStore;

/// Work-group sizing used for every device kernel in this crate:
/// `(32, ny>1 ? 4 : 1)` local, each dimension of the global size rounded
/// up to the next multiple of the local size. Kernels bounds-check
/// themselves against `nx,ny`.
pub fn work_group_sizes(nx: usize, ny: usize) -> ((usize, usize), (usize, usize)) {
    let local = (32, if ny > 1 { 4 } else { 1 });
    let round_up = |n: usize, l: usize| ((n + l - 1) / l) * l;
    let global = (round_up(nx, local.0), round_up(ny, local.1));
    (local, global)
}

fn select_device(preference: Option<&str>) -> Result<(Platform, Device)> {
    let platforms = Platform::list();
    let mut devices = Vec::new();
    for platform in &platforms {
        if let Ok(found) = Device::list_all(platform) {
            devices.extend(found.into_iter().map(|d| (*platform, d)));
        }
    }
    if let Some(pref) = preference {
        for (platform, device) in &devices {
            let name = device.name().unwrap_or_default();
            let vendor = device.vendor().unwrap_or_default();
            if name.contains(pref) || vendor.contains(pref) {
                return Ok((*platform, *device));
            }
        }
        return Err(Error::NoDevice(Some(pref.to_string())));
    }
    devices.into_iter().next().ok_or(Error::NoDevice(None))
}

/// Device, context, queue and built program: everything that does not
/// depend on the state arrays.
pub struct DeviceCore {
    pub context: Context,
    pub queue: Queue,
    pub program: Program,
    pub local: (usize, usize),
    pub global: (usize, usize),
}

impl DeviceCore {
    pub fn new(
        model_source: &str,
        nx: usize,
        ny: usize,
        descriptor: &KernelDescriptor,
        device_preference: Option<&str>,
    ) -> Result<Self> {
        let (platform, device) = select_device(device_preference)?;
        debug!(target: "cardiac_ddft.device", device = %device.name().unwrap_or_default(), "device_selected");

        let context = Context::builder().platform(platform).devices(device).build()?;
        let queue = Queue::new(&context, device, None)?;

        let source = assemble_program_source(model_source, descriptor.state_count);
        // Surface the device's build log as the fatal error instead of a
        // bare OpenCL status code.
        let program = Program::builder()
            .devices(device)
            .src(source)
            .build(&context)
            .map_err(|e| Error::KernelBuild { log: e.to_string() })?;

        let (local, global) = work_group_sizes(nx, ny);

        Ok(Self { context, queue, program, local, global })
    }
}

/// The four kernels enqueued each inner iteration, bound to a
/// [`StateStore`]'s buffers.
pub struct Kernels {
    pub diffusion: Kernel,
    pub step: Kernel,
    pub slow: Kernel,
    pub fast: Kernel,
}

impl Kernels {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        core: &DeviceCore,
        store: &StateStore,
        nx: i32,
        ny: i32,
        gx: Real,
        gy: Real,
        nx_paced: i32,
        ny_paced: i32,
    ) -> Result<Self> {
        let gws = [core.global.0, core.global.1];
        let lws = [core.local.0, core.local.1];

        let diffusion = Kernel::builder()
            .program(&core.program)
            .name("diffusion")
            .queue(core.queue.clone())
            .global_work_size(gws)
            .local_work_size(lws)
            .arg(&store.dev_state)
            .arg(&store.dev_idiff)
            .arg(gx)
            .arg(gy)
            .arg(nx)
            .arg(ny)
            .build()?;

        let step = Kernel::builder()
            .program(&core.program)
            .name("step")
            .queue(core.queue.clone())
            .global_work_size(gws)
            .local_work_size(lws)
            .arg(&store.dev_state)
            .arg(&store.dev_deriv)
            .arg_named("dt", Real::from_f64(0.0))
            .arg(nx)
            .arg(ny)
            .build()?;

        // Both `slow` and `fast` take (state, idiff, cache, deriv, time,
        // dt, pace, nx_paced, ny_paced, nx, ny) in this order. `slow` may
        // write `cache`; `fast` only reads it, but the signature is kept
        // identical so both bind the same way.
        let slow = Kernel::builder()
            .program(&core.program)
            .name("slow")
            .queue(core.queue.clone())
            .global_work_size(gws)
            .local_work_size(lws)
            .arg(&store.dev_state)
            .arg(&store.dev_idiff)
            .arg(&store.dev_cache)
            .arg(&store.dev_deriv)
            .arg_named("time", Real::from_f64(0.0))
            .arg_named("dt", Real::from_f64(0.0))
            .arg_named("pace", Real::from_f64(0.0))
            .arg(nx_paced)
            .arg(ny_paced)
            .arg(nx)
            .arg(ny)
            .build()?;

        let fast = Kernel::builder()
            .program(&core.program)
            .name("fast")
            .queue(core.queue.clone())
            .global_work_size(gws)
            .local_work_size(lws)
            .arg(&store.dev_state)
            .arg(&store.dev_idiff)
            .arg(&store.dev_cache)
            .arg(&store.dev_deriv)
            .arg_named("time", Real::from_f64(0.0))
            .arg_named("dt", Real::from_f64(0.0))
            .arg_named("pace", Real::from_f64(0.0))
            .arg(nx_paced)
            .arg(ny_paced)
            .arg(nx)
            .arg(ny)
            .build()?;

        Ok(Self { diffusion, step, slow, fast })
    }

    pub fn set_step_dt(&mut self, dt: Real) -> Result<()> {
        self.step.set_arg("dt", dt)?;
        Ok(())
    }

    pub fn set_derivative_args(&mut self, slow: bool, time: Real, dt: Real, pace: Real) -> Result<()> {
        let kernel = if slow { &mut self.slow } else { &mut self.fast };
        kernel.set_arg("time", time)?;
        kernel.set_arg("dt", dt)?;
        kernel.set_arg("pace", pace)?;
        Ok(())
    }

    pub unsafe fn enqueue_diffusion(&self) -> Result<()> {
        self.diffusion.cmd().enq()?;
        Ok(())
    }

    pub unsafe fn enqueue_derivative(&self, slow: bool) -> Result<()> {
        if slow {
            self.slow.cmd().enq()?;
        } else {
            self.fast.cmd().enq()?;
        }
        Ok(())
    }

    pub unsafe fn enqueue_step(&self) -> Result<()> {
        self.step.cmd().enq()?;
        Ok(())
    }
}
