//! Fixed OpenCL C kernel sources (diffusion, step) and the descriptor that
//! tells the integrator how to talk to the caller-supplied derivative
//! kernels.
//!
//! The integrator never needs to understand the model: it only needs the
//! per-cell state count `S`, the cache count `K`, and a binding table
//! mapping qualified variable names (`component.var`) to either a state
//! slot or one of the three scalar bindings `time`/`pace`/`diffusion_current`
//! produced by the model parser.

use std::collections::HashMap;

/// Where a qualified variable name (`component.var`) resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableBinding {
    Time,
    Pace,
    TimeStep,
    DiffusionCurrent,
    State(usize),
}

/// Small descriptor accompanying generated kernel source: how many state
/// variables per cell, how many slow-cache slots, and how qualified
/// variable names resolve for logging purposes.
#[derive(Clone, Debug, Default)]
pub struct KernelDescriptor {
    pub state_count: usize,
    pub cache_count: usize,
    bindings: HashMap<String, VariableBinding>,
}

impl KernelDescriptor {
    pub fn new(state_count: usize, cache_count: usize) -> Self {
        Self { state_count, cache_count, bindings: HashMap::new() }
    }

    /// Register a qualified name resolving to a variable binding. Chainable
    /// so a descriptor can be built up fluently by the (out of scope) code
    /// generator's output.
    pub fn with_binding(mut self, qualified: impl Into<String>, binding: VariableBinding) -> Self {
        self.bindings.insert(qualified.into(), binding);
        self
    }

    pub fn resolve(&self, qualified: &str) -> Option<VariableBinding> {
        self.bindings.get(qualified).copied()
    }
}

/// Contract for the caller-supplied derivative kernels. The model source
/// handed to [`crate::integrator::Integrator::init`] must
/// define both of:
///
/// ```text
/// __kernel void slow(
///     __global const REAL* state, __global const REAL* idiff,
///     __global REAL* cache,       __global REAL* deriv,
///     const REAL time, const REAL dt, const REAL pace,
///     const int nx_paced, const int ny_paced,
///     const int nx, const int ny)
///
/// __kernel void fast(
///     __global const REAL* state, __global const REAL* idiff,
///     __global const REAL* cache, __global REAL* deriv,
///     const REAL time, const REAL dt, const REAL pace,
///     const int nx_paced, const int ny_paced,
///     const int nx, const int ny)
/// ```
///
/// Both read `state` and `idiff` and write `deriv`; only `slow` writes
/// `cache`. Neither writes `state`.
pub const DERIVATIVE_KERNEL_CONTRACT: &str = "slow(state,idiff,cache,deriv,time,dt,pace,nx_paced,ny_paced,nx,ny) / fast(state,idiff,cache,deriv,time,dt,pace,nx_paced,ny_paced,nx,ny)";

/// Zero-flux (Neumann) five-point Laplacian diffusion kernel. `REAL` is
/// defined by the [`crate::precision`] prelude before this source is
/// concatenated into the build.
pub const DIFFUSION_SOURCE: &str = r#"
__kernel void diffusion(
    __global const REAL* state,
    __global REAL* idiff,
    const REAL gx,
    const REAL gy,
    const int nx,
    const int ny)
{
    int x = get_global_id(0);
    int y = get_global_id(1);
    if (x >= nx || y >= ny) return;
    int c = y*nx + x;
    REAL v = state[c * STATE_COUNT];
    REAL v_xm = (x > 0)      ? state[(c - 1) * STATE_COUNT]  : v;
    REAL v_xp = (x < nx - 1) ? state[(c + 1) * STATE_COUNT]  : v;
    REAL v_ym = (y > 0)      ? state[(c - nx) * STATE_COUNT] : v;
    REAL v_yp = (y < ny - 1) ? state[(c + nx) * STATE_COUNT] : v;
    idiff[c] = gx * (2.0 * v - v_xm - v_xp) + gy * (2.0 * v - v_ym - v_yp);
}
"#;

/// Forward-Euler state update: `state[c,s] += dt * deriv[c,s]`. No
/// clipping, no projection.
pub const STEP_SOURCE: &str = r#"
__kernel void step(
    __global REAL* state,
    __global const REAL* deriv,
    const REAL dt,
    const int nx,
    const int ny)
{
    int x = get_global_id(0);
    int y = get_global_id(1);
    if (x >= nx || y >= ny) return;
    int c = y*nx + x;
    for (int s = 0; s < STATE_COUNT; s++) {
        int i = c * STATE_COUNT + s;
        state[i] += dt * deriv[i];
    }
}
"#;

/// Assembles the full device program source: precision prelude, the
/// `STATE_COUNT` macro the fixed kernels rely on, then the diffusion and
/// step kernels, then the caller-supplied derivative kernel source (which
/// must define `__kernel void slow(...)` and `__kernel void fast(...)`).
pub fn assemble_program_source(model_source: &str, state_count: usize) -> String {
    format!(
        "{prelude}#define STATE_COUNT {state_count}\n{diffusion}\n{step}\n{model}\n",
        prelude = crate::precision::REAL_DEFINE,
        state_count = state_count,
        diffusion = DIFFUSION_SOURCE,
        step = STEP_SOURCE,
        model = model_source,
    )
}
