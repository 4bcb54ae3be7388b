//! Flat host/device arrays for state, diffusion current and the slow cache.
//!
//! State layout: for each cell, all `s_count` state scalars contiguously;
//! index 0 of each cell is the membrane potential. Cells are indexed
//! `c = y*nx + x`.

use ocl::{Buffer, Queue};

use crate::error::{Error, Result};
use crate::precision::Real;

/// Flat cell index for a grid point, matching `c = y*nx + x`.
#[inline]
pub fn cell_index(x: usize, y: usize, nx: usize) -> usize {
    y * nx + x
}

/// Offset of state component `s` of cell `c` in the flat state array.
#[inline]
pub fn state_offset(cell: usize, s: usize, s_count: usize) -> usize {
    cell * s_count + s
}

/// Checks `state_in` has length `nx*ny*s_count` and every element finite,
/// per `spec.md` §7's Configuration error kind. Split out from
/// [`StateStore::new`] so it is testable without a device.
fn validate_state_in(nx: usize, ny: usize, s_count: usize, state_in: &[f64]) -> Result<()> {
    let n = nx * ny;
    if state_in.len() != n * s_count {
        return Err(Error::Configuration(format!(
            "state_in has length {}, expected nx*ny*S = {}",
            state_in.len(),
            n * s_count
        )));
    }
    if let Some((i, v)) = state_in.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(Error::Configuration(format!("state_in[{i}] = {v} is not finite")));
    }
    Ok(())
}

/// Host mirrors of the `state` and `idiff` arrays plus their device
/// buffers. Arrays are sized once at construction and never reallocated.
pub struct StateStore {
    pub(crate) nx: usize,
    pub(crate) ny: usize,
    pub(crate) s_count: usize,
    pub(crate) host_state: Vec<Real>,
    pub(crate) host_idiff: Vec<Real>,
    pub(crate) dev_state: Buffer<Real>,
    pub(crate) dev_idiff: Buffer<Real>,
    pub(crate) dev_deriv: Buffer<Real>,
    pub(crate) dev_cache: Buffer<Real>,
}

impl StateStore {
    pub fn new(
        queue: &Queue,
        nx: usize,
        ny: usize,
        s_count: usize,
        cache_count: usize,
        state_in: &[f64],
    ) -> Result<Self> {
        validate_state_in(nx, ny, s_count, state_in)?;
        let n = nx * ny;

        let host_state: Vec<Real> = state_in.iter().map(|v| *v as Real).collect();
        let host_idiff: Vec<Real> = vec![0.0 as Real; n];

        let dev_state = Buffer::builder()
            .queue(queue.clone())
            .len(n * s_count)
            .copy_host_slice(&host_state)
            .build()?;
        let dev_idiff = Buffer::builder()
            .queue(queue.clone())
            .len(n)
            .copy_host_slice(&host_idiff)
            .build()?;
        let dev_deriv = Buffer::builder().queue(queue.clone()).len(n * s_count).build()?;
        let dev_cache = Buffer::builder()
            .queue(queue.clone())
            .len(n * cache_count.max(1))
            .build()?;

        Ok(Self {
            nx,
            ny,
            s_count,
            host_state,
            host_idiff,
            dev_state,
            dev_idiff,
            dev_deriv,
            dev_cache,
        })
    }

    pub fn len(&self) -> usize {
        self.host_state.len()
    }

    /// Read the full device state back into the host mirror and the
    /// caller-supplied output sequence.
    pub fn read_state_into(&mut self, out: &mut [f64]) -> Result<()> {
        self.dev_state.cmd().read(&mut self.host_state).enq()?;
        for (o, s) in out.iter_mut().zip(self.host_state.iter()) {
            *o = *s as f64;
        }
        Ok(())
    }

    pub fn read_idiff(&mut self) -> Result<()> {
        self.dev_idiff.cmd().read(&mut self.host_idiff).enq()?;
        Ok(())
    }
}
