// cardiac_ddft - multi-cell split-timestep integrator for cardiac tissue

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Drives a 1D or 2D grid of identical cardiac cell models on an OpenCL
//! device. Each cell is an ODE model of ion channel dynamics and
//! transmembrane voltage; cells are coupled through a discrete Laplacian
//! ("diffusion current") that moves current between neighbors.
//!
//! This crate does not parse model descriptions or generate kernel source:
//! it consumes the already-generated OpenCL C text for the per-cell
//! derivative evaluation plus a small [`KernelDescriptor`] telling it how
//! many state variables and cached intermediates that source expects, and
//! a [`Protocol`] describing the pacing schedule.
//!
//! Usage
//! -----
//! ```no_run
//! use cardiac_ddft::{Integrator, IntegratorConfig, KernelDescriptor, pacing::PacingDriver};
//!
//! # fn run(model_source: String, state_in: Vec<f64>) -> cardiac_ddft::Result<()> {
//! let descriptor = KernelDescriptor::new(/* state_count */ 1, /* cache_count */ 0);
//! let config = IntegratorConfig::new(
//!     model_source, 1, 1, 0.0, 0.0, 0.0, 1.0, 1e-3, state_in,
//!     PacingDriver::none(), 0, 0, 0.1, 1,
//! )?;
//! let mut integrator = Integrator::init(config, descriptor)?;
//! let mut state_out = vec![0.0; integrator.state_len()];
//! loop {
//!     match integrator.step(&mut state_out)? {
//!         cardiac_ddft::StepOutcome::Yielded(_t) => continue,
//!         cardiac_ddft::StepOutcome::Completed(_t) => break,
//!         cardiac_ddft::StepOutcome::Halted => break,
//!     }
//! }
//! Ok(())
//! # }
//! ```

#[doc(hidden)]
pub mod mathref;

pub mod device;
pub mod error;
pub mod integrator;
pub mod kernels;
pub mod logger;
pub mod pacing;
pub mod precision;
pub mod state;

pub use error::{Error, Result};
pub use integrator::{Integrator, IntegratorConfig, StepOutcome};
pub use kernels::KernelDescriptor;
pub use logger::{LogKey, LogSink, LogSource};
pub use pacing::{PacingDriver, PacingStep, Protocol};
pub use precision::DeviceFloat;
