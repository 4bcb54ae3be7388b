//! Crate-wide error type.
//!
//! Device and configuration errors are fatal: any of them routes the
//! integrator through `clean` before the error reaches the caller. A NaN in
//! the voltage of cell 0 is deliberately *not* represented here — see
//! [`crate::integrator::StepOutcome::Halted`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown log key: {0}")]
    UnknownLogKey(String),

    #[error("malformed pacing protocol: {0}")]
    Protocol(String),

    #[error("no OpenCL device found matching preference {0:?}")]
    NoDevice(Option<String>),

    #[error("OpenCL kernel build failed:\n{log}")]
    KernelBuild { log: String },

    #[error("OpenCL error: {0}")]
    Device(#[from] ocl::Error),

    #[error("integrator not initialized")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;
