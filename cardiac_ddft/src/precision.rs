//! Single build-time choice of device-side float width. All device arrays
//! and kernel scalar arguments use the same width; host-side time and pace
//! remain `f64` and are narrowed at each kernel-argument set.

use ocl::OclPrm;

#[cfg(all(feature = "precision-f32", feature = "precision-f64"))]
compile_error!("precision-f32 and precision-f64 are mutually exclusive");

#[cfg(feature = "precision-f32")]
pub type Real = f32;
#[cfg(not(feature = "precision-f32"))]
pub type Real = f64;

/// The `#define REAL ...` prelude prepended to every device kernel so that
/// the fixed diffusion/step kernels and the caller-supplied derivative
/// kernels agree on element width.
#[cfg(feature = "precision-f32")]
pub const REAL_DEFINE: &str = "#define REAL float\n";
#[cfg(not(feature = "precision-f32"))]
pub const REAL_DEFINE: &str = "#define REAL double\n#pragma OPENCL EXTENSION cl_khr_fp64 : enable\n";

/// Host/device numeric type used for all per-cell arrays.
pub trait DeviceFloat: OclPrm + Copy + PartialOrd {
    fn from_f64(v: f64) -> Self;
    fn is_finite(self) -> bool;
}

impl DeviceFloat for f32 {
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
}

impl DeviceFloat for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}
