//! SampleBlender - interpolation between two raw samples.
//!
//! - [`blend`] - element-wise lerp for real arrays, decomposition for matrices
//! - [`blend_xform`] - op-by-op transform stack blending
//! - [`blend_camera`] / [`blend_bounds`] - field and corner lerps
//!
//! All functions are pure. Samples that cannot be blended (mismatched shape,
//! integer or string storage) degrade to the first operand.

mod array;
mod camera;
mod matrix;
mod xform;

pub use array::{lerp_f16, lerp_f32, lerp_f64};
pub use camera::{blend_bounds, blend_camera};
pub use matrix::{blend_matrix, decompose, lerp_entries, recompose, Decomposed};
pub use xform::blend_xform;

use crate::core::RawSample;

/// Blend two raw samples.
///
/// Equals `a` at `bias <= 0` and `b` at `bias >= 1`. In between, real samples
/// of identical shape are interpolated into fresh storage; anything else
/// returns a copy of `a`.
pub fn blend(a: &RawSample, b: &RawSample, bias: f64) -> RawSample {
    if bias <= 0.0 {
        return a.clone();
    }
    if !a.is_shape_compatible(b) {
        return a.clone();
    }
    if bias >= 1.0 {
        return b.clone();
    }
    match array::blend_data(&a.data, &b.data, bias) {
        Some(data) => RawSample {
            data,
            extent: a.extent,
            pod: a.pod,
            is_constant: a.is_constant && b.is_constant,
        },
        None => a.clone(),
    }
}
