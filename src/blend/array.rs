//! Element-wise blending of numeric arrays.

use half::f16;

use super::matrix::blend_matrix;
use crate::core::SampleData;

#[inline]
fn lerp_with<T: Copy>(a: &[T], b: &[T], bias: f64, to: impl Fn(T) -> f64, from: impl Fn(f64) -> T) -> Vec<T> {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let (x, y) = (to(x), to(y));
            from(x + (y - x) * bias)
        })
        .collect()
}

pub fn lerp_f32(a: &[f32], b: &[f32], bias: f64) -> Vec<f32> {
    lerp_with(a, b, bias, f64::from, |v| v as f32)
}

pub fn lerp_f64(a: &[f64], b: &[f64], bias: f64) -> Vec<f64> {
    lerp_with(a, b, bias, |v| v, |v| v)
}

/// Half floats are widened to f32 for the arithmetic.
pub fn lerp_f16(a: &[f16], b: &[f16], bias: f64) -> Vec<f16> {
    lerp_with(a, b, bias, |v| f64::from(v.to_f32()), |v| f16::from_f32(v as f32))
}

/// Blend real storage of identical layout and length.
///
/// Returns `None` for integer or string storage, or mismatched layouts.
pub(crate) fn blend_data(a: &SampleData, b: &SampleData, bias: f64) -> Option<SampleData> {
    Some(match (a, b) {
        (SampleData::Float32(x), SampleData::Float32(y)) => SampleData::Float32(lerp_f32(x, y, bias)),
        (SampleData::Float64(x), SampleData::Float64(y)) => SampleData::Float64(lerp_f64(x, y, bias)),
        (SampleData::Float16(x), SampleData::Float16(y)) => SampleData::Float16(lerp_f16(x, y, bias)),
        (SampleData::Matrix(x), SampleData::Matrix(y)) => SampleData::Matrix(
            x.iter()
                .zip(y.iter())
                .map(|(m0, m1)| blend_matrix(m0, m1, bias))
                .collect(),
        ),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_f32() {
        assert_eq!(lerp_f32(&[1.0, 2.0], &[3.0, 4.0], 0.5), vec![2.0, 3.0]);
    }

    #[test]
    fn test_lerp_f16_through_f32() {
        let a = [f16::from_f32(0.0), f16::from_f32(1.0)];
        let b = [f16::from_f32(2.0), f16::from_f32(3.0)];
        let out = lerp_f16(&a, &b, 0.25);
        assert_eq!(out[0].to_f32(), 0.5);
        assert_eq!(out[1].to_f32(), 1.5);
    }

    #[test]
    fn test_integer_storage_not_blended() {
        let a = SampleData::Int32(vec![1]);
        let b = SampleData::Int32(vec![3]);
        assert!(blend_data(&a, &b, 0.5).is_none());
        let s = SampleData::String(vec!["a".into()]);
        assert!(blend_data(&s, &s, 0.5).is_none());
    }
}
