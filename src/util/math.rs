//! Math type re-exports and helpers shared by the blending code.

pub use glam::{DMat3, DMat4, DQuat, DVec3, DVec4, Mat4, Vec3};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Chrono type - time value (seconds).
pub type Chrono = f64;

/// Linear interpolation `a + (b - a) * t`.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Build a matrix from 16 values stored row-major (Alembic's on-disk order).
pub fn mat4_from_row_major(v: &[f64; 16]) -> DMat4 {
    // Rows of the Alembic matrix become glam columns.
    DMat4::from_cols_array(v)
}

/// Inverse of [`mat4_from_row_major`].
pub fn mat4_to_row_major(m: &DMat4) -> [f64; 16] {
    m.to_cols_array()
}

/// Element-wise comparison with an absolute tolerance.
pub fn mat4_approx_eq(a: &DMat4, b: &DMat4, eps: f64) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= eps)
}

/// 3D bounding box with double precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3d {
    pub min: DVec3,
    pub max: DVec3,
}

impl BBox3d {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Box from the six doubles of a `box3d` sample (min xyz, max xyz).
    pub fn from_slice(v: &[f64]) -> Option<Self> {
        if v.len() < 6 {
            return None;
        }
        Some(Self::new(DVec3::new(v[0], v[1], v[2]), DVec3::new(v[3], v[4], v[5])))
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.expand_by_point(p);
        }
        b
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand_by_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Grow the box by `amount` on every side.
    pub fn expand_by(&mut self, amount: f64) {
        if !self.is_empty() {
            self.min -= DVec3::splat(amount);
            self.max += DVec3::splat(amount);
        }
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// The eight corners, min corner first.
    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }
}

impl Default for BBox3d {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3d({:?} - {:?})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox3d() {
        let mut b = BBox3d::EMPTY;
        assert!(b.is_empty());

        b.expand_by_point(DVec3::new(-1.0, -1.0, -1.0));
        b.expand_by_point(DVec3::new(1.0, 1.0, 1.0));

        assert_eq!(b.center(), DVec3::ZERO);
        assert_eq!(b.size(), DVec3::splat(2.0));
        assert_eq!(b.corners()[7], DVec3::ONE);

        b.expand_by(0.5);
        assert_eq!(b.size(), DVec3::splat(3.0));
    }

    #[test]
    fn test_bbox_from_slice() {
        let b = BBox3d::from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(b.min, DVec3::new(0.0, 1.0, 2.0));
        assert!(BBox3d::from_slice(&[1.0]).is_none());
    }

    #[test]
    fn test_row_major_roundtrip_keeps_translation() {
        let mut v = [0.0; 16];
        v[0] = 1.0;
        v[5] = 1.0;
        v[10] = 1.0;
        v[15] = 1.0;
        v[12] = 3.0; // row 3 carries translation in Alembic
        let m = mat4_from_row_major(&v);
        assert_eq!(m.w_axis.truncate(), DVec3::new(3.0, 0.0, 0.0));
        assert_eq!(mat4_to_row_major(&m), v);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(1.0, 3.0, 0.5), 2.0);
        assert_eq!(lerp(1.0, 3.0, 0.0), 1.0);
    }
}
