//! Transform operation stacks.
//!
//! A transform sample is an ordered list of operations whose product is the
//! local matrix of the node. Operations fold left to right in the archive's
//! row-vector order, which in glam's column-vector convention is
//! `result = result * op`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::util::{mat4_from_row_major, mat4_to_row_major, DMat4, DVec3};

/// Transform operation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XformOpType {
    Scale,
    Translate,
    RotateX,
    RotateY,
    RotateZ,
    /// Axis (3 values) + angle in degrees.
    Rotate,
    /// 16 values, row-major.
    Matrix,
}

impl XformOpType {
    /// Number of values an op of this type carries.
    pub const fn num_values(self) -> usize {
        match self {
            Self::Scale | Self::Translate => 3,
            Self::RotateX | Self::RotateY | Self::RotateZ => 1,
            Self::Rotate => 4,
            Self::Matrix => 16,
        }
    }
}

/// A single transform operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XformOp {
    #[serde(rename = "op")]
    pub op_type: XformOpType,
    pub values: Vec<f64>,
}

impl XformOp {
    pub fn new(op_type: XformOpType, values: Vec<f64>) -> Self {
        Self { op_type, values }
    }

    pub fn scale(x: f64, y: f64, z: f64) -> Self {
        Self::new(XformOpType::Scale, vec![x, y, z])
    }

    pub fn translate(x: f64, y: f64, z: f64) -> Self {
        Self::new(XformOpType::Translate, vec![x, y, z])
    }

    /// Rotation around X (angle in degrees).
    pub fn rotate_x(angle: f64) -> Self {
        Self::new(XformOpType::RotateX, vec![angle])
    }

    /// Rotation around Y (angle in degrees).
    pub fn rotate_y(angle: f64) -> Self {
        Self::new(XformOpType::RotateY, vec![angle])
    }

    /// Rotation around Z (angle in degrees).
    pub fn rotate_z(angle: f64) -> Self {
        Self::new(XformOpType::RotateZ, vec![angle])
    }

    /// Rotation around an arbitrary axis (angle in degrees).
    pub fn rotate(axis: DVec3, angle: f64) -> Self {
        Self::new(XformOpType::Rotate, vec![axis.x, axis.y, axis.z, angle])
    }

    pub fn matrix(m: &DMat4) -> Self {
        Self::new(XformOpType::Matrix, mat4_to_row_major(m).to_vec())
    }

    /// True when the value count matches the op type.
    pub fn is_well_formed(&self) -> bool {
        self.values.len() == self.op_type.num_values()
    }

    #[inline]
    fn value(&self, i: usize) -> f64 {
        self.values.get(i).copied().unwrap_or(0.0)
    }

    fn vec3(&self) -> DVec3 {
        DVec3::new(self.value(0), self.value(1), self.value(2))
    }

    /// Axis of a [`XformOpType::Rotate`] op.
    pub fn axis(&self) -> Option<DVec3> {
        (self.op_type == XformOpType::Rotate).then(|| self.vec3())
    }

    /// Angle in degrees of any rotate op.
    pub fn angle(&self) -> Option<f64> {
        match self.op_type {
            XformOpType::RotateX | XformOpType::RotateY | XformOpType::RotateZ => Some(self.value(0)),
            XformOpType::Rotate => Some(self.value(3)),
            _ => None,
        }
    }

    /// Matrix of this op alone. Malformed ops contribute identity.
    pub fn to_matrix(&self) -> DMat4 {
        if !self.is_well_formed() {
            return DMat4::IDENTITY;
        }
        match self.op_type {
            XformOpType::Scale => DMat4::from_scale(self.vec3()),
            XformOpType::Translate => DMat4::from_translation(self.vec3()),
            XformOpType::RotateX => DMat4::from_rotation_x(self.value(0).to_radians()),
            XformOpType::RotateY => DMat4::from_rotation_y(self.value(0).to_radians()),
            XformOpType::RotateZ => DMat4::from_rotation_z(self.value(0).to_radians()),
            XformOpType::Rotate => {
                let axis = self.vec3().normalize_or_zero();
                if axis.length_squared() > 1e-8 {
                    DMat4::from_axis_angle(axis, self.value(3).to_radians())
                } else {
                    DMat4::IDENTITY
                }
            }
            XformOpType::Matrix => {
                let mut v = [0.0; 16];
                v.copy_from_slice(&self.values);
                mat4_from_row_major(&v)
            }
        }
    }
}

/// Transform sample: an op stack plus the inherit flag.
#[derive(Clone, Debug, PartialEq)]
pub struct XformSample {
    pub ops: SmallVec<[XformOp; 4]>,
    /// Whether this transform composes with its parent's.
    pub inherits: bool,
}

impl Default for XformSample {
    fn default() -> Self {
        Self {
            ops: SmallVec::new(),
            inherits: true,
        }
    }
}

impl XformSample {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: impl IntoIterator<Item = XformOp>, inherits: bool) -> Self {
        Self {
            ops: ops.into_iter().collect(),
            inherits,
        }
    }

    /// Single matrix op.
    pub fn from_matrix(m: &DMat4, inherits: bool) -> Self {
        Self::from_ops([XformOp::matrix(m)], inherits)
    }

    /// Compute the local 4x4 matrix.
    pub fn matrix(&self) -> DMat4 {
        self.ops
            .iter()
            .fold(DMat4::IDENTITY, |result, op| result * op.to_matrix())
    }

    /// Translation of the composed matrix.
    pub fn translation(&self) -> DVec3 {
        self.matrix().w_axis.truncate()
    }

    /// True when both stacks have the same op types in the same order, and
    /// rotate-about-axis ops share the exact same axis.
    pub fn ops_match(&self, other: &Self) -> bool {
        self.ops.len() == other.ops.len()
            && self.ops.iter().zip(other.ops.iter()).all(|(a, b)| {
                a.op_type == b.op_type
                    && a.is_well_formed()
                    && b.is_well_formed()
                    && a.axis() == b.axis()
            })
    }
}
