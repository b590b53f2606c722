//! Transform operation stack blending.

use super::array::lerp_f64;
use super::matrix::blend_matrix;
use crate::geom::{XformOp, XformOpType, XformSample};

/// Blend two transform samples.
///
/// Stacks with the same op types in the same order blend op by op. Rotations
/// about an arbitrary axis keep the first sample's axis and require the second
/// to use the exact same one. Any other combination blends the two composed
/// matrices into a single matrix op.
pub fn blend_xform(a: &XformSample, b: &XformSample, bias: f64) -> XformSample {
    if bias <= 0.0 {
        return a.clone();
    }
    if bias >= 1.0 {
        return b.clone();
    }

    if !a.ops_match(b) {
        let m = blend_matrix(&a.matrix(), &b.matrix(), bias);
        return XformSample::from_matrix(&m, a.inherits);
    }

    let ops = a.ops.iter().zip(b.ops.iter()).map(|(x, y)| match x.op_type {
        XformOpType::Matrix => XformOp::matrix(&blend_matrix(&x.to_matrix(), &y.to_matrix(), bias)),
        XformOpType::Rotate => {
            let mut values = x.values.clone();
            values[3] = x.values[3] + (y.values[3] - x.values[3]) * bias;
            XformOp::new(XformOpType::Rotate, values)
        }
        op_type => XformOp::new(op_type, lerp_f64(&x.values, &y.values, bias)),
    });
    XformSample::from_ops(ops, a.inherits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{DMat4, DVec3};

    #[test]
    fn test_op_by_op() {
        let a = XformSample::from_ops([XformOp::translate(0.0, 0.0, 0.0), XformOp::rotate_z(0.0)], true);
        let b = XformSample::from_ops([XformOp::translate(2.0, 4.0, 0.0), XformOp::rotate_z(90.0)], true);
        let m = blend_xform(&a, &b, 0.5);
        assert_eq!(m.ops.len(), 2);
        assert_eq!(m.ops[0].values, vec![1.0, 2.0, 0.0]);
        assert_eq!(m.ops[1].angle(), Some(45.0));
    }

    #[test]
    fn test_axis_rotation_keeps_axis() {
        let axis = DVec3::new(0.0, 1.0, 1.0);
        let a = XformSample::from_ops([XformOp::rotate(axis, 10.0)], true);
        let b = XformSample::from_ops([XformOp::rotate(axis, 30.0)], true);
        let m = blend_xform(&a, &b, 0.5);
        assert_eq!(m.ops[0].axis(), Some(axis));
        assert_eq!(m.ops[0].angle(), Some(20.0));
    }

    #[test]
    fn test_mismatch_falls_back_to_matrix() {
        let a = XformSample::from_ops([XformOp::rotate(DVec3::Z, 0.0)], true);
        let b = XformSample::from_ops([XformOp::rotate(DVec3::X, 0.0), XformOp::translate(2.0, 0.0, 0.0)], false);
        let m = blend_xform(&a, &b, 0.5);
        assert_eq!(m.ops.len(), 1);
        assert_eq!(m.ops[0].op_type, XformOpType::Matrix);
        assert!(m.inherits);
        let expected = DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0));
        assert!(crate::util::mat4_approx_eq(&m.matrix(), &expected, 1e-9));
    }
}
