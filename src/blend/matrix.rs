//! Affine transform blending by decomposition.
//!
//! Matrices are split into scale, shear, rotation and translation. Scale,
//! shear and translation are lerped, rotation is slerped along the shortest
//! arc, and the parts are recomposed in the archive's row-vector order
//! `scale * shear * rotation * translation`. In glam's column-vector
//! convention that product reads `T * R * H * S`.

use crate::util::{mat4_approx_eq, DMat3, DMat4, DQuat, DVec3, DVec4};

/// Scales smaller than this make a matrix non-decomposable.
const MIN_SCALE: f64 = 1e-12;

/// Components of a decomposed affine transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decomposed {
    pub scale: DVec3,
    /// Shear factors (xy, xz, yz).
    pub shear: DVec3,
    pub rotation: DQuat,
    pub translation: DVec3,
}

impl Decomposed {
    pub const IDENTITY: Self = Self {
        scale: DVec3::ONE,
        shear: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        translation: DVec3::ZERO,
    };
}

/// Split an affine matrix into its components.
///
/// Returns `None` when an axis has zero scale (the rotation is undefined).
pub fn decompose(m: &DMat4) -> Option<Decomposed> {
    // glam columns are the archive's matrix rows.
    let mut rows = [
        m.x_axis.truncate(),
        m.y_axis.truncate(),
        m.z_axis.truncate(),
    ];

    let max_val = rows
        .iter()
        .flat_map(|r| r.to_array())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if max_val < MIN_SCALE || !max_val.is_finite() {
        return None;
    }
    for r in rows.iter_mut() {
        *r /= max_val;
    }

    let mut scale = DVec3::ZERO;
    let mut shear = DVec3::ZERO;

    scale.x = rows[0].length();
    if scale.x < MIN_SCALE {
        return None;
    }
    rows[0] /= scale.x;

    shear.x = rows[0].dot(rows[1]);
    rows[1] -= shear.x * rows[0];

    scale.y = rows[1].length();
    if scale.y < MIN_SCALE {
        return None;
    }
    rows[1] /= scale.y;
    shear.x /= scale.y;

    shear.y = rows[0].dot(rows[2]);
    rows[2] -= shear.y * rows[0];
    shear.z = rows[1].dot(rows[2]);
    rows[2] -= shear.z * rows[1];

    scale.z = rows[2].length();
    if scale.z < MIN_SCALE {
        return None;
    }
    rows[2] /= scale.z;
    shear.y /= scale.z;
    shear.z /= scale.z;

    // Fold a reflection into the scale so the remainder is a proper rotation.
    if rows[0].dot(rows[1].cross(rows[2])) < 0.0 {
        scale = -scale;
        for r in rows.iter_mut() {
            *r = -*r;
        }
    }
    scale *= max_val;

    let rotation = DQuat::from_mat3(&DMat3::from_cols(rows[0], rows[1], rows[2])).normalize();

    Some(Decomposed {
        scale,
        shear,
        rotation,
        translation: m.w_axis.truncate(),
    })
}

/// Shear matrix in column-vector form.
fn shear_matrix(h: DVec3) -> DMat4 {
    DMat4::from_cols(
        DVec4::new(1.0, 0.0, 0.0, 0.0),
        DVec4::new(h.x, 1.0, 0.0, 0.0),
        DVec4::new(h.y, h.z, 1.0, 0.0),
        DVec4::W,
    )
}

/// Inverse of [`decompose`].
pub fn recompose(d: &Decomposed) -> DMat4 {
    DMat4::from_translation(d.translation)
        * DMat4::from_quat(d.rotation)
        * shear_matrix(d.shear)
        * DMat4::from_scale(d.scale)
}

/// Entry-wise lerp, used when a matrix cannot be decomposed.
pub fn lerp_entries(a: &DMat4, b: &DMat4, bias: f64) -> DMat4 {
    let (a, b) = (a.to_cols_array(), b.to_cols_array());
    let mut out = [0.0; 16];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x + (y - x) * bias;
    }
    DMat4::from_cols_array(&out)
}

/// Blend two affine transforms.
pub fn blend_matrix(a: &DMat4, b: &DMat4, bias: f64) -> DMat4 {
    if bias <= 0.0 {
        return *a;
    }
    if bias >= 1.0 {
        return *b;
    }
    if mat4_approx_eq(a, b, 0.0) {
        return *a;
    }

    let (Some(da), Some(db)) = (decompose(a), decompose(b)) else {
        return lerp_entries(a, b, bias);
    };

    let mut q1 = db.rotation;
    if da.rotation.dot(q1) < 0.0 {
        q1 = -q1;
    }

    recompose(&Decomposed {
        scale: da.scale.lerp(db.scale, bias),
        shear: da.shear.lerp(db.shear, bias),
        rotation: da.rotation.slerp(q1, bias),
        translation: da.translation.lerp(db.translation, bias),
    })
}
