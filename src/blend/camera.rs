//! Camera and bounds blending.

use crate::geom::CameraSample;
use crate::util::{lerp, BBox3d};

/// Field-wise lerp of every camera parameter.
pub fn blend_camera(a: &CameraSample, b: &CameraSample, bias: f64) -> CameraSample {
    if bias <= 0.0 {
        return a.clone();
    }
    if bias >= 1.0 {
        return b.clone();
    }
    let (x, y) = (a.to_array(), b.to_array());
    let mut out = x;
    for (o, (p, q)) in out.iter_mut().zip(x.iter().zip(y.iter())) {
        *o = lerp(*p, *q, bias);
    }
    CameraSample::from_array(&out)
}

/// Corner-wise lerp of two boxes. An empty side yields the other side.
pub fn blend_bounds(a: &BBox3d, b: &BBox3d, bias: f64) -> BBox3d {
    if a.is_empty() || bias >= 1.0 {
        return *b;
    }
    if b.is_empty() || bias <= 0.0 {
        return *a;
    }
    BBox3d::new(a.min.lerp(b.min, bias), a.max.lerp(b.max, bias))
}
