//! Camera samples.

use serde::{Deserialize, Serialize};

/// Number of scalar fields in a [`CameraSample`].
pub const CAMERA_NUM_FIELDS: usize = 16;

/// Camera sample data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSample {
    /// Focal length in millimeters.
    pub focal_length: f64,
    /// Horizontal aperture (film width) in centimeters.
    pub horizontal_aperture: f64,
    /// Vertical aperture (film height) in centimeters.
    pub vertical_aperture: f64,
    pub horizontal_film_offset: f64,
    pub vertical_film_offset: f64,
    pub near_clipping_plane: f64,
    pub far_clipping_plane: f64,
    pub focus_distance: f64,
    pub f_stop: f64,
    /// Shutter open time (fraction of frame).
    pub shutter_open: f64,
    /// Shutter close time (fraction of frame).
    pub shutter_close: f64,
    /// Lens squeeze ratio (for anamorphic lenses).
    pub lens_squeeze_ratio: f64,
    pub overscan_left: f64,
    pub overscan_right: f64,
    pub overscan_top: f64,
    pub overscan_bottom: f64,
}

impl Default for CameraSample {
    fn default() -> Self {
        Self {
            focal_length: 35.0,
            horizontal_aperture: 3.6, // 36mm = 3.6cm
            vertical_aperture: 2.4,   // 24mm = 2.4cm
            horizontal_film_offset: 0.0,
            vertical_film_offset: 0.0,
            near_clipping_plane: 0.1,
            far_clipping_plane: 100000.0,
            focus_distance: 5.0,
            f_stop: 5.6,
            shutter_open: 0.0,
            shutter_close: 0.0,
            lens_squeeze_ratio: 1.0,
            overscan_left: 0.0,
            overscan_right: 0.0,
            overscan_top: 0.0,
            overscan_bottom: 0.0,
        }
    }
}

impl CameraSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Horizontal field of view in radians.
    pub fn horizontal_fov(&self) -> f64 {
        2.0 * (self.horizontal_aperture / (2.0 * self.focal_length / 10.0)).atan()
    }

    /// Vertical field of view in radians.
    pub fn vertical_fov(&self) -> f64 {
        2.0 * (self.vertical_aperture / (2.0 * self.focal_length / 10.0)).atan()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.horizontal_aperture / self.vertical_aperture
    }

    /// All fields in declaration order.
    pub fn to_array(&self) -> [f64; CAMERA_NUM_FIELDS] {
        [
            self.focal_length,
            self.horizontal_aperture,
            self.vertical_aperture,
            self.horizontal_film_offset,
            self.vertical_film_offset,
            self.near_clipping_plane,
            self.far_clipping_plane,
            self.focus_distance,
            self.f_stop,
            self.shutter_open,
            self.shutter_close,
            self.lens_squeeze_ratio,
            self.overscan_left,
            self.overscan_right,
            self.overscan_top,
            self.overscan_bottom,
        ]
    }

    pub fn from_array(v: &[f64; CAMERA_NUM_FIELDS]) -> Self {
        Self {
            focal_length: v[0],
            horizontal_aperture: v[1],
            vertical_aperture: v[2],
            horizontal_film_offset: v[3],
            vertical_film_offset: v[4],
            near_clipping_plane: v[5],
            far_clipping_plane: v[6],
            focus_distance: v[7],
            f_stop: v[8],
            shutter_open: v[9],
            shutter_close: v[10],
            lens_squeeze_ratio: v[11],
            overscan_left: v[12],
            overscan_right: v[13],
            overscan_top: v[14],
            overscan_bottom: v[15],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fov() {
        let cam = CameraSample::default();
        assert!(cam.horizontal_fov() > cam.vertical_fov());
        assert!((cam.aspect_ratio() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_array_roundtrip_keeps_field_order() {
        let mut cam = CameraSample::default();
        cam.focal_length = 50.0;
        cam.overscan_bottom = 0.25;
        let arr = cam.to_array();
        assert_eq!(arr[0], 50.0);
        assert_eq!(arr[15], 0.25);
        assert_eq!(CameraSample::from_array(&arr), cam);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cam: CameraSample = serde_json::from_str(r#"{"focal_length": 80.0}"#).unwrap();
        assert_eq!(cam.focal_length, 80.0);
        assert_eq!(cam.f_stop, 5.6);
    }
}
