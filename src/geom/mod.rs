//! Typed samples that are not plain arrays.
//!
//! - [`XformSample`] / [`XformOp`] - Transform operation stacks
//! - [`CameraSample`] - Camera parameters
//! - [`VisibilityCache`] / [`ObjectVisibility`] - Resolved object visibility

pub mod xform;
pub mod camera;
pub mod visibility;

pub use xform::{XformOp, XformOpType, XformSample};
pub use camera::{CameraSample, CAMERA_NUM_FIELDS};
pub use visibility::{ObjectVisibility, VisibilityCache, VISIBILITY_PROPERTY_NAME};
