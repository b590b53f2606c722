//! Temporal behavior of scene nodes.
//!
//! - [`classify`] - which tier of change a node exhibits
//! - [`resolve_channel`], [`world_transform`], [`resolve_bounds`] - values at a time

mod classify;
mod resolve;

pub use classify::{classify, classify_with, is_transform_animated, AnimationType, ClassifyOptions};
pub use resolve::{
    clamp_time, local_transform, resolve_bounds, resolve_camera, resolve_channel, resolve_xform,
    world_transform,
};
