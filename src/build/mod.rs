//! Reference representation builder.

mod primitive;

pub use primitive::{bake_points, Attribute, Primitive, PrimitiveBuilder, Topology};
