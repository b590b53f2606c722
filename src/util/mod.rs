//! Utility types and functions.
//!
//! This module contains fundamental types used throughout the library:
//! - [`PlainOldDataType`] / [`StorageKind`] - Element types and storage classes
//! - [`DataType`] - POD + extent (tuple size)
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam and [`BBox3d`]

mod pod;
mod data_type;
mod error;
mod math;

pub use pod::*;
pub use data_type::*;
pub use error::*;
pub use math::*;
