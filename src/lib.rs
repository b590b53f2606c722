//! # Alembic TimeCache
//!
//! Temporal sample resolution and incremental derived-geometry caching for
//! Alembic-style scene archives.
//!
//! Archives store geometry, transforms and attributes at irregular named
//! times. This crate answers "what does this node look like at time `t`":
//! it brackets `t` between stored samples, blends them, classifies how much
//! of each node changes over time, and uses that to reuse, patch or rebuild
//! a cached representation per entity.
//!
//! ## Modules
//!
//! - [`util`] - POD types, errors, math helpers
//! - [`core`] - Time sampling, sample clock, raw samples, the archive reader trait
//! - [`geom`] - Transform op stacks, camera samples, visibility
//! - [`blend`] - Interpolation of samples, matrices, op stacks
//! - [`scene`] - Sessions, archive handles, the in-memory archive and JSON loader
//! - [`anim`] - Animation classification and per-time channel resolution
//! - [`cache`] - Channel cache, derived geometry cache, cache pool
//! - [`build`] - Reference [`build::Primitive`] builder
//! - [`settings`] - Persistent settings
//!
//! ## Example
//!
//! ```ignore
//! use alembic_timecache::prelude::*;
//!
//! let session = Session::new();
//! let archive = session.open_file("scene.json")?;
//! let pool = CachePool::new(PrimitiveBuilder::default(), ClassifyOptions::default(), SampleClock::default());
//!
//! for frame in 0..48 {
//!     let t = frame as f64 / 24.0;
//!     for obj in archive.objects()? {
//!         if let Some(prim) = pool.get(&obj, t, Lod::Full) {
//!             println!("{} {} points", obj.path(), prim.num_points());
//!         }
//!     }
//! }
//! ```

pub mod util;
pub mod core;
pub mod geom;
pub mod blend;
pub mod scene;
pub mod anim;
pub mod cache;
pub mod build;
pub mod settings;

// Re-export commonly used types
pub use util::{DataType, PlainOldDataType, Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{BBox3d, Chrono, DataType, PlainOldDataType, Error, Result};
    pub use crate::core::{ArchiveReader, ChannelGroup, NodeKind, RawSample, SampleBracket, SampleClock, TimeSampling};
    pub use crate::geom::{CameraSample, XformOp, XformSample};
    pub use crate::scene::{Archive, MemoryArchive, ObjectRef, Session};
    pub use crate::anim::{classify, classify_with, AnimationType, ClassifyOptions};
    pub use crate::cache::{CacheAction, CachePool, DerivedGeometryCache, Lod, RepresentationBuilder};
    pub use crate::build::{Primitive, PrimitiveBuilder};
    pub use crate::settings::Settings;
}
