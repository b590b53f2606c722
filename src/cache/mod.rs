//! Caches keyed by time.
//!
//! - [`ChannelCache`] - time-indexed lookup into one pre-fetched channel
//! - [`DerivedGeometryCache`] - reuse/patch/rebuild of one entity's representation
//! - [`CachePool`] - per-entity caches shared across threads

mod channel;
mod derived;
mod pool;

pub use channel::ChannelCache;
pub use derived::{CacheAction, CacheEntry, DerivedGeometryCache, Lod, RepresentationBuilder};
pub use pool::CachePool;
