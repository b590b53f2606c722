//! Scene access - sessions, archive handles and the in-memory archive.
//!
//! - [`Session`] / [`Archive`] / [`ObjectRef`] - Explicit context with one
//!   reentrant lock per archive
//! - [`MemoryArchive`] - Arena-backed [`ArchiveReader`](crate::core::ArchiveReader)
//! - [`loader`] - JSON scene descriptions

mod archive;
pub mod loader;
mod session;

pub use archive::MemoryArchive;
pub use session::{Archive, ArchiveId, EntityKey, ObjectRef, Session};
