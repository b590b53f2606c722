//! Sessions and archive handles.
//!
//! A [`Session`] is the explicit context every resolution call goes through:
//! it owns the open archives, each wrapped in an [`Archive`] that serializes
//! reader access behind one archive-wide reentrant lock. Objects are
//! addressed through [`ObjectRef`], which stays cheap to clone and reports
//! stale or closed state instead of dangling.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, info};

use super::loader;
use crate::core::{ArchiveReader, NodeId, NodeKind};
use crate::util::{Error, Result};

static NEXT_ARCHIVE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique archive identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(pub u64);

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archive#{}", self.0)
    }
}

/// An open archive and the lock guarding its reader.
pub struct Archive {
    id: ArchiveId,
    reader: Arc<dyn ArchiveReader>,
    lock: ReentrantMutex<()>,
    open: AtomicBool,
    interrupt: Arc<AtomicBool>,
}

impl Archive {
    pub fn new(reader: Arc<dyn ArchiveReader>) -> Arc<Self> {
        Self::with_interrupt(reader, Arc::new(AtomicBool::new(false)))
    }

    /// Share an interrupt flag owned by the host. A raised flag makes every
    /// subsequent read fail with [`Error::Interrupted`].
    pub fn with_interrupt(reader: Arc<dyn ArchiveReader>, interrupt: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(Self {
            id: ArchiveId(NEXT_ARCHIVE_ID.fetch_add(1, Ordering::Relaxed)),
            reader,
            lock: ReentrantMutex::new(()),
            open: AtomicBool::new(true),
            interrupt,
        })
    }

    #[inline]
    pub fn id(&self) -> ArchiveId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.reader.name()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Fail with [`Error::Interrupted`] if the host asked to stop.
    #[inline]
    pub fn poll_interrupt(&self) -> Result<()> {
        if self.interrupt.load(Ordering::Relaxed) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Run `f` with exclusive access to the reader.
    ///
    /// The lock is reentrant, so `f` may call `read` again on the same thread.
    pub fn read<T>(&self, f: impl FnOnce(&dyn ArchiveReader) -> Result<T>) -> Result<T> {
        if !self.is_open() {
            return Err(Error::ArchiveClosed(self.name().to_string()));
        }
        let _guard = self.lock.lock();
        self.poll_interrupt()?;
        f(self.reader.as_ref())
    }

    /// Resolve a path to an object handle.
    pub fn object(self: &Arc<Self>, path: &str) -> Result<ObjectRef> {
        let node = self.read(|r| r.lookup(path).ok_or_else(|| Error::NodeNotFound(path.to_string())))?;
        let path = self.read(|r| r.node_path(node))?;
        Ok(ObjectRef {
            archive: Arc::clone(self),
            node,
            path: Arc::from(path),
        })
    }

    pub fn root(self: &Arc<Self>) -> Result<ObjectRef> {
        self.object("/")
    }

    /// Every object below the root, depth first.
    pub fn objects(self: &Arc<Self>) -> Result<Vec<ObjectRef>> {
        let root = self.root()?;
        let mut out = Vec::new();
        let mut stack = root.children()?;
        stack.reverse();
        while let Some(obj) = stack.pop() {
            let mut children = obj.children()?;
            children.reverse();
            stack.extend(children);
            out.push(obj);
        }
        Ok(out)
    }

    fn close(&self) {
        let _guard = self.lock.lock();
        self.open.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Identity of a host entity: which archive and which object path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub archive: ArchiveId,
    pub path: Arc<str>,
}

/// Handle to one object of an open archive.
#[derive(Clone)]
pub struct ObjectRef {
    archive: Arc<Archive>,
    node: NodeId,
    path: Arc<str>,
}

impl ObjectRef {
    #[inline]
    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            archive: self.archive.id(),
            path: Arc::clone(&self.path),
        }
    }

    /// Same archive and same node slot generation.
    pub fn same_identity(&self, other: &ObjectRef) -> bool {
        self.archive.id() == other.archive.id() && self.node == other.node
    }

    /// Archive still open and node still present.
    pub fn is_valid(&self) -> bool {
        self.archive.is_open() && self.archive.read(|r| Ok(r.is_valid(self.node))).unwrap_or(false)
    }

    /// Read through the archive lock, failing on a stale handle.
    pub fn read<T>(&self, f: impl FnOnce(&dyn ArchiveReader, NodeId) -> Result<T>) -> Result<T> {
        self.archive.read(|r| {
            if !r.is_valid(self.node) {
                return Err(Error::StaleHandle(self.path.to_string()));
            }
            f(r, self.node)
        })
    }

    pub fn kind(&self) -> Result<NodeKind> {
        self.read(|r, n| r.node_kind(n))
    }

    fn wrap(&self, node: NodeId, r: &dyn ArchiveReader) -> Result<ObjectRef> {
        Ok(ObjectRef {
            archive: Arc::clone(&self.archive),
            node,
            path: Arc::from(r.node_path(node)?),
        })
    }

    /// Parent object; `None` at the root.
    pub fn parent(&self) -> Result<Option<ObjectRef>> {
        self.read(|r, n| match r.parent(n)? {
            Some(p) => Ok(Some(self.wrap(p, r)?)),
            None => Ok(None),
        })
    }

    pub fn children(&self) -> Result<Vec<ObjectRef>> {
        self.read(|r, n| r.children(n)?.into_iter().map(|c| self.wrap(c, r)).collect())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} {})", self.archive.id(), self.path)
    }
}

/// Explicit context owning every open archive.
#[derive(Default)]
pub struct Session {
    archives: RwLock<HashMap<ArchiveId, Arc<Archive>>>,
    interrupt: Arc<AtomicBool>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON scene description and register it.
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<Arc<Archive>> {
        let path = path.as_ref();
        let archive = loader::load_file(path)?;
        let handle = self.register(Arc::new(archive));
        info!("opened {} as {}", path.display(), handle.id());
        Ok(handle)
    }

    /// Register any reader. Archives share the session interrupt flag.
    pub fn register(&self, reader: Arc<dyn ArchiveReader>) -> Arc<Archive> {
        let archive = Archive::with_interrupt(reader, Arc::clone(&self.interrupt));
        self.archives.write().insert(archive.id(), Arc::clone(&archive));
        debug!("registered {} ({})", archive.id(), archive.name());
        archive
    }

    pub fn get(&self, id: ArchiveId) -> Option<Arc<Archive>> {
        self.archives.read().get(&id).cloned()
    }

    /// Find an open archive by reader name.
    pub fn find(&self, name: &str) -> Option<Arc<Archive>> {
        self.archives.read().values().find(|a| a.name() == name).cloned()
    }

    pub fn find_object(&self, id: ArchiveId, path: &str) -> Result<ObjectRef> {
        self.get(id)
            .ok_or_else(|| Error::ArchiveClosed(id.to_string()))?
            .object(path)
    }

    pub fn len(&self) -> usize {
        self.archives.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close an archive. Handles into it start failing with
    /// [`Error::ArchiveClosed`]; caches referencing it should be purged.
    pub fn close(&self, id: ArchiveId) -> bool {
        let removed = self.archives.write().remove(&id);
        match removed {
            Some(archive) => {
                archive.close();
                debug!("closed {id}");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&self) -> Vec<ArchiveId> {
        let drained: Vec<_> = self.archives.write().drain().collect();
        drained
            .into_iter()
            .map(|(id, archive)| {
                archive.close();
                id
            })
            .collect()
    }

    /// Ask every read in progress to stop.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for archive in self.archives.get_mut().values() {
            archive.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryArchive;

    fn sample() -> MemoryArchive {
        let mut a = MemoryArchive::new("scene");
        a.add_node("/geo", NodeKind::Xform).unwrap();
        a.add_node("/geo/mesh", NodeKind::PolyMesh).unwrap();
        a.add_node("/cam", NodeKind::Camera).unwrap();
        a
    }

    #[test]
    fn test_objects_and_parents() {
        let session = Session::new();
        let archive = session.register(Arc::new(sample()));
        let mesh = archive.object("/geo/mesh").unwrap();
        assert_eq!(mesh.kind().unwrap(), NodeKind::PolyMesh);
        assert_eq!(mesh.parent().unwrap().unwrap().path(), "/geo");

        let paths: Vec<String> = archive.objects().unwrap().iter().map(|o| o.path().to_string()).collect();
        assert_eq!(paths, vec!["/geo", "/geo/mesh", "/cam"]);
        assert!(archive.object("/nope").is_err());
        assert!(session.find("scene").is_some());
    }

    #[test]
    fn test_reentrant_read() {
        let session = Session::new();
        let archive = session.register(Arc::new(sample()));
        let n = archive
            .read(|_| archive.read(|r| Ok(r.children(r.root())?.len())))
            .unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_close_invalidates_handles() {
        let session = Session::new();
        let archive = session.register(Arc::new(sample()));
        let mesh = archive.object("/geo/mesh").unwrap();
        assert!(mesh.is_valid());

        assert!(session.close(archive.id()));
        assert!(!session.close(archive.id()));
        assert!(!mesh.is_valid());
        assert!(matches!(mesh.kind(), Err(Error::ArchiveClosed(_))));
        assert!(session.is_empty());
    }

    #[test]
    fn test_stale_handle() {
        let session = Session::new();
        let mem = Arc::new(sample());
        let archive = session.register(mem.clone());
        let mesh = archive.object("/geo/mesh").unwrap();
        mem.remove_node("/geo/mesh").unwrap();
        assert!(matches!(mesh.kind(), Err(Error::StaleHandle(_))));
    }

    #[test]
    fn test_interrupt() {
        let session = Session::new();
        let archive = session.register(Arc::new(sample()));
        let mesh = archive.object("/geo/mesh").unwrap();
        session.interrupt();
        assert!(matches!(mesh.kind(), Err(Error::Interrupted)));
        session.clear_interrupt();
        assert!(mesh.kind().is_ok());
    }
}
