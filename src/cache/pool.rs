//! CachePool - per-entity caches shared across host threads.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::debug;

use super::{CacheAction, DerivedGeometryCache, Lod, RepresentationBuilder};
use crate::anim::ClassifyOptions;
use crate::core::SampleClock;
use crate::scene::{ArchiveId, EntityKey, ObjectRef};
use crate::util::Chrono;

type Slot<T> = Arc<Mutex<DerivedGeometryCache<T>>>;

/// Map from entity to its cache. Calls for one entity are serialized by that
/// entity's mutex; different entities proceed in parallel.
pub struct CachePool<B: RepresentationBuilder> {
    builder: B,
    options: ClassifyOptions,
    clock: SampleClock,
    entries: RwLock<HashMap<EntityKey, Slot<B::Output>>>,
}

impl<B: RepresentationBuilder> CachePool<B> {
    pub fn new(builder: B, options: ClassifyOptions, clock: SampleClock) -> Self {
        Self {
            builder,
            options,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    fn slot(&self, key: &EntityKey) -> Slot<B::Output> {
        if let Some(slot) = self.entries.read().get(key) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(DerivedGeometryCache::new(self.options, self.clock)))),
        )
    }

    /// Representation of `obj` at time `t`.
    pub fn get(&self, obj: &ObjectRef, t: Chrono, lod: Lod) -> Option<Arc<B::Output>> {
        let slot = self.slot(&obj.key());
        let mut cache = slot.lock();
        cache.get(obj, t, lod, &self.builder)
    }

    /// Resolve many entities in parallel, preserving input order.
    pub fn resolve_all(&self, objects: &[ObjectRef], t: Chrono, lod: Lod) -> Vec<Option<Arc<B::Output>>> {
        objects.par_iter().map(|obj| self.get(obj, t, lod)).collect()
    }

    pub fn last_action(&self, key: &EntityKey) -> Option<CacheAction> {
        let slot = Arc::clone(self.entries.read().get(key)?);
        let action = slot.lock().last_action();
        Some(action)
    }

    pub fn remove(&self, key: &EntityKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drop every entry belonging to a closing archive.
    pub fn purge_archive(&self, id: ArchiveId) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.archive != id);
        let purged = before - entries.len();
        debug!("purged {purged} entries of {id}");
        purged
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
