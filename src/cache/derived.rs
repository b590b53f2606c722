//! DerivedGeometryCache - one materialized representation per entity.
//!
//! Each entity keeps at most one representation, tagged with the frame and
//! [`AnimationType`] it was produced for. On re-evaluation the tag decides
//! whether that representation is reused, patched or rebuilt:
//!
//! | tier            | action                                  |
//! |-----------------|-----------------------------------------|
//! | Constant        | retag, return the same `Arc`            |
//! | TransformOnly   | [`RepresentationBuilder::apply_transform`] |
//! | AttributeOnly   | [`RepresentationBuilder::refresh_attributes`] |
//! | TopologyVarying | rebuild                                 |
//! | Invalid         | rebuild, fast path disabled             |
//!
//! Builder failures never surface: the previous representation is returned
//! and the entry is marked so the next call tries again.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::anim::{classify_with, world_transform, AnimationType, ClassifyOptions};
use crate::core::{NodeId, SampleClock};
use crate::geom::VisibilityCache;
use crate::scene::{EntityKey, ObjectRef};
use crate::util::{Chrono, DMat4, Error, Result};

/// Level of detail a representation is built at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lod {
    /// Topology and every attribute.
    #[default]
    Full,
    /// Positions only.
    Points,
    /// Eight bounding box corners.
    Box,
    /// Bounding box center.
    Centroid,
    /// Nothing but bounds.
    Hidden,
}

impl Lod {
    pub const ALL: [Self; 5] = [Self::Full, Self::Points, Self::Box, Self::Centroid, Self::Hidden];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Points => "points",
            Self::Box => "box",
            Self::Centroid => "centroid",
            Self::Hidden => "hidden",
        }
    }
}

impl fmt::Display for Lod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|lod| lod.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid(format!("unknown LOD '{s}'")))
    }
}

/// Host-side producer of derived representations.
pub trait RepresentationBuilder: Send + Sync {
    type Output: Send + Sync;

    /// Build from scratch.
    fn build_full(&self, obj: &ObjectRef, t: Chrono, lod: Lod) -> Result<Self::Output>;

    /// Re-read varying channels into a copy of `existing`, keeping its
    /// topology buffers. Channels no longer available are dropped.
    fn refresh_attributes(&self, obj: &ObjectRef, t: Chrono, existing: &Self::Output) -> Result<Self::Output>;

    /// Copy of `rep` carrying a new object-to-world matrix.
    fn apply_transform(&self, rep: &Self::Output, transform: DMat4) -> Self::Output;

    /// Whether outputs embed the world transform. Caches then always
    /// classify with ancestor transforms, so a moving parent is never
    /// treated as constant.
    fn embeds_world_transform(&self) -> bool {
        false
    }
}

/// What the last [`DerivedGeometryCache::get`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CacheAction {
    #[default]
    None,
    /// First build for this entity or LOD.
    Built,
    /// Same frame, nothing read.
    Reused,
    /// Constant entity, frame retagged.
    Retagged,
    TransformPatched,
    AttributesPatched,
    Rebuilt,
    /// Read failed; previous representation returned.
    Degraded,
    /// Entity hidden at this time.
    Hidden,
}

impl CacheAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Built => "built",
            Self::Reused => "reused",
            Self::Retagged => "retagged",
            Self::TransformPatched => "transform",
            Self::AttributesPatched => "attributes",
            Self::Rebuilt => "rebuilt",
            Self::Degraded => "degraded",
            Self::Hidden => "hidden",
        }
    }
}

impl fmt::Display for CacheAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The representation held for one entity.
pub struct CacheEntry<T> {
    pub rep: Arc<T>,
    pub frame: Chrono,
    pub lod: Lod,
    pub anim: AnimationType,
    key: EntityKey,
    node: NodeId,
}

impl<T> CacheEntry<T> {
    fn matches(&self, obj: &ObjectRef, lod: Lod) -> bool {
        self.key == obj.key() && self.node == obj.node() && self.lod == lod
    }

    fn same_entity(&self, obj: &ObjectRef) -> bool {
        self.key == obj.key() && self.node == obj.node()
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }
}

impl<T> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("path", &self.key.path)
            .field("frame", &self.frame)
            .field("lod", &self.lod)
            .field("anim", &self.anim)
            .finish()
    }
}

/// Incremental cache for one entity.
pub struct DerivedGeometryCache<T> {
    entry: Option<CacheEntry<T>>,
    options: ClassifyOptions,
    clock: SampleClock,
    last_action: CacheAction,
}

impl<T> Default for DerivedGeometryCache<T> {
    fn default() -> Self {
        Self::new(ClassifyOptions::default(), SampleClock::default())
    }
}

impl<T> DerivedGeometryCache<T> {
    pub fn new(options: ClassifyOptions, clock: SampleClock) -> Self {
        Self {
            entry: None,
            options,
            clock,
            last_action: CacheAction::None,
        }
    }

    pub fn entry(&self) -> Option<&CacheEntry<T>> {
        self.entry.as_ref()
    }

    pub fn last_action(&self) -> CacheAction {
        self.last_action
    }

    pub fn clear(&mut self) {
        self.entry = None;
        self.last_action = CacheAction::None;
    }

    /// Representation of `obj` at time `t` and level `lod`.
    ///
    /// Returns `None` only when nothing could ever be built for the entity,
    /// or when it is hidden and visibility is considered.
    ///
    /// After [`CacheAction::Degraded`] the returned value may be an older
    /// frame, or another LOD when the requested one could not be built.
    /// [`Self::entry`] reports the frame and LOD actually held.
    pub fn get<B>(&mut self, obj: &ObjectRef, t: Chrono, lod: Lod, builder: &B) -> Option<Arc<T>>
    where
        B: RepresentationBuilder<Output = T>,
    {
        if self.options.consider_visibility {
            match VisibilityCache::resolve(obj, t, self.clock) {
                Ok(vis) if !vis.visible() => {
                    trace!("{} hidden at {t}", obj.path());
                    self.last_action = CacheAction::Hidden;
                    return None;
                }
                Ok(_) => {}
                Err(e) => debug!("visibility of {} unresolved: {e}", obj.path()),
            }
        }

        if !self.entry.as_ref().is_some_and(|e| e.matches(obj, lod)) {
            return self.build(obj, t, lod, builder);
        }
        let entry = self.entry.as_mut()?;

        if entry.frame == t && entry.anim.is_valid() {
            self.last_action = CacheAction::Reused;
            return Some(Arc::clone(&entry.rep));
        }

        let anim = classify_with(obj, &effective_options(self.options, builder));
        let result = match anim {
            AnimationType::Constant => Ok((Arc::clone(&entry.rep), CacheAction::Retagged)),
            AnimationType::TransformOnly => world_transform(obj, t, self.clock)
                .map(|m| (Arc::new(builder.apply_transform(&entry.rep, m)), CacheAction::TransformPatched)),
            AnimationType::AttributeOnly => builder
                .refresh_attributes(obj, t, &entry.rep)
                .map(|rep| (Arc::new(rep), CacheAction::AttributesPatched)),
            AnimationType::TopologyVarying | AnimationType::Invalid => builder
                .build_full(obj, t, lod)
                .map(|rep| (Arc::new(rep), CacheAction::Rebuilt)),
        };

        match result {
            Ok((rep, action)) => {
                trace!("{} at {t}: {action} ({anim})", obj.path());
                entry.rep = rep;
                entry.frame = t;
                entry.anim = anim;
                self.last_action = action;
            }
            Err(e) => {
                debug!("{} at {t}: keeping frame {} after {e}", obj.path(), entry.frame);
                entry.anim = AnimationType::Invalid;
                self.last_action = CacheAction::Degraded;
            }
        }
        Some(Arc::clone(&entry.rep))
    }

    fn build<B>(&mut self, obj: &ObjectRef, t: Chrono, lod: Lod, builder: &B) -> Option<Arc<T>>
    where
        B: RepresentationBuilder<Output = T>,
    {
        if self.entry.as_ref().is_some_and(|e| !e.same_entity(obj)) {
            trace!("entity changed, dropping entry for {}", obj.path());
            self.entry = None;
        }

        match builder.build_full(obj, t, lod) {
            Ok(rep) => {
                let anim = classify_with(obj, &effective_options(self.options, builder));
                trace!("{} at {t}: built {lod} ({anim})", obj.path());
                let rep = Arc::new(rep);
                self.entry = Some(CacheEntry {
                    rep: Arc::clone(&rep),
                    frame: t,
                    lod,
                    anim,
                    key: obj.key(),
                    node: obj.node(),
                });
                self.last_action = CacheAction::Built;
                Some(rep)
            }
            Err(e) => {
                // A different LOD of the same entity is still better than nothing.
                debug!("cannot build {} at {t}: {e}", obj.path());
                self.last_action = CacheAction::Degraded;
                let entry = self.entry.as_mut()?;
                entry.anim = AnimationType::Invalid;
                Some(Arc::clone(&entry.rep))
            }
        }
    }
}

fn effective_options<B: RepresentationBuilder>(mut options: ClassifyOptions, builder: &B) -> ClassifyOptions {
    if builder.embeds_world_transform() {
        options.include_ancestor_transform = true;
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChannelGroup, NodeKind, RawSample, TimeSampling, TopologyVariance, POSITIONS};
    use crate::scene::{MemoryArchive, Session};

    /// Counts calls and stores the frame it was asked for.
    #[derive(Default)]
    struct FrameBuilder;

    impl RepresentationBuilder for FrameBuilder {
        type Output = (Chrono, &'static str);

        fn build_full(&self, obj: &ObjectRef, t: Chrono, _lod: Lod) -> Result<Self::Output> {
            obj.kind()?;
            Ok((t, "full"))
        }

        fn refresh_attributes(&self, obj: &ObjectRef, t: Chrono, _existing: &Self::Output) -> Result<Self::Output> {
            obj.kind()?;
            Ok((t, "attributes"))
        }

        fn apply_transform(&self, rep: &Self::Output, _transform: DMat4) -> Self::Output {
            (rep.0, "transform")
        }
    }

    fn archive(variance: TopologyVariance) -> MemoryArchive {
        let ts = Some(Arc::new(TimeSampling::uniform(1.0, 0.0)));
        let mut a = MemoryArchive::new("derived");
        let mesh = a.add_node("/mesh", NodeKind::PolyMesh).unwrap();
        a.set_topology_variance(mesh, variance).unwrap();
        a.add_channel(
            mesh,
            ChannelGroup::Geometry,
            POSITIONS,
            ts,
            vec![
                RawSample::from_f32(vec![0.0; 3], 3),
                RawSample::from_f32(vec![1.0; 3], 3),
            ],
        )
        .unwrap();
        a
    }

    #[test]
    fn test_lod_parse() {
        assert_eq!("Box".parse::<Lod>().unwrap(), Lod::Box);
        assert!("cube".parse::<Lod>().is_err());
        assert_eq!(Lod::default(), Lod::Full);
    }

    #[test]
    fn test_fast_path_and_patch() {
        let session = Session::new();
        let archive = session.register(Arc::new(archive(TopologyVariance::Homogeneous)));
        let mesh = archive.object("/mesh").unwrap();
        let mut cache = DerivedGeometryCache::default();

        let a = cache.get(&mesh, 0.0, Lod::Full, &FrameBuilder).unwrap();
        assert_eq!(cache.last_action(), CacheAction::Built);
        let b = cache.get(&mesh, 0.0, Lod::Full, &FrameBuilder).unwrap();
        assert_eq!(cache.last_action(), CacheAction::Reused);
        assert!(Arc::ptr_eq(&a, &b));

        let c = cache.get(&mesh, 0.5, Lod::Full, &FrameBuilder).unwrap();
        assert_eq!(cache.last_action(), CacheAction::AttributesPatched);
        assert_eq!(*c, (0.5, "attributes"));
        assert_eq!(cache.entry().unwrap().anim, AnimationType::AttributeOnly);
    }

    #[test]
    fn test_lod_change_rebuilds() {
        let session = Session::new();
        let archive = session.register(Arc::new(archive(TopologyVariance::Constant)));
        let mesh = archive.object("/mesh").unwrap();
        let mut cache = DerivedGeometryCache::default();

        cache.get(&mesh, 0.0, Lod::Full, &FrameBuilder);
        cache.get(&mesh, 0.0, Lod::Box, &FrameBuilder);
        assert_eq!(cache.last_action(), CacheAction::Built);
        assert_eq!(cache.entry().unwrap().lod, Lod::Box);
    }

    #[test]
    fn test_degrade_keeps_previous() {
        let session = Session::new();
        let archive = session.register(Arc::new(archive(TopologyVariance::Heterogeneous)));
        let mesh = archive.object("/mesh").unwrap();
        let mut cache = DerivedGeometryCache::default();

        let first = cache.get(&mesh, 0.0, Lod::Full, &FrameBuilder).unwrap();
        session.interrupt();
        let second = cache.get(&mesh, 1.0, Lod::Full, &FrameBuilder).unwrap();
        assert_eq!(cache.last_action(), CacheAction::Degraded);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.entry().unwrap().frame, 0.0);

        session.clear_interrupt();
        cache.get(&mesh, 1.0, Lod::Full, &FrameBuilder);
        assert_eq!(cache.last_action(), CacheAction::Rebuilt);
    }

    #[test]
    fn test_unbuildable_entity() {
        let session = Session::new();
        let archive = session.register(Arc::new(archive(TopologyVariance::Constant)));
        let mesh = archive.object("/mesh").unwrap();
        session.close(archive.id());
        let mut cache: DerivedGeometryCache<(Chrono, &'static str)> = DerivedGeometryCache::default();
        assert!(cache.get(&mesh, 0.0, Lod::Full, &FrameBuilder).is_none());
        assert_eq!(cache.last_action(), CacheAction::Degraded);
    }
}
