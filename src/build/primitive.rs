//! Reference representation: a flat primitive with shared buffers.
//!
//! Topology and attribute buffers live behind `Arc` so patched copies share
//! everything they did not re-read.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::anim::{resolve_bounds, resolve_channel, world_transform};
use crate::cache::{Lod, RepresentationBuilder};
use crate::core::{
    ChannelGroup, NodeKind, RawSample, SampleClock, CURVE_COUNTS, FACE_COUNTS, FACE_INDICES, POSITIONS,
    SELF_BOUNDS, TOPOLOGY_CHANNELS,
};
use crate::scene::ObjectRef;
use crate::util::{BBox3d, Chrono, DMat4, DVec3, Error, Result};

/// Connectivity of a mesh or curve set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topology {
    /// Vertices per face (or per curve).
    pub counts: Vec<i32>,
    /// Point index per face-vertex. Empty for curves.
    pub indices: Vec<i32>,
}

impl Topology {
    /// Check counts and indices against the number of points.
    pub fn validate(&self, num_points: usize) -> Result<()> {
        if let Some(c) = self.counts.iter().find(|&&c| c < 0) {
            return Err(Error::CorruptTopology(format!("negative count {c}")));
        }
        let total: usize = self.counts.iter().map(|&c| c as usize).sum();
        let expected = if self.indices.is_empty() { num_points } else { self.indices.len() };
        if total != expected {
            return Err(Error::CorruptTopology(format!("counts sum to {total}, expected {expected}")));
        }
        if let Some(i) = self.indices.iter().find(|&&i| i < 0 || i as usize >= num_points) {
            return Err(Error::CorruptTopology(format!("index {i} outside {num_points} points")));
        }
        Ok(())
    }

    pub fn num_faces(&self) -> usize {
        self.counts.len()
    }
}

/// One resolved channel and where it came from.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub group: ChannelGroup,
    pub data: Arc<RawSample>,
}

/// Materialized geometry of one entity at one time.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub path: Arc<str>,
    pub lod: Lod,
    pub topology: Option<Arc<Topology>>,
    pub attributes: BTreeMap<String, Attribute>,
    /// Object-to-world matrix; positions stay in object space.
    pub transform: DMat4,
    /// Object-space bounds.
    pub bounds: BBox3d,
}

impl Primitive {
    fn empty(path: Arc<str>, lod: Lod) -> Self {
        Self {
            path,
            lod,
            topology: None,
            attributes: BTreeMap::new(),
            transform: DMat4::IDENTITY,
            bounds: BBox3d::EMPTY,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<RawSample>> {
        self.attributes.get(name).map(|a| &a.data)
    }

    pub fn positions(&self) -> Option<&Arc<RawSample>> {
        self.attribute(POSITIONS)
    }

    pub fn num_points(&self) -> usize {
        self.positions().map_or(0, |p| p.num_entries())
    }

    /// Bounds after applying `transform`.
    pub fn world_bounds(&self) -> BBox3d {
        if self.bounds.is_empty() {
            return self.bounds;
        }
        BBox3d::from_points(self.bounds.corners().map(|c| self.transform.transform_point3(c)))
    }
}

/// Builds [`Primitive`]s from archive channels.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimitiveBuilder {
    clock: SampleClock,
}

impl PrimitiveBuilder {
    pub fn new(clock: SampleClock) -> Self {
        Self { clock }
    }

    /// Missing positions are not an error for bounds; the box stays empty.
    fn bounds(&self, obj: &ObjectRef, t: Chrono) -> Result<BBox3d> {
        match resolve_bounds(obj, t, self.clock) {
            Err(Error::ChannelNotFound { .. }) => Ok(BBox3d::EMPTY),
            other => other,
        }
    }

    fn channel(&self, obj: &ObjectRef, group: ChannelGroup, name: &str, t: Chrono) -> Result<Option<RawSample>> {
        match resolve_channel(obj, group, name, t, self.clock) {
            Ok(s) => Ok(Some(s)),
            Err(Error::ChannelNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn topology(&self, obj: &ObjectRef, kind: NodeKind, t: Chrono, num_points: usize) -> Result<Option<Arc<Topology>>> {
        let ints = |name: &str| -> Result<Option<Vec<i32>>> {
            Ok(self
                .channel(obj, ChannelGroup::Geometry, name, t)?
                .and_then(|s| s.to_i64_vec())
                .map(|v| v.into_iter().map(|x| x as i32).collect()))
        };
        let topology = match kind {
            NodeKind::PolyMesh | NodeKind::SubD => match (ints(FACE_COUNTS)?, ints(FACE_INDICES)?) {
                (Some(counts), Some(indices)) => Topology { counts, indices },
                _ => return Ok(None),
            },
            NodeKind::Curves => match ints(CURVE_COUNTS)? {
                Some(counts) => Topology { counts, indices: Vec::new() },
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        match topology.validate(num_points) {
            Ok(()) => Ok(Some(Arc::new(topology))),
            Err(e) => {
                warn!("{}: {e}, falling back to points", obj.path());
                Ok(None)
            }
        }
    }

    /// Every value channel of the node: schema channels minus topology,
    /// then arbitrary parameters that do not shadow a schema name.
    fn attributes(&self, obj: &ObjectRef, t: Chrono) -> Result<BTreeMap<String, Attribute>> {
        let mut out = BTreeMap::new();
        for group in [ChannelGroup::Geometry, ChannelGroup::Arbitrary] {
            let names = obj.read(|r, n| r.channel_names(n, group))?;
            for name in names {
                if TOPOLOGY_CHANNELS.contains(&name.as_str()) || name == SELF_BOUNDS || out.contains_key(&name) {
                    continue;
                }
                if let Some(data) = self.channel(obj, group, &name, t)? {
                    out.insert(name, Attribute { group, data: Arc::new(data) });
                }
            }
        }
        Ok(out)
    }

    /// Positions standing in for the whole node at coarse levels of detail.
    fn proxy_points(lod: Lod, bounds: &BBox3d) -> Option<RawSample> {
        if bounds.is_empty() {
            return None;
        }
        match lod {
            Lod::Box => Some(RawSample::from_points(&bounds.corners())),
            Lod::Centroid => Some(RawSample::from_points(&[bounds.center()])),
            _ => None,
        }
    }

    fn insert_positions(prim: &mut Primitive, points: RawSample) {
        prim.attributes.insert(
            POSITIONS.to_string(),
            Attribute {
                group: ChannelGroup::Geometry,
                data: Arc::new(points),
            },
        );
    }
}

impl RepresentationBuilder for PrimitiveBuilder {
    type Output = Primitive;

    fn build_full(&self, obj: &ObjectRef, t: Chrono, lod: Lod) -> Result<Primitive> {
        // One lock for every read of this build.
        obj.read(|_, _| {
            let kind = obj.kind()?;
            let mut prim = Primitive::empty(Arc::from(obj.path()), lod);
            prim.transform = world_transform(obj, t, self.clock)?;
            prim.bounds = self.bounds(obj, t)?;

            match lod {
                Lod::Full if kind.is_geometry() => {
                    prim.attributes = self.attributes(obj, t)?;
                    prim.topology = self.topology(obj, kind, t, prim.num_points())?;
                }
                Lod::Points if kind.is_geometry() => {
                    if let Some(p) = self.channel(obj, ChannelGroup::Geometry, POSITIONS, t)? {
                        Self::insert_positions(&mut prim, p);
                    }
                }
                Lod::Box | Lod::Centroid => {
                    if let Some(p) = Self::proxy_points(lod, &prim.bounds) {
                        Self::insert_positions(&mut prim, p);
                    }
                }
                _ => {}
            }
            trace!("built {} at {t}: {lod}, {} points", obj.path(), prim.num_points());
            Ok(prim)
        })
    }

    fn refresh_attributes(&self, obj: &ObjectRef, t: Chrono, existing: &Primitive) -> Result<Primitive> {
        obj.read(|_, _| {
            let mut prim = existing.clone();
            prim.transform = world_transform(obj, t, self.clock)?;
            prim.bounds = self.bounds(obj, t)?;

            if matches!(existing.lod, Lod::Box | Lod::Centroid) {
                prim.attributes.clear();
                if let Some(p) = Self::proxy_points(existing.lod, &prim.bounds) {
                    Self::insert_positions(&mut prim, p);
                }
                return Ok(prim);
            }

            for (name, attr) in &existing.attributes {
                if attr.data.is_constant {
                    continue;
                }
                match self.channel(obj, attr.group, name, t)? {
                    Some(data) => {
                        prim.attributes.insert(
                            name.clone(),
                            Attribute {
                                group: attr.group,
                                data: Arc::new(data),
                            },
                        );
                    }
                    None => {
                        trace!("{}: dropping unavailable channel {name}", obj.path());
                        prim.attributes.remove(name);
                    }
                }
            }

            if prim.topology.is_some() && prim.num_points() != existing.num_points() {
                return Err(Error::CorruptTopology(format!(
                    "{}: point count changed from {} to {} under fixed topology",
                    obj.path(),
                    existing.num_points(),
                    prim.num_points()
                )));
            }
            Ok(prim)
        })
    }

    fn apply_transform(&self, rep: &Primitive, transform: DMat4) -> Primitive {
        Primitive {
            transform,
            ..rep.clone()
        }
    }

    fn embeds_world_transform(&self) -> bool {
        true
    }
}

/// Transform a point cloud's positions by a matrix, for hosts that want
/// world-space buffers.
pub fn bake_points(prim: &Primitive) -> Vec<DVec3> {
    prim.positions()
        .and_then(|p| p.to_points())
        .map(|pts| pts.into_iter().map(|p| prim.transform.transform_point3(p)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_validate() {
        let quad = Topology {
            counts: vec![4],
            indices: vec![0, 1, 2, 3],
        };
        assert!(quad.validate(4).is_ok());
        assert!(matches!(quad.validate(3), Err(Error::CorruptTopology(_))));

        let short = Topology {
            counts: vec![4],
            indices: vec![0, 1, 2],
        };
        assert!(short.validate(4).is_err());

        let curves = Topology {
            counts: vec![2, 3],
            indices: Vec::new(),
        };
        assert!(curves.validate(5).is_ok());
        assert!(curves.validate(6).is_err());
    }

    #[test]
    fn test_world_bounds() {
        let mut prim = Primitive::empty(Arc::from("/p"), Lod::Box);
        prim.bounds = BBox3d::new(DVec3::ZERO, DVec3::ONE);
        prim.transform = DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0));
        let wb = prim.world_bounds();
        assert_eq!(wb.min, DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(wb.max, DVec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn test_proxy_points() {
        let b = BBox3d::new(DVec3::ZERO, DVec3::splat(2.0));
        assert_eq!(PrimitiveBuilder::proxy_points(Lod::Box, &b).unwrap().num_entries(), 8);
        let c = PrimitiveBuilder::proxy_points(Lod::Centroid, &b).unwrap();
        assert_eq!(c.as_f32().unwrap(), &[1.0, 1.0, 1.0]);
        assert!(PrimitiveBuilder::proxy_points(Lod::Full, &b).is_none());
        assert!(PrimitiveBuilder::proxy_points(Lod::Box, &BBox3d::EMPTY).is_none());
    }
}
