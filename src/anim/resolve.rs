//! ChannelResolver - values of a node at a continuous time.
//!
//! Every function reads the bracketing samples under one archive lock, then
//! blends them. Unlike the caches, these return errors; callers decide how to
//! degrade.

use crate::blend::{blend, blend_bounds, blend_camera, blend_xform};
use crate::core::{ArchiveReader, ChannelGroup, NodeId, RawSample, SampleClock, POSITIONS, SELF_BOUNDS};
use crate::geom::{CameraSample, XformSample};
use crate::scene::{Archive, ObjectRef};
use crate::util::{BBox3d, Chrono, DMat4, Error, Result};

/// Interpolated value of one channel at time `t`.
///
/// A channel with no samples reports [`Error::ChannelNotFound`] so the caller
/// can substitute its own default.
pub fn resolve_channel(
    obj: &ObjectRef,
    group: ChannelGroup,
    name: &str,
    t: Chrono,
    clock: SampleClock,
) -> Result<RawSample> {
    obj.read(|r, n| channel_at(obj, r, n, group, name, t, clock))
}

fn channel_at(
    obj: &ObjectRef,
    r: &dyn ArchiveReader,
    n: NodeId,
    group: ChannelGroup,
    name: &str,
    t: Chrono,
    clock: SampleClock,
) -> Result<RawSample> {
    let info = r.channel_info(n, group, name)?;
    if info.num_samples == 0 {
        return Err(Error::ChannelNotFound {
            node: obj.path().to_string(),
            channel: name.to_string(),
        });
    }
    let b = clock.resolve(t, info.time_sampling.as_deref(), info.num_samples);
    let a = r.read_raw_sample(n, group, name, b.i0)?;
    if b.is_exact() {
        return Ok(a);
    }
    obj.archive().poll_interrupt()?;
    let c = r.read_raw_sample(n, group, name, b.i1)?;
    Ok(blend(&a, &c, b.bias))
}

/// Transform op stack at `t`. Nodes without one resolve to identity.
fn xform_at(obj: &ObjectRef, r: &dyn ArchiveReader, n: NodeId, t: Chrono, clock: SampleClock) -> Result<XformSample> {
    let Some(info) = r.xform_info(n)? else {
        return Ok(XformSample::identity());
    };
    if info.num_samples == 0 {
        return Ok(XformSample::identity());
    }
    let b = clock.resolve(t, info.time_sampling.as_deref(), info.num_samples);
    let a = r.read_xform_sample(n, b.i0)?;
    if b.is_exact() {
        return Ok(a);
    }
    obj.archive().poll_interrupt()?;
    let c = r.read_xform_sample(n, b.i1)?;
    Ok(blend_xform(&a, &c, b.bias))
}

/// Blended op stack of `obj` at time `t`.
pub fn resolve_xform(obj: &ObjectRef, t: Chrono, clock: SampleClock) -> Result<XformSample> {
    obj.read(|r, n| xform_at(obj, r, n, t, clock))
}

/// Local matrix of `obj` at time `t`.
pub fn local_transform(obj: &ObjectRef, t: Chrono, clock: SampleClock) -> Result<DMat4> {
    Ok(resolve_xform(obj, t, clock)?.matrix())
}

/// Object-to-world matrix at time `t`.
///
/// Composes parent matrices until a node that does not inherit.
pub fn world_transform(obj: &ObjectRef, t: Chrono, clock: SampleClock) -> Result<DMat4> {
    obj.read(|r, n| {
        let local = xform_at(obj, r, n, t, clock)?;
        let mut world = local.matrix();
        let mut inherits = local.inherits;
        let mut current = r.parent(n)?;
        while let (true, Some(node)) = (inherits, current) {
            let s = xform_at(obj, r, node, t, clock)?;
            world = s.matrix() * world;
            inherits = s.inherits;
            current = r.parent(node)?;
        }
        Ok(world)
    })
}

/// Local bounds at time `t`: stored self bounds when present, else the
/// extent of the resolved positions.
pub fn resolve_bounds(obj: &ObjectRef, t: Chrono, clock: SampleClock) -> Result<BBox3d> {
    obj.read(|r, n| {
        if let Ok(info) = r.channel_info(n, ChannelGroup::Geometry, SELF_BOUNDS) {
            if info.num_samples > 0 {
                let b = clock.resolve(t, info.time_sampling.as_deref(), info.num_samples);
                let read = |i| -> Result<BBox3d> {
                    let s = r.read_raw_sample(n, ChannelGroup::Geometry, SELF_BOUNDS, i)?;
                    BBox3d::from_slice(&s.to_f64_vec()).ok_or_else(|| Error::ShapeMismatch {
                        expected: "box3d".into(),
                        actual: s.data_type().to_string(),
                    })
                };
                let a = read(b.i0)?;
                if b.is_exact() {
                    return Ok(a);
                }
                obj.archive().poll_interrupt()?;
                return Ok(blend_bounds(&a, &read(b.i1)?, b.bias));
            }
        }

        let p = channel_at(obj, r, n, ChannelGroup::Geometry, POSITIONS, t, clock)?;
        let points = p.to_points().ok_or_else(|| Error::ShapeMismatch {
            expected: "point3".into(),
            actual: p.data_type().to_string(),
        })?;
        Ok(BBox3d::from_points(points))
    })
}

/// Camera parameters at time `t`. A camera without samples uses defaults.
pub fn resolve_camera(obj: &ObjectRef, t: Chrono, clock: SampleClock) -> Result<CameraSample> {
    obj.read(|r, n| {
        let info = r
            .camera_info(n)?
            .ok_or_else(|| Error::invalid(format!("{} is not a camera", obj.path())))?;
        if info.num_samples == 0 {
            return Ok(CameraSample::default());
        }
        let b = clock.resolve(t, info.time_sampling.as_deref(), info.num_samples);
        let a = r.read_camera_sample(n, b.i0)?;
        if b.is_exact() {
            return Ok(a);
        }
        obj.archive().poll_interrupt()?;
        Ok(blend_camera(&a, &r.read_camera_sample(n, b.i1)?, b.bias))
    })
}

/// Clamp `t` to the time range the archive covers. Archives with no
/// sampled channel, or that cannot be read, leave `t` unchanged.
pub fn clamp_time(archive: &Archive, t: Chrono) -> Chrono {
    match archive.read(|r| Ok(r.time_range())) {
        Ok(Some((start, end))) if start <= end => t.clamp(start, end),
        _ => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::{NodeKind, TimeSampling};
    use crate::geom::XformOp;
    use crate::scene::{MemoryArchive, Session};
    use crate::util::DVec3;

    fn scene() -> MemoryArchive {
        let ts = Some(Arc::new(TimeSampling::uniform(1.0, 0.0)));
        let mut a = MemoryArchive::new("resolve");
        let parent = a.add_node("/parent", NodeKind::Xform).unwrap();
        a.set_xform(
            parent,
            ts.clone(),
            vec![
                XformSample::from_ops([XformOp::translate(0.0, 0.0, 0.0)], true),
                XformSample::from_ops([XformOp::translate(10.0, 0.0, 0.0)], true),
            ],
        )
        .unwrap();
        let child = a.add_node("/parent/child", NodeKind::Xform).unwrap();
        a.set_xform(child, None, vec![XformSample::from_ops([XformOp::translate(0.0, 1.0, 0.0)], true)])
            .unwrap();
        let mesh = a.add_node("/parent/child/mesh", NodeKind::PolyMesh).unwrap();
        a.add_channel(
            mesh,
            ChannelGroup::Geometry,
            POSITIONS,
            ts,
            vec![
                RawSample::from_f32(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0], 3),
                RawSample::from_f32(vec![0.0, 0.0, 0.0, 3.0, 3.0, 3.0], 3),
            ],
        )
        .unwrap();
        a
    }

    #[test]
    fn test_resolve_channel_blends() {
        let session = Session::new();
        let archive = session.register(Arc::new(scene()));
        let mesh = archive.object("/parent/child/mesh").unwrap();
        let p = resolve_channel(&mesh, ChannelGroup::Geometry, POSITIONS, 0.5, SampleClock::default()).unwrap();
        assert_eq!(p.as_f32().unwrap(), &[0.0, 0.0, 0.0, 2.0, 2.0, 2.0]);

        let missing = resolve_channel(&mesh, ChannelGroup::Arbitrary, "Cd", 0.5, SampleClock::default());
        assert!(missing.is_err());
    }

    #[test]
    fn test_world_transform_composes_parents() {
        let session = Session::new();
        let archive = session.register(Arc::new(scene()));
        let mesh = archive.object("/parent/child/mesh").unwrap();
        let world = world_transform(&mesh, 0.5, SampleClock::default()).unwrap();
        assert!((world.w_axis.truncate() - DVec3::new(5.0, 1.0, 0.0)).length() < 1e-9);

        let local = local_transform(&mesh, 0.5, SampleClock::default()).unwrap();
        assert_eq!(local, DMat4::IDENTITY);
    }

    #[test]
    fn test_bounds_from_points() {
        let session = Session::new();
        let archive = session.register(Arc::new(scene()));
        let mesh = archive.object("/parent/child/mesh").unwrap();
        let b = resolve_bounds(&mesh, 1.0, SampleClock::default()).unwrap();
        assert_eq!(b.max, DVec3::splat(3.0));
    }

    #[test]
    fn test_clamp_time() {
        let session = Session::new();
        let archive = session.register(Arc::new(scene()));
        assert_eq!(clamp_time(&archive, -5.0), 0.0);
        assert_eq!(clamp_time(&archive, 7.0), 1.0);
        assert_eq!(clamp_time(&archive, 0.25), 0.25);
    }
}
