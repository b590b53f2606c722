//! Reuse, patch and rebuild decisions of the derived geometry cache.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use alembic_timecache::anim::{world_transform, ClassifyOptions};
use alembic_timecache::build::{Primitive, PrimitiveBuilder};
use alembic_timecache::cache::{CacheAction, CachePool, DerivedGeometryCache, Lod};
use alembic_timecache::core::{
    ChannelGroup, NodeKind, RawSample, SampleClock, TimeSampling, FACE_COUNTS, FACE_INDICES, POSITIONS,
};
use alembic_timecache::geom::{XformOp, XformSample};
use alembic_timecache::scene::{MemoryArchive, Session};
use alembic_timecache::util::DVec3;

fn quad(z: f32) -> RawSample {
    RawSample::from_f32(vec![0.0, 0.0, z, 1.0, 0.0, z, 1.0, 1.0, z, 0.0, 1.0, z], 3)
}

fn cloud(n: usize) -> RawSample {
    RawSample::from_f32((0..n * 3).map(|i| i as f32).collect(), 3)
}

fn scene() -> MemoryArchive {
    let ts = Some(Arc::new(TimeSampling::uniform(1.0, 0.0)));
    let mut a = MemoryArchive::new("cache");

    let rig = a.add_node("/rig", NodeKind::Xform).unwrap();
    a.set_xform(rig, ts.clone(), vec![
        XformSample::from_ops([XformOp::translate(0.0, 0.0, 0.0)], true),
        XformSample::from_ops([XformOp::translate(2.0, 0.0, 0.0)], true),
    ])
    .unwrap();

    let body = a.add_node("/rig/body", NodeKind::PolyMesh).unwrap();
    a.add_channel(body, ChannelGroup::Geometry, POSITIONS, None, vec![quad(0.0)]).unwrap();
    a.add_channel(body, ChannelGroup::Geometry, FACE_COUNTS, None, vec![RawSample::from_i32(vec![4], 1)])
        .unwrap();
    a.add_channel(body, ChannelGroup::Geometry, FACE_INDICES, None, vec![RawSample::from_i32(vec![0, 1, 2, 3], 1)])
        .unwrap();

    let prop = a.add_node("/prop", NodeKind::PolyMesh).unwrap();
    a.add_channel(prop, ChannelGroup::Geometry, POSITIONS, None, vec![quad(0.0)]).unwrap();
    a.add_channel(prop, ChannelGroup::Geometry, FACE_COUNTS, None, vec![RawSample::from_i32(vec![4], 1)])
        .unwrap();
    a.add_channel(prop, ChannelGroup::Geometry, FACE_INDICES, None, vec![RawSample::from_i32(vec![0, 1, 2, 3], 1)])
        .unwrap();

    let cloth = a.add_node("/cloth", NodeKind::PolyMesh).unwrap();
    a.add_channel(cloth, ChannelGroup::Geometry, POSITIONS, ts.clone(), vec![quad(0.0), quad(1.0)])
        .unwrap();
    a.add_channel(cloth, ChannelGroup::Geometry, FACE_COUNTS, None, vec![RawSample::from_i32(vec![4], 1)])
        .unwrap();
    a.add_channel(cloth, ChannelGroup::Geometry, FACE_INDICES, None, vec![RawSample::from_i32(vec![0, 1, 2, 3], 1)])
        .unwrap();
    a.add_channel(cloth, ChannelGroup::Arbitrary, "Cd", None, vec![RawSample::from_f32(vec![0.5; 12], 3)])
        .unwrap();

    let spray = a.add_node("/spray", NodeKind::Points).unwrap();
    a.add_channel(spray, ChannelGroup::Geometry, POSITIONS, ts.clone(), vec![cloud(100), cloud(120)])
        .unwrap();

    let broken = a.add_node("/broken", NodeKind::PolyMesh).unwrap();
    a.add_channel(broken, ChannelGroup::Geometry, POSITIONS, None, vec![quad(0.0)]).unwrap();
    a.add_channel(broken, ChannelGroup::Geometry, FACE_COUNTS, None, vec![RawSample::from_i32(vec![4], 1)])
        .unwrap();
    a.add_channel(broken, ChannelGroup::Geometry, FACE_INDICES, None, vec![RawSample::from_i32(vec![0, 1, 2, 9], 1)])
        .unwrap();

    let blink = a.add_node("/blink", NodeKind::PolyMesh).unwrap();
    a.add_channel(blink, ChannelGroup::Geometry, POSITIONS, None, vec![quad(0.0)]).unwrap();
    a.add_channel(blink, ChannelGroup::Object, "visible", ts, vec![
        RawSample::from_i32(vec![1], 1),
        RawSample::from_i32(vec![0], 1),
    ])
    .unwrap();
    a
}

fn cache(include_ancestor_transform: bool) -> DerivedGeometryCache<Primitive> {
    DerivedGeometryCache::new(
        ClassifyOptions::with_ancestor_transform(include_ancestor_transform),
        SampleClock::default(),
    )
}

#[test]
fn test_constant_reuses_same_representation() {
    let session = Session::new();
    let mem = Arc::new(scene());
    let reads = mem.read_counter();
    let archive = session.register(mem);
    let prop = archive.object("/prop").unwrap();
    let builder = PrimitiveBuilder::default();
    let mut cache = DerivedGeometryCache::default();

    let first = cache.get(&prop, 0.0, Lod::Full, &builder).unwrap();
    assert_eq!(first.num_points(), 4);
    assert_eq!(first.topology.as_ref().unwrap().num_faces(), 1);

    let before = reads.load(Ordering::Relaxed);
    let same_frame = cache.get(&prop, 0.0, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Reused);
    assert_eq!(reads.load(Ordering::Relaxed), before);
    assert!(Arc::ptr_eq(&first, &same_frame));

    let later = cache.get(&prop, 0.5, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Retagged);
    assert!(Arc::ptr_eq(&first, &later));
    assert_eq!(cache.entry().unwrap().frame, 0.5);
}

#[test]
fn test_moving_parent_never_retags_world_transform() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let body = archive.object("/rig/body").unwrap();
    let builder = PrimitiveBuilder::default();
    let clock = SampleClock::default();

    // Default options and options without the ancestor walk both follow the parent.
    for mut held in [DerivedGeometryCache::default(), cache(false)] {
        held.get(&body, 0.0, Lod::Full, &builder).unwrap();
        let moved = held.get(&body, 1.0, Lod::Full, &builder).unwrap();
        assert_eq!(held.last_action(), CacheAction::TransformPatched);
        assert_eq!(moved.transform, world_transform(&body, 1.0, clock).unwrap());
        assert!((moved.transform.w_axis.x - 2.0).abs() < 1e-9);
    }
}

#[test]
fn test_ancestor_motion_patches_transform_only() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let body = archive.object("/rig/body").unwrap();
    let builder = PrimitiveBuilder::default();
    let mut cache = cache(true);

    let first = cache.get(&body, 0.0, Lod::Full, &builder).unwrap();
    let moved = cache.get(&body, 0.5, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::TransformPatched);
    assert!(Arc::ptr_eq(first.topology.as_ref().unwrap(), moved.topology.as_ref().unwrap()));
    assert!(Arc::ptr_eq(first.positions().unwrap(), moved.positions().unwrap()));
    assert!((moved.transform.w_axis.truncate() - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-9);
}

#[test]
fn test_attribute_patch_preserves_topology() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let cloth = archive.object("/cloth").unwrap();
    let builder = PrimitiveBuilder::default();
    let mut cache = cache(false);

    let first = cache.get(&cloth, 0.0, Lod::Full, &builder).unwrap();
    let patched = cache.get(&cloth, 0.5, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::AttributesPatched);

    assert!(Arc::ptr_eq(first.topology.as_ref().unwrap(), patched.topology.as_ref().unwrap()));
    assert!(Arc::ptr_eq(first.attribute("Cd").unwrap(), patched.attribute("Cd").unwrap()));
    assert!(!Arc::ptr_eq(first.positions().unwrap(), patched.positions().unwrap()));
    assert_eq!(patched.positions().unwrap().as_f32().unwrap()[2], 0.5);
    assert!((patched.bounds.max.z - 0.5).abs() < 1e-6);
}

#[test]
fn test_scenario_d_topology_change_rebuilds() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let spray = archive.object("/spray").unwrap();
    let builder = PrimitiveBuilder::default();
    let mut cache = cache(false);

    let first = cache.get(&spray, 0.0, Lod::Full, &builder).unwrap();
    assert_eq!(first.num_points(), 100);
    let second = cache.get(&spray, 1.0, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Rebuilt);
    assert_eq!(second.num_points(), 120);
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_corrupt_topology_falls_back_to_points() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let broken = archive.object("/broken").unwrap();
    let prim = cache(false).get(&broken, 0.0, Lod::Full, &PrimitiveBuilder::default()).unwrap();
    assert!(prim.topology.is_none());
    assert_eq!(prim.num_points(), 4);
}

#[test]
fn test_coarse_lods() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let cloth = archive.object("/cloth").unwrap();
    let builder = PrimitiveBuilder::default();
    let mut cache = cache(false);

    let boxed = cache.get(&cloth, 0.0, Lod::Box, &builder).unwrap();
    assert_eq!(boxed.num_points(), 8);
    assert!(boxed.topology.is_none());

    let centroid = cache.get(&cloth, 1.0, Lod::Centroid, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Built);
    assert_eq!(centroid.positions().unwrap().as_f32().unwrap(), &[0.5, 0.5, 1.0]);

    let hidden = cache.get(&cloth, 1.0, Lod::Hidden, &builder).unwrap();
    assert_eq!(hidden.num_points(), 0);
    assert!(!hidden.bounds.is_empty());
}

#[test]
fn test_read_failures_degrade() {
    let session = Session::new();
    let mem = Arc::new(scene());
    let archive = session.register(mem.clone());
    let cloth = archive.object("/cloth").unwrap();
    let builder = PrimitiveBuilder::default();
    let mut cache = cache(false);

    let good = cache.get(&cloth, 0.0, Lod::Full, &builder).unwrap();

    mem.set_fail_reads(true);
    let failed = cache.get(&cloth, 0.5, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Degraded);
    assert!(Arc::ptr_eq(&good, &failed));
    assert_eq!(cache.entry().unwrap().frame, 0.0);

    mem.set_fail_reads(false);
    session.interrupt();
    let interrupted = cache.get(&cloth, 0.5, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Degraded);
    assert!(Arc::ptr_eq(&good, &interrupted));

    // Recovery reclassifies instead of trusting the stale frame.
    session.clear_interrupt();
    cache.get(&cloth, 0.5, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::AttributesPatched);
    assert_eq!(cache.entry().unwrap().frame, 0.5);

    // Node removed: handle goes stale, last good value survives.
    mem.remove_node("/cloth").unwrap();
    let stale = cache.get(&cloth, 1.0, Lod::Full, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Degraded);
    assert_eq!(stale.num_points(), 4);
}

#[test]
fn test_failed_lod_switch_reports_held_lod() {
    let session = Session::new();
    let mem = Arc::new(scene());
    let archive = session.register(mem.clone());
    let cloth = archive.object("/cloth").unwrap();
    let builder = PrimitiveBuilder::default();
    let mut cache = cache(true);

    let full = cache.get(&cloth, 0.0, Lod::Full, &builder).unwrap();
    mem.set_fail_reads(true);
    let held = cache.get(&cloth, 0.0, Lod::Box, &builder).unwrap();
    assert_eq!(cache.last_action(), CacheAction::Degraded);
    assert!(Arc::ptr_eq(&full, &held));
    assert_eq!(held.lod, Lod::Full);
    assert_eq!(cache.entry().unwrap().lod, Lod::Full);
}

#[test]
fn test_hidden_entity() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let blink = archive.object("/blink").unwrap();
    let builder = PrimitiveBuilder::default();
    let options = ClassifyOptions {
        consider_visibility: true,
        ..Default::default()
    };
    let mut cache = DerivedGeometryCache::new(options, SampleClock::default());

    assert!(cache.get(&blink, 0.0, Lod::Full, &builder).is_some());
    assert!(cache.get(&blink, 1.0, Lod::Full, &builder).is_none());
    assert_eq!(cache.last_action(), CacheAction::Hidden);
    assert!(cache.entry().is_some());
}

#[test]
fn test_pool_parallel_and_purge() {
    let session = Session::new();
    let archive = session.register(Arc::new(scene()));
    let other = session.register(Arc::new(scene()));
    let pool = CachePool::new(PrimitiveBuilder::default(), ClassifyOptions::default(), SampleClock::default());

    let objects = archive.objects().unwrap();
    let reps = pool.resolve_all(&objects, 0.0, Lod::Full);
    assert_eq!(reps.len(), objects.len());
    assert!(reps.iter().all(Option::is_some));

    let again = pool.resolve_all(&objects, 0.0, Lod::Full);
    for (a, b) in reps.iter().zip(&again) {
        assert!(Arc::ptr_eq(a.as_ref().unwrap(), b.as_ref().unwrap()));
    }
    let body = archive.object("/rig/body").unwrap();
    assert_eq!(pool.last_action(&body.key()), Some(CacheAction::Reused));

    pool.get(&other.object("/cloth").unwrap(), 0.0, Lod::Full).unwrap();
    assert_eq!(pool.len(), objects.len() + 1);

    assert_eq!(pool.purge_archive(archive.id()), objects.len());
    assert_eq!(pool.len(), 1);
    session.close(archive.id());
    assert!(pool.get(&body, 0.0, Lod::Full).is_none());
}
