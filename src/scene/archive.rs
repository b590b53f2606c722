//! In-memory archive.
//!
//! Nodes live in a generation-checked arena. Removing a node bumps its slot
//! generation so handles taken before the removal report
//! [`Error::StaleHandle`] instead of resolving to whatever reuses the slot.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::{
    ArchiveReader, ChannelGroup, ChannelInfo, NodeId, NodeKind, RawSample, TimeSampling,
    TopologyVariance, POSITIONS, TOPOLOGY_CHANNELS,
};
use crate::geom::{CameraSample, XformSample};
use crate::util::{DataType, Error, Result};

/// Samples of one channel plus their shared timing.
#[derive(Clone, Debug)]
struct Timed<T> {
    time_sampling: Option<Arc<TimeSampling>>,
    samples: Vec<T>,
    is_constant: bool,
}

impl<T: PartialEq> Timed<T> {
    fn new(time_sampling: Option<Arc<TimeSampling>>, samples: Vec<T>) -> Self {
        let is_constant = samples.windows(2).all(|w| w[0] == w[1]);
        Self {
            time_sampling,
            samples,
            is_constant,
        }
    }

    fn info(&self, data_type: DataType) -> ChannelInfo {
        ChannelInfo {
            time_sampling: self.time_sampling.clone(),
            num_samples: self.samples.len(),
            data_type,
            is_constant: self.is_constant,
        }
    }
}

#[derive(Clone, Debug)]
struct Channel {
    time_sampling: Option<Arc<TimeSampling>>,
    data_type: DataType,
    samples: Vec<RawSample>,
    is_constant: bool,
}

impl Channel {
    fn info(&self) -> ChannelInfo {
        ChannelInfo {
            time_sampling: self.time_sampling.clone(),
            num_samples: self.samples.len(),
            data_type: self.data_type,
            is_constant: self.is_constant,
        }
    }
}

#[derive(Clone, Debug)]
struct NodeData {
    path: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    declared_topology: Option<TopologyVariance>,
    channels: BTreeMap<(ChannelGroup, String), Channel>,
    xform: Option<Timed<XformSample>>,
    camera: Option<Timed<CameraSample>>,
}

impl NodeData {
    fn new(path: String, kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            path,
            kind,
            parent,
            children: Vec::new(),
            declared_topology: None,
            channels: BTreeMap::new(),
            xform: None,
            camera: None,
        }
    }

    fn geometry(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&(ChannelGroup::Geometry, name.to_string()))
    }

    /// Connectivity differs between samples.
    fn topology_varies(&self) -> bool {
        let counts_vary = TOPOLOGY_CHANNELS
            .iter()
            .filter_map(|name| self.geometry(name))
            .any(|c| !c.is_constant);
        let points_vary = self.geometry(POSITIONS).is_some_and(|c| {
            c.samples
                .windows(2)
                .any(|w| w[0].num_entries() != w[1].num_entries())
        });
        counts_vary || points_vary
    }

    fn values_vary(&self) -> bool {
        self.channels
            .iter()
            .any(|((group, _), c)| *group == ChannelGroup::Geometry && !c.is_constant)
    }

    /// Declared variance, raised to heterogeneous when connectivity actually
    /// changes. Without a declaration the variance is inferred.
    fn topology_variance(&self) -> TopologyVariance {
        let varies = self.topology_varies();
        match self.declared_topology {
            Some(_) if varies => TopologyVariance::Heterogeneous,
            Some(declared) => declared,
            None if varies => TopologyVariance::Heterogeneous,
            None if self.values_vary() => TopologyVariance::Homogeneous,
            None => TopologyVariance::Constant,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    by_path: HashMap<String, NodeId>,
    free: Vec<u32>,
}

impl Arena {
    fn get(&self, id: NodeId) -> Result<&NodeData> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
            .ok_or_else(|| Error::StaleHandle(format!("node #{}:{}", id.index, id.generation)))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
            .ok_or_else(|| Error::StaleHandle(format!("node #{}:{}", id.index, id.generation)))
    }

    fn insert(&mut self, data: NodeData) -> NodeId {
        let path = data.path.clone();
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(data);
                NodeId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(data),
                });
                NodeId::new((self.slots.len() - 1) as u32, 0)
            }
        };
        self.by_path.insert(path, id);
        id
    }

    fn remove(&mut self, id: NodeId) {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        if let Some(node) = slot.node.take() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            self.by_path.remove(&node.path);
            for child in node.children {
                self.remove(child);
            }
        }
    }
}

/// Parent path of `/a/b/c` is `/a/b`; of `/a` is `/`.
pub(crate) fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

/// Normalize `a/b/` to `/a/b`.
pub(crate) fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

/// Archive held entirely in memory.
///
/// Built with the `&mut self` methods, then shared behind an `Arc`. Node
/// removal and read-failure injection work through `&self` so a shared
/// archive can still change under its readers.
pub struct MemoryArchive {
    name: String,
    arena: RwLock<Arena>,
    reads: Arc<AtomicUsize>,
    fail_reads: AtomicBool,
}

impl MemoryArchive {
    /// Create an archive holding only the root node.
    pub fn new(name: impl Into<String>) -> Self {
        let mut arena = Arena::default();
        arena.insert(NodeData::new("/".to_string(), NodeKind::Unknown, None));
        Self {
            name: name.into(),
            arena: RwLock::new(arena),
            reads: Arc::new(AtomicUsize::new(0)),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Add a node under an existing parent.
    pub fn add_node(&mut self, path: &str, kind: NodeKind) -> Result<NodeId> {
        let path = normalize_path(path);
        let arena = self.arena.get_mut();
        if arena.by_path.contains_key(&path) {
            return Err(Error::invalid(format!("duplicate node path '{path}'")));
        }
        let parent_path = parent_path(&path).ok_or_else(|| Error::invalid("cannot re-add the root"))?;
        let parent = *arena
            .by_path
            .get(parent_path)
            .ok_or_else(|| Error::NodeNotFound(parent_path.to_string()))?;

        let id = arena.insert(NodeData::new(path, kind, Some(parent)));
        arena.get_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Declare the topology variance of a geometry node.
    pub fn set_topology_variance(&mut self, node: NodeId, variance: TopologyVariance) -> Result<()> {
        self.arena.get_mut().get_mut(node)?.declared_topology = Some(variance);
        Ok(())
    }

    /// Add a channel. Samples must share one data type.
    pub fn add_channel(
        &mut self,
        node: NodeId,
        group: ChannelGroup,
        name: &str,
        time_sampling: Option<Arc<TimeSampling>>,
        samples: Vec<RawSample>,
    ) -> Result<()> {
        let data_type = samples.first().map(|s| s.data_type()).unwrap_or_default();
        if let Some(bad) = samples.iter().find(|s| s.data_type() != data_type) {
            return Err(Error::ShapeMismatch {
                expected: data_type.to_string(),
                actual: bad.data_type().to_string(),
            });
        }
        let is_constant = match samples.first() {
            Some(first) => samples.iter().skip(1).all(|s| s.content_eq(first)),
            None => true,
        };
        let channel = Channel {
            time_sampling,
            data_type,
            samples: samples.into_iter().map(|s| s.with_constant(is_constant)).collect(),
            is_constant,
        };
        self.arena
            .get_mut()
            .get_mut(node)?
            .channels
            .insert((group, name.to_string()), channel);
        Ok(())
    }

    pub fn set_xform(
        &mut self,
        node: NodeId,
        time_sampling: Option<Arc<TimeSampling>>,
        samples: Vec<XformSample>,
    ) -> Result<()> {
        self.arena.get_mut().get_mut(node)?.xform = Some(Timed::new(time_sampling, samples));
        Ok(())
    }

    pub fn set_camera(
        &mut self,
        node: NodeId,
        time_sampling: Option<Arc<TimeSampling>>,
        samples: Vec<CameraSample>,
    ) -> Result<()> {
        self.arena.get_mut().get_mut(node)?.camera = Some(Timed::new(time_sampling, samples));
        Ok(())
    }

    /// Remove a node and its subtree. Outstanding handles become stale.
    pub fn remove_node(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        if path == "/" {
            return Err(Error::invalid("cannot remove the root"));
        }
        let mut arena = self.arena.write();
        let id = *arena
            .by_path
            .get(&path)
            .ok_or_else(|| Error::NodeNotFound(path.clone()))?;
        let parent = arena.get(id)?.parent;
        if let Some(parent) = parent {
            if let Ok(p) = arena.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        arena.remove(id);
        debug!("removed node {path}");
        Ok(())
    }

    /// Counter of raw sample reads served, shared with the caller.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    /// Make every raw sample read fail, as a broken file would.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn num_nodes(&self) -> usize {
        self.arena.read().by_path.len()
    }

    fn with_node<T>(&self, id: NodeId, f: impl FnOnce(&NodeData) -> Result<T>) -> Result<T> {
        let arena = self.arena.read();
        f(arena.get(id)?)
    }
}

impl ArchiveReader for MemoryArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> NodeId {
        NodeId::new(0, 0)
    }

    fn lookup(&self, path: &str) -> Option<NodeId> {
        self.arena.read().by_path.get(&normalize_path(path)).copied()
    }

    fn is_valid(&self, node: NodeId) -> bool {
        self.arena.read().get(node).is_ok()
    }

    fn node_path(&self, node: NodeId) -> Result<String> {
        self.with_node(node, |n| Ok(n.path.clone()))
    }

    fn node_kind(&self, node: NodeId) -> Result<NodeKind> {
        self.with_node(node, |n| Ok(n.kind))
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.with_node(node, |n| Ok(n.parent))
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.with_node(node, |n| Ok(n.children.clone()))
    }

    fn topology_variance(&self, node: NodeId) -> Result<TopologyVariance> {
        self.with_node(node, |n| Ok(n.topology_variance()))
    }

    fn channel_names(&self, node: NodeId, group: ChannelGroup) -> Result<Vec<String>> {
        self.with_node(node, |n| {
            Ok(n.channels
                .keys()
                .filter(|(g, _)| *g == group)
                .map(|(_, name)| name.clone())
                .collect())
        })
    }

    fn channel_info(&self, node: NodeId, group: ChannelGroup, name: &str) -> Result<ChannelInfo> {
        self.with_node(node, |n| {
            n.channels
                .get(&(group, name.to_string()))
                .map(Channel::info)
                .ok_or_else(|| Error::ChannelNotFound {
                    node: n.path.clone(),
                    channel: name.to_string(),
                })
        })
    }

    fn read_raw_sample(
        &self,
        node: NodeId,
        group: ChannelGroup,
        name: &str,
        index: usize,
    ) -> Result<RawSample> {
        self.with_node(node, |n| {
            let channel = n
                .channels
                .get(&(group, name.to_string()))
                .ok_or_else(|| Error::ChannelNotFound {
                    node: n.path.clone(),
                    channel: name.to_string(),
                })?;
            if self.fail_reads.load(Ordering::Relaxed) {
                return Err(Error::read_failed(format!("{}.{name}", n.path), "injected failure"));
            }
            self.reads.fetch_add(1, Ordering::Relaxed);
            channel
                .samples
                .get(index)
                .cloned()
                .ok_or(Error::SampleOutOfBounds {
                    index,
                    count: channel.samples.len(),
                })
        })
    }

    fn xform_info(&self, node: NodeId) -> Result<Option<ChannelInfo>> {
        self.with_node(node, |n| {
            if n.kind != NodeKind::Xform {
                return Ok(None);
            }
            Ok(Some(match &n.xform {
                Some(x) => x.info(DataType::MAT44D),
                None => ChannelInfo {
                    data_type: DataType::MAT44D,
                    is_constant: true,
                    ..Default::default()
                },
            }))
        })
    }

    fn read_xform_sample(&self, node: NodeId, index: usize) -> Result<XformSample> {
        self.with_node(node, |n| {
            if n.kind != NodeKind::Xform {
                return Err(Error::ChannelNotFound {
                    node: n.path.clone(),
                    channel: ".xform".into(),
                });
            }
            let Some(xform) = n.xform.as_ref().filter(|x| !x.samples.is_empty()) else {
                return Ok(XformSample::identity());
            };
            xform.samples.get(index).cloned().ok_or(Error::SampleOutOfBounds {
                index,
                count: xform.samples.len(),
            })
        })
    }

    fn camera_info(&self, node: NodeId) -> Result<Option<ChannelInfo>> {
        self.with_node(node, |n| {
            Ok(n.camera.as_ref().map(|c| c.info(DataType::FLOAT64)))
        })
    }

    fn read_camera_sample(&self, node: NodeId, index: usize) -> Result<CameraSample> {
        self.with_node(node, |n| {
            let camera = n.camera.as_ref().ok_or_else(|| Error::ChannelNotFound {
                node: n.path.clone(),
                channel: ".camera".into(),
            })?;
            camera.samples.get(index).cloned().ok_or(Error::SampleOutOfBounds {
                index,
                count: camera.samples.len(),
            })
        })
    }

    fn time_range(&self) -> Option<(f64, f64)> {
        let arena = self.arena.read();
        let mut range: Option<(f64, f64)> = None;
        let mut include = |ts: &Option<Arc<TimeSampling>>, n: usize| {
            if let Some(ts) = ts.as_ref().filter(|_| n > 0) {
                let (lo, hi) = ts.time_range(n);
                range = Some(match range {
                    Some((a, b)) => (a.min(lo), b.max(hi)),
                    None => (lo, hi),
                });
            }
        };
        for node in arena.slots.iter().filter_map(|s| s.node.as_ref()) {
            for c in node.channels.values() {
                include(&c.time_sampling, c.samples.len());
            }
            if let Some(x) = &node.xform {
                include(&x.time_sampling, x.samples.len());
            }
            if let Some(c) = &node.camera {
                include(&c.time_sampling, c.samples.len());
            }
        }
        range
    }
}
