//! The archive-facing interface consumed by resolution and caching.
//!
//! Readers address nodes through generation-checked [`NodeId`] handles and
//! channels through a ([`ChannelGroup`], name) pair. Every method may fail; a
//! handle that no longer resolves reports [`Error::StaleHandle`].
//!
//! [`Error::StaleHandle`]: crate::util::Error::StaleHandle

use std::fmt;
use std::sync::Arc;

use super::{RawSample, TimeSampling, TopologyVariance};
use crate::geom::{CameraSample, XformSample};
use crate::util::{DataType, Result};

/// Point positions.
pub const POSITIONS: &str = "P";
/// Polygon vertex counts.
pub const FACE_COUNTS: &str = ".faceCounts";
/// Polygon vertex indices.
pub const FACE_INDICES: &str = ".faceIndices";
/// Curve vertex counts.
pub const CURVE_COUNTS: &str = "nVertices";
/// Point identifiers.
pub const POINT_IDS: &str = "id";
/// Stored self bounds.
pub const SELF_BOUNDS: &str = ".selfBnds";
/// Locator channel carried by transform nodes.
pub const LOCATOR: &str = "locator";

/// Channels whose samples describe connectivity rather than values.
pub const TOPOLOGY_CHANNELS: &[&str] = &[FACE_COUNTS, FACE_INDICES, CURVE_COUNTS];

/// Closed set of node kinds an archive can hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Xform,
    PolyMesh,
    SubD,
    Curves,
    Points,
    NuPatch,
    Camera,
    FaceSet,
    Light,
    Material,
    #[default]
    Unknown,
}

impl NodeKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "xform" | "transform" => Self::Xform,
            "polymesh" | "mesh" => Self::PolyMesh,
            "subd" => Self::SubD,
            "curves" => Self::Curves,
            "points" => Self::Points,
            "nupatch" => Self::NuPatch,
            "camera" => Self::Camera,
            "faceset" => Self::FaceSet,
            "light" => Self::Light,
            "material" => Self::Material,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xform => "xform",
            Self::PolyMesh => "polymesh",
            Self::SubD => "subd",
            Self::Curves => "curves",
            Self::Points => "points",
            Self::NuPatch => "nupatch",
            Self::Camera => "camera",
            Self::FaceSet => "faceset",
            Self::Light => "light",
            Self::Material => "material",
            Self::Unknown => "unknown",
        }
    }

    /// Kinds whose samples build a geometric representation.
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            Self::PolyMesh | Self::SubD | Self::Curves | Self::Points | Self::NuPatch
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a node inside one archive.
///
/// The generation is bumped whenever the slot is reused, so a handle kept
/// across a removal stops resolving instead of pointing at a different node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

impl NodeId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Which property compound a channel lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelGroup {
    /// Schema channels (positions, counts, indices, normals, ids).
    Geometry,
    /// Arbitrary geometry parameters.
    Arbitrary,
    /// User properties.
    User,
    /// Object-level properties outside the schema (visibility, locator).
    Object,
}

impl ChannelGroup {
    pub const ALL: [Self; 4] = [Self::Geometry, Self::Arbitrary, Self::User, Self::Object];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geometry => "geometry",
            Self::Arbitrary => "arbitrary",
            Self::User => "user",
            Self::Object => "object",
        }
    }
}

/// Static description of one channel.
#[derive(Clone, Debug, Default)]
pub struct ChannelInfo {
    /// Shared with every other channel recorded on the same clock.
    pub time_sampling: Option<Arc<TimeSampling>>,
    pub num_samples: usize,
    pub data_type: DataType,
    /// True when the channel has at most one distinct sample.
    pub is_constant: bool,
}

/// Reader interface for a scene archive.
///
/// Implementations are not required to be reentrant across threads; callers
/// serialize access through the owning [`Archive`](crate::scene::Archive).
pub trait ArchiveReader: Send + Sync {
    /// Get the archive name/path.
    fn name(&self) -> &str;

    /// Get the root node.
    fn root(&self) -> NodeId;

    /// Find a node by full path (`/a/b/c`).
    fn lookup(&self, path: &str) -> Option<NodeId>;

    /// True if the handle still resolves.
    fn is_valid(&self, node: NodeId) -> bool;

    fn node_path(&self, node: NodeId) -> Result<String>;

    fn node_kind(&self, node: NodeId) -> Result<NodeKind>;

    /// Parent of a node; `None` for the root.
    fn parent(&self, node: NodeId) -> Result<Option<NodeId>>;

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>>;

    fn topology_variance(&self, node: NodeId) -> Result<TopologyVariance>;

    fn channel_names(&self, node: NodeId, group: ChannelGroup) -> Result<Vec<String>>;

    fn channel_info(&self, node: NodeId, group: ChannelGroup, name: &str) -> Result<ChannelInfo>;

    fn has_channel(&self, node: NodeId, group: ChannelGroup, name: &str) -> bool {
        self.channel_info(node, group, name).is_ok()
    }

    fn is_channel_constant(&self, node: NodeId, group: ChannelGroup, name: &str) -> Result<bool> {
        Ok(self.channel_info(node, group, name)?.is_constant)
    }

    fn num_samples(&self, node: NodeId, group: ChannelGroup, name: &str) -> Result<usize> {
        Ok(self.channel_info(node, group, name)?.num_samples)
    }

    fn read_raw_sample(
        &self,
        node: NodeId,
        group: ChannelGroup,
        name: &str,
        index: usize,
    ) -> Result<RawSample>;

    /// Timing of a transform node's op stack; `None` for other kinds.
    fn xform_info(&self, node: NodeId) -> Result<Option<ChannelInfo>>;

    fn read_xform_sample(&self, node: NodeId, index: usize) -> Result<XformSample>;

    /// Timing of a camera node's samples; `None` for other kinds.
    fn camera_info(&self, node: NodeId) -> Result<Option<ChannelInfo>>;

    fn read_camera_sample(&self, node: NodeId, index: usize) -> Result<CameraSample>;

    /// Overall time range covered by any sampled channel, if any.
    fn time_range(&self) -> Option<(f64, f64)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_names() {
        for kind in [NodeKind::Xform, NodeKind::PolyMesh, NodeKind::Points, NodeKind::Camera] {
            assert_eq!(NodeKind::from_str(kind.as_str()), kind);
        }
        assert_eq!(NodeKind::from_str("Mesh"), NodeKind::PolyMesh);
        assert_eq!(NodeKind::from_str("what"), NodeKind::Unknown);
        assert!(NodeKind::Curves.is_geometry());
        assert!(!NodeKind::Xform.is_geometry());
    }

    #[test]
    fn test_node_id_ordering() {
        let a = NodeId::new(1, 0);
        let b = NodeId::new(1, 1);
        assert_ne!(a, b);
        assert!(a < b);
    }
}
