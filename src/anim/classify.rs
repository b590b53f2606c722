//! AnimationClassifier - how much of a node changes over time.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::{
    ArchiveReader, ChannelGroup, NodeId, NodeKind, SampleClock, TopologyVariance, LOCATOR,
    POINT_IDS,
};
use crate::geom::VisibilityCache;
use crate::scene::ObjectRef;
use crate::util::Result;

/// Temporal behavior of a node, ordered by how much must be rebuilt.
///
/// `Invalid` marks a node that could not be classified. It sits outside the
/// ordering: it compares equal only to itself and absorbs every `raise`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationType {
    Constant,
    TransformOnly,
    AttributeOnly,
    TopologyVarying,
    Invalid,
}

impl AnimationType {
    fn rank(self) -> Option<u8> {
        match self {
            Self::Constant => Some(0),
            Self::TransformOnly => Some(1),
            Self::AttributeOnly => Some(2),
            Self::TopologyVarying => Some(3),
            Self::Invalid => None,
        }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::Invalid
    }

    /// The more expensive of the two tiers.
    pub fn raise(self, other: Self) -> Self {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) if b > a => other,
            (Some(_), Some(_)) => self,
            _ => Self::Invalid,
        }
    }

    /// Two-value view for callers that only ask "does the transform move".
    pub fn transform_projection(self) -> Self {
        match self {
            Self::Constant => Self::Constant,
            Self::Invalid => Self::Invalid,
            _ => Self::TransformOnly,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::TransformOnly => "transform",
            Self::AttributeOnly => "attribute",
            Self::TopologyVarying => "topology",
            Self::Invalid => "invalid",
        }
    }
}

impl PartialOrd for AnimationType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for AnimationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional inputs to classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// Raise a constant node to `TransformOnly` when an ancestor transform moves.
    pub include_ancestor_transform: bool,
    /// Raise a constant node to `TransformOnly` when its visibility is animated.
    pub consider_visibility: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            include_ancestor_transform: true,
            consider_visibility: false,
        }
    }
}

impl ClassifyOptions {
    pub fn with_ancestor_transform(include: bool) -> Self {
        Self {
            include_ancestor_transform: include,
            ..Self::default()
        }
    }
}

/// Classify a node. Unresolvable nodes and read failures yield `Invalid`.
pub fn classify(obj: &ObjectRef, include_ancestor_transform: bool) -> AnimationType {
    classify_with(obj, &ClassifyOptions::with_ancestor_transform(include_ancestor_transform))
}

pub fn classify_with(obj: &ObjectRef, options: &ClassifyOptions) -> AnimationType {
    match try_classify(obj, options) {
        Ok(anim) => {
            trace!("classified {} as {anim}", obj.path());
            anim
        }
        Err(e) => {
            debug!("cannot classify {}: {e}", obj.path());
            AnimationType::Invalid
        }
    }
}

fn try_classify(obj: &ObjectRef, options: &ClassifyOptions) -> Result<AnimationType> {
    // One lock for the whole call; nested reads re-enter it.
    obj.read(|r, n| {
        let kind = r.node_kind(n)?;
        let mut anim = intrinsic(obj, r, n, kind)?;

        if anim == AnimationType::Constant
            && options.include_ancestor_transform
            && is_transform_animated(obj)?
        {
            anim = anim.raise(AnimationType::TransformOnly);
        }

        if anim == AnimationType::Constant && options.consider_visibility {
            let vis = VisibilityCache::resolve(obj, 0.0, SampleClock::default())?;
            if vis.animated() {
                anim = anim.raise(AnimationType::TransformOnly);
            }
        }
        Ok(anim)
    })
}

/// Tier implied by the node itself, ignoring ancestors.
fn intrinsic(obj: &ObjectRef, r: &dyn ArchiveReader, n: NodeId, kind: NodeKind) -> Result<AnimationType> {
    match kind {
        NodeKind::PolyMesh | NodeKind::SubD | NodeKind::Curves | NodeKind::NuPatch | NodeKind::Points => {
            let mut anim = match r.topology_variance(n)? {
                TopologyVariance::Heterogeneous => return Ok(AnimationType::TopologyVarying),
                TopologyVariance::Homogeneous => AnimationType::AttributeOnly,
                TopologyVariance::Constant => AnimationType::Constant,
            };

            if anim == AnimationType::Constant
                && (any_animated(obj, r, n, ChannelGroup::Arbitrary)?
                    || any_animated(obj, r, n, ChannelGroup::User)?)
            {
                anim = anim.raise(AnimationType::AttributeOnly);
            }

            // Point identity churn is a topology change even at fixed counts.
            if kind == NodeKind::Points
                && r.has_channel(n, ChannelGroup::Geometry, POINT_IDS)
                && !r.is_channel_constant(n, ChannelGroup::Geometry, POINT_IDS)?
            {
                anim = anim.raise(AnimationType::TopologyVarying);
            }
            Ok(anim)
        }
        NodeKind::Xform => {
            if r.has_channel(n, ChannelGroup::Object, LOCATOR) {
                return Ok(if r.is_channel_constant(n, ChannelGroup::Object, LOCATOR)? {
                    AnimationType::Constant
                } else {
                    AnimationType::AttributeOnly
                });
            }
            let constant = r.xform_info(n)?.map_or(true, |info| info.is_constant);
            Ok(if constant {
                AnimationType::Constant
            } else {
                AnimationType::TopologyVarying
            })
        }
        NodeKind::Camera | NodeKind::FaceSet | NodeKind::Light | NodeKind::Material | NodeKind::Unknown => {
            Ok(AnimationType::TopologyVarying)
        }
    }
}

fn any_animated(obj: &ObjectRef, r: &dyn ArchiveReader, n: NodeId, group: ChannelGroup) -> Result<bool> {
    for name in r.channel_names(n, group)? {
        obj.archive().poll_interrupt()?;
        if !r.is_channel_constant(n, group, &name)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// True if the world transform of `obj` changes over time.
///
/// Walks from the node (when it is a transform) or its parent up through
/// transform ancestors, stopping at the first one that does not inherit.
pub fn is_transform_animated(obj: &ObjectRef) -> Result<bool> {
    obj.read(|r, n| {
        let mut current = if r.node_kind(n)? == NodeKind::Xform {
            Some(n)
        } else {
            r.parent(n)?
        };
        while let Some(node) = current {
            obj.archive().poll_interrupt()?;
            if let Some(info) = r.xform_info(node)? {
                if !info.is_constant {
                    return Ok(true);
                }
                if info.num_samples > 0 && !r.read_xform_sample(node, 0)?.inherits {
                    return Ok(false);
                }
            }
            current = r.parent(node)?;
        }
        Ok(false)
    })
}
