//! Object visibility.
//!
//! Objects may carry a `visible` channel holding one of:
//! - Deferred (-1): inherit from parent
//! - Hidden (0)
//! - Visible (1)
//!
//! [`VisibilityCache`] resolves that channel once and then answers per-time
//! lookups through a [`ChannelCache`] when the value is animated.

use std::sync::Arc;

use crate::cache::ChannelCache;
use crate::core::{ChannelGroup, RawSample, SampleClock};
use crate::scene::ObjectRef;
use crate::util::{Chrono, Result};

/// Visibility channel name.
pub const VISIBILITY_PROPERTY_NAME: &str = "visible";

/// Object visibility state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ObjectVisibility {
    /// Walk up the hierarchy to find an explicit value. The root is visible.
    #[default]
    Deferred = -1,
    Hidden = 0,
    Visible = 1,
}

impl ObjectVisibility {
    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Self::Hidden,
            1 => Self::Visible,
            _ => Self::Deferred,
        }
    }

    pub fn is_deferred(self) -> bool {
        matches!(self, Self::Deferred)
    }

    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden)
    }
}

/// Resolved visibility of one object, static or animated.
#[derive(Clone, Debug, Default)]
pub struct VisibilityCache {
    visible: ObjectVisibility,
    cache: Option<ChannelCache>,
}

impl VisibilityCache {
    pub fn new(visible: ObjectVisibility, cache: Option<ChannelCache>) -> Self {
        Self { visible, cache }
    }

    /// Static value.
    pub fn fixed(visible: ObjectVisibility) -> Self {
        Self::new(visible, None)
    }

    pub fn set(&mut self, visible: ObjectVisibility, cache: Option<ChannelCache>) {
        self.visible = visible;
        self.cache = cache;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True once an explicit value is known.
    pub fn valid(&self) -> bool {
        !self.visible.is_deferred()
    }

    pub fn animated(&self) -> bool {
        self.cache.is_some()
    }

    /// Anything but explicitly hidden counts as visible.
    pub fn visible(&self) -> bool {
        !self.visible.is_hidden()
    }

    pub fn value(&self) -> ObjectVisibility {
        self.visible
    }

    pub fn cache(&self) -> Option<&ChannelCache> {
        self.cache.as_ref()
    }

    /// Refresh an animated value for time `t`. Non-zero samples are visible.
    pub fn update(&mut self, t: Chrono) {
        if let Some(cache) = &self.cache {
            self.visible = match cache.i64_at(t) {
                Some(0) => ObjectVisibility::Hidden,
                _ => ObjectVisibility::Visible,
            };
        }
    }

    /// Resolve the visibility of `obj` at time `t`.
    ///
    /// Objects without their own channel, or whose channel is deferred
    /// throughout, take their parent's visibility. An animated channel whose
    /// samples are all equal collapses to a static value.
    pub fn resolve(obj: &ObjectRef, t: Chrono, clock: SampleClock) -> Result<Self> {
        let own = obj.read(|r, n| {
            let Ok(info) = r.channel_info(n, ChannelGroup::Object, VISIBILITY_PROPERTY_NAME) else {
                return Ok(None);
            };
            let mut values = Vec::with_capacity(info.num_samples);
            for i in 0..info.num_samples {
                obj.archive().poll_interrupt()?;
                let s = r.read_raw_sample(n, ChannelGroup::Object, VISIBILITY_PROPERTY_NAME, i)?;
                let v = s.to_i64_vec().and_then(|v| v.first().copied()).unwrap_or(-1);
                values.push(v);
            }
            Ok(Some((values, info.time_sampling)))
        })?;

        if let Some((values, time)) = own {
            if let Some(&first) = values.first() {
                if values.iter().all(|&v| v == first) {
                    let value = ObjectVisibility::from_i64(first);
                    if !value.is_deferred() {
                        return Ok(Self::fixed(value));
                    }
                } else {
                    let bits = values.iter().map(|&v| v as i32).collect();
                    let data = Arc::new(RawSample::from_i32(bits, 1));
                    let cache = ChannelCache::new(data, time).with_clock(clock);
                    let mut vis = Self::new(ObjectVisibility::Deferred, Some(cache));
                    vis.update(t);
                    return Ok(vis);
                }
            }
        }

        match obj.parent()? {
            Some(parent) => Self::resolve(&parent, t, clock),
            None => Ok(Self::fixed(ObjectVisibility::Visible)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NodeKind, TimeSampling};
    use crate::scene::{MemoryArchive, Session};

    fn vis(values: &[i32]) -> Vec<RawSample> {
        values.iter().map(|&v| RawSample::from_i32(vec![v], 1)).collect()
    }

    #[test]
    fn test_visibility_values() {
        assert_eq!(ObjectVisibility::from_i64(-1), ObjectVisibility::Deferred);
        assert_eq!(ObjectVisibility::from_i64(0), ObjectVisibility::Hidden);
        assert_eq!(ObjectVisibility::from_i64(1), ObjectVisibility::Visible);
        assert!(VisibilityCache::default().visible());
        assert!(!VisibilityCache::default().valid());
    }

    #[test]
    fn test_resolve_hierarchy() {
        let ts = Some(Arc::new(TimeSampling::uniform(1.0, 0.0)));
        let mut a = MemoryArchive::new("vis");
        let root_geo = a.add_node("/hidden", NodeKind::Xform).unwrap();
        a.add_node("/hidden/child", NodeKind::PolyMesh).unwrap();
        let blink = a.add_node("/blink", NodeKind::PolyMesh).unwrap();
        let steady = a.add_node("/steady", NodeKind::PolyMesh).unwrap();
        a.add_node("/plain", NodeKind::PolyMesh).unwrap();
        a.add_channel(root_geo, ChannelGroup::Object, "visible", None, vis(&[0])).unwrap();
        a.add_channel(blink, ChannelGroup::Object, "visible", ts.clone(), vis(&[1, 0, 1])).unwrap();
        a.add_channel(steady, ChannelGroup::Object, "visible", ts, vis(&[1, 1, 1])).unwrap();

        let session = Session::new();
        let archive = session.register(Arc::new(a));
        let clock = SampleClock::default();

        let child = archive.object("/hidden/child").unwrap();
        let v = VisibilityCache::resolve(&child, 0.0, clock).unwrap();
        assert!(!v.visible());
        assert!(!v.animated());

        let plain = archive.object("/plain").unwrap();
        assert!(VisibilityCache::resolve(&plain, 0.0, clock).unwrap().visible());

        let steady = archive.object("/steady").unwrap();
        assert!(!VisibilityCache::resolve(&steady, 0.0, clock).unwrap().animated());

        let blink = archive.object("/blink").unwrap();
        let mut v = VisibilityCache::resolve(&blink, 1.2, clock).unwrap();
        assert!(v.animated());
        assert!(!v.visible());
        v.update(2.0);
        assert!(v.visible());
    }
}
