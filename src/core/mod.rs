//! Core layer - time sampling, raw samples and the archive interface.
//!
//! This module provides:
//! - [`TimeSampling`] - When each stored sample of a channel was recorded
//! - [`SampleClock`] / [`SampleBracket`] - Continuous time to bracketing samples
//! - [`RawSample`] - One typed time slice of a channel
//! - [`ArchiveReader`] - Abstract reader the resolver and caches consume

mod time_sampling;
mod sample;
mod clock;
mod raw;
mod traits;

pub use time_sampling::{TimeSampling, TimeSamplingType};
pub use sample::{SampleBracket, TopologyVariance};
pub use clock::{resolve, SampleClock, TIME_BIAS};
pub use raw::{RawSample, SampleData};
pub use traits::{
    ArchiveReader, ChannelGroup, ChannelInfo, NodeId, NodeKind,
    CURVE_COUNTS, FACE_COUNTS, FACE_INDICES, LOCATOR, POINT_IDS, POSITIONS, SELF_BOUNDS,
    TOPOLOGY_CHANNELS,
};
