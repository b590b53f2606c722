//! ChannelCache - time-indexed lookup into one pre-fetched channel.
//!
//! Each entry of the held sample is one time sample of the source channel.
//! Lookups resolve a time to an entry through [`SampleClock`] and return the
//! entry itself; discrete data is never interpolated.

use std::sync::Arc;

use crate::core::{RawSample, SampleClock, SampleData, TimeSampling};
use crate::util::{Chrono, StorageKind};

#[derive(Clone, Debug)]
pub struct ChannelCache {
    data: Arc<RawSample>,
    time: Option<Arc<TimeSampling>>,
    clock: SampleClock,
}

impl ChannelCache {
    /// A sampling with no stored times carries no timing; the channel is
    /// then treated as static.
    pub fn new(data: Arc<RawSample>, time: Option<Arc<TimeSampling>>) -> Self {
        let time = time.filter(|ts| ts.num_stored_times() > 0);
        Self {
            data,
            time,
            clock: SampleClock::default(),
        }
    }

    pub fn with_clock(mut self, clock: SampleClock) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    pub fn valid(&self) -> bool {
        !self.data.data.is_empty()
    }

    #[inline]
    pub fn animated(&self) -> bool {
        self.time.is_some()
    }

    pub fn time(&self) -> Option<&Arc<TimeSampling>> {
        self.time.as_ref()
    }

    pub fn data(&self) -> &Arc<RawSample> {
        &self.data
    }

    pub fn tuple_size(&self) -> usize {
        self.data.extent
    }

    /// Number of time samples held.
    pub fn sample_count(&self) -> usize {
        self.data.num_entries()
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.data.storage_kind()
    }

    /// Entry for time `t` plus the fraction towards the next entry.
    pub fn sample_at(&self, t: Chrono) -> (usize, f64) {
        let bracket = self.clock.resolve(t, self.time.as_deref(), self.sample_count());
        (bracket.i0, bracket.bias)
    }

    /// Entry for time `t`.
    #[inline]
    pub fn index_at(&self, t: Chrono) -> usize {
        self.sample_at(t).0
    }

    /// First component of entry `index` as an integer.
    pub fn i64_at_index(&self, index: usize) -> Option<i64> {
        let i = index * self.data.extent;
        match &self.data.data {
            SampleData::Uint8(v) => v.get(i).map(|&x| x as i64),
            SampleData::Int32(v) => v.get(i).map(|&x| x as i64),
            SampleData::Int64(v) => v.get(i).copied(),
            SampleData::Float16(v) => v.get(i).map(|x| x.to_f64() as i64),
            SampleData::Float32(v) => v.get(i).map(|&x| x as i64),
            SampleData::Float64(v) => v.get(i).map(|&x| x as i64),
            SampleData::String(_) | SampleData::Matrix(_) => None,
        }
    }

    /// First component of the entry for time `t` as an integer.
    pub fn i64_at(&self, t: Chrono) -> Option<i64> {
        self.i64_at_index(self.index_at(t))
    }
}
