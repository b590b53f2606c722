//! Time sampling types.
//!
//! Channels are sampled over time. A [`TimeSampling`] describes when each
//! stored sample was recorded and maps a continuous time back to the stored
//! samples that bracket it.

use crate::util::Chrono;

/// Tolerance used when a uniform time lands a hair below an exact sample.
const UNIFORM_SNAP: f64 = 1e-9;

/// Type of time sampling.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TimeSamplingType {
    /// Single static sample at time 0 (identity sampling).
    #[default]
    Identity,

    /// Uniform sampling: samples at regular intervals.
    /// start_time + index * time_per_cycle
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },

    /// Cyclic sampling: repeating pattern of sample times.
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },

    /// Acyclic sampling: explicit time for each sample.
    Acyclic { times: Vec<Chrono> },
}

impl TimeSamplingType {
    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    #[inline]
    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform { .. })
    }

    #[inline]
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::Cyclic { .. })
    }

    #[inline]
    pub fn is_acyclic(&self) -> bool {
        matches!(self, Self::Acyclic { .. })
    }

    /// Get the number of samples per cycle (1 for uniform/identity).
    pub fn samples_per_cycle(&self) -> usize {
        match self {
            Self::Identity | Self::Uniform { .. } => 1,
            Self::Cyclic { times, .. } | Self::Acyclic { times } => times.len(),
        }
    }
}

/// Time sampling information for a channel.
///
/// Owned by the archive and handed out behind an `Arc`; consumers never copy it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSampling {
    pub sampling_type: TimeSamplingType,
}

impl TimeSampling {
    /// Identity time sampling (single sample at time 0).
    pub const IDENTITY: Self = Self {
        sampling_type: TimeSamplingType::Identity,
    };

    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            },
        }
    }

    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        }
    }

    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            },
        }
    }

    /// Number of times physically stored by this sampling.
    ///
    /// Identity and uniform samplings store a single (start) time; cyclic and
    /// acyclic store one time per entry. A sampling reporting 0 here carries no
    /// usable timing and is treated as static by [`ChannelCache`].
    ///
    /// [`ChannelCache`]: crate::cache::ChannelCache
    pub fn num_stored_times(&self) -> usize {
        self.sampling_type.samples_per_cycle()
    }

    /// Number of samples the floor/ceil searches may address.
    /// Acyclic samplings cannot address past their last stored time.
    fn addressable(&self, num_samples: usize) -> usize {
        match &self.sampling_type {
            TimeSamplingType::Acyclic { times } => num_samples.min(times.len()),
            TimeSamplingType::Cyclic { times, .. } if times.is_empty() => 0,
            _ => num_samples,
        }
    }

    /// Get the time for a specific sample index.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Identity => 0.0,
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => *start_time + (index as Chrono) * *time_per_cycle,
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => {
                if times.is_empty() {
                    return 0.0;
                }
                let cycle = index / times.len();
                let local_idx = index % times.len();
                times[local_idx] + (cycle as Chrono) * *time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => times.get(index).copied().unwrap_or(0.0),
        }
    }

    /// Time of the first and last addressable sample.
    pub fn time_range(&self, num_samples: usize) -> (Chrono, Chrono) {
        let n = self.addressable(num_samples);
        if n == 0 {
            return (0.0, 0.0);
        }
        (self.sample_time(0), self.sample_time(n - 1))
    }

    /// Find the floor index (largest index with time <= given time).
    /// Times before the first sample clamp to index 0.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        let n = self.addressable(num_samples);
        if n == 0 {
            return (0, 0.0);
        }

        match &self.sampling_type {
            TimeSamplingType::Identity => (0, 0.0),
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => {
                if time <= *start_time || *time_per_cycle <= 0.0 {
                    return (0, *start_time);
                }
                let raw = (time - start_time) / time_per_cycle;
                let nearest = raw.round();
                let steps = if (raw - nearest).abs() < UNIFORM_SNAP {
                    nearest
                } else {
                    raw.floor()
                };
                let idx = (steps as usize).min(n - 1);
                (idx, self.sample_time(idx))
            }
            TimeSamplingType::Cyclic { .. } | TimeSamplingType::Acyclic { .. } => {
                // Binary search for floor
                let mut lo = 0;
                let mut hi = n;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if self.sample_time(mid) <= time {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                let idx = lo.saturating_sub(1);
                (idx, self.sample_time(idx))
            }
        }
    }

    /// Find the ceiling index (smallest index with time >= given time).
    /// Times after the last sample clamp to the last index.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        let n = self.addressable(num_samples);
        if n == 0 {
            return (0, 0.0);
        }

        let (floor_idx, floor_time) = self.floor_index(time, n);
        if floor_time >= time {
            return (floor_idx, floor_time);
        }

        let ceil_idx = (floor_idx + 1).min(n - 1);
        (ceil_idx, self.sample_time(ceil_idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sampling() {
        let ts = TimeSampling::uniform(1.0 / 24.0, 0.0); // 24 fps

        assert_eq!(ts.sample_time(0), 0.0);
        assert!((ts.sample_time(24) - 1.0).abs() < 1e-10);
        assert!((ts.sample_time(48) - 2.0).abs() < 1e-10);
        assert_eq!(ts.num_stored_times(), 1);
    }

    #[test]
    fn test_acyclic_sampling() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]);

        assert_eq!(ts.sample_time(1), 0.5);
        assert_eq!(ts.sample_time(3), 2.0);
        assert_eq!(ts.num_stored_times(), 4);
        assert_eq!(ts.time_range(4), (0.0, 2.0));
    }

    #[test]
    fn test_floor_index() {
        let ts = TimeSampling::uniform(1.0, 0.0);

        assert_eq!(ts.floor_index(0.5, 10).0, 0);
        assert_eq!(ts.floor_index(1.5, 10).0, 1);
        assert_eq!(ts.floor_index(5.0, 10).0, 5);
        assert_eq!(ts.floor_index(-3.0, 10).0, 0);
        assert_eq!(ts.floor_index(42.0, 10).0, 9);
    }

    #[test]
    fn test_uniform_floor_snaps_rounding_error() {
        let ts = TimeSampling::uniform(0.1, 0.0);
        // 0.3 / 0.1 is 2.9999999999999996 in binary floating point
        assert_eq!(ts.floor_index(0.3, 10).0, 3);
    }

    #[test]
    fn test_ceil_index() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0]);

        assert_eq!(ts.ceil_index(0.25, 3), (1, 0.5));
        assert_eq!(ts.ceil_index(0.5, 3), (1, 0.5));
        assert_eq!(ts.ceil_index(7.0, 3), (2, 1.0));
        assert_eq!(ts.ceil_index(-1.0, 3), (0, 0.0));
    }

    #[test]
    fn test_cyclic_sampling() {
        let ts = TimeSampling::cyclic(1.0, vec![0.0, 0.25]);

        assert_eq!(ts.sample_time(2), 1.0);
        assert_eq!(ts.sample_time(3), 1.25);
        assert_eq!(ts.floor_index(1.1, 6), (2, 1.0));
        assert_eq!(ts.ceil_index(1.1, 6), (3, 1.25));
    }

    #[test]
    fn test_acyclic_never_addresses_past_stored_times() {
        let ts = TimeSampling::acyclic(vec![0.0, 1.0]);
        assert_eq!(ts.floor_index(5.0, 10), (1, 1.0));
        assert_eq!(ts.ceil_index(5.0, 10), (1, 1.0));
        assert_eq!(TimeSampling::acyclic(vec![]).floor_index(1.0, 3), (0, 0.0));
    }
}
