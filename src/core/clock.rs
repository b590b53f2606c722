//! SampleClock - maps a continuous time onto bracketing stored samples.

use super::{SampleBracket, TimeSampling};
use crate::util::Chrono;

/// Default tolerance for treating a time as an exact sample hit.
///
/// Times within this distance of the floor sample resolve to that sample, and
/// blend factors within this distance of 1 snap to the ceil sample. The value
/// is absolute, not relative to the sampling interval.
pub const TIME_BIAS: f64 = 1e-4;

/// Resolves query times against a channel's time sampling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleClock {
    epsilon: f64,
}

impl Default for SampleClock {
    fn default() -> Self {
        Self { epsilon: TIME_BIAS }
    }
}

impl SampleClock {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.abs(),
        }
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Bracket `t` between two stored samples.
    ///
    /// A missing sampling is treated as zero samples. With zero or one sample the
    /// result is always `(0, 0, 0)`; callers must treat zero samples as "use the
    /// default value".
    pub fn resolve(
        &self,
        t: Chrono,
        sampling: Option<&TimeSampling>,
        num_samples: usize,
    ) -> SampleBracket {
        let Some(ts) = sampling else {
            return SampleBracket::exact(0);
        };
        if num_samples <= 1 {
            return SampleBracket::exact(0);
        }

        let (i0, t0) = ts.floor_index(t, num_samples);
        let (i1, t1) = ts.ceil_index(t, num_samples);

        if i0 == i1 || (t - t0).abs() < self.epsilon {
            return SampleBracket::exact(i0);
        }

        let span = t1 - t0;
        if span <= 0.0 {
            return SampleBracket::exact(i0);
        }

        let bias = (t - t0) / span;
        if (1.0 - bias).abs() < self.epsilon {
            return SampleBracket::exact(i1);
        }
        // Floor/ceil guarantee t0 < t < t1 here, so bias is in (0, 1).
        SampleBracket::between(i0, i1, bias.clamp(0.0, 1.0))
    }
}

/// [`SampleClock::resolve`] with the default tolerance.
#[inline]
pub fn resolve(t: Chrono, sampling: Option<&TimeSampling>, num_samples: usize) -> SampleBracket {
    SampleClock::default().resolve(t, sampling, num_samples)
}
