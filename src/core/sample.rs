//! Sample addressing types.

use std::fmt;

/// Bracketing samples for a continuous time.
///
/// `i0 <= i1` always holds, and `bias` is in `[0, 1)` whenever the two
/// indices differ. An exact hit has `i0 == i1` and `bias == 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleBracket {
    /// Floor sample index.
    pub i0: usize,
    /// Ceil sample index.
    pub i1: usize,
    /// Interpolation factor (0.0 = i0, 1.0 = i1).
    pub bias: f64,
}

impl SampleBracket {
    /// Bracket landing exactly on one sample (no interpolation needed).
    pub const fn exact(index: usize) -> Self {
        Self {
            i0: index,
            i1: index,
            bias: 0.0,
        }
    }

    pub(crate) const fn between(i0: usize, i1: usize, bias: f64) -> Self {
        Self { i0, i1, bias }
    }

    /// True if only `i0` needs to be read.
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.i0 == self.i1 || self.bias == 0.0
    }
}

/// Topology variance declared by a geometry node.
///
/// Ordered by how much of the node may change between samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TopologyVariance {
    /// Nothing changes between samples.
    #[default]
    Constant,
    /// Counts and indices are fixed, values change.
    Homogeneous,
    /// Counts and indices change between samples.
    Heterogeneous,
}

impl TopologyVariance {
    /// Parse from string (as used in scene descriptions).
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "constant" | "static" => Some(Self::Constant),
            "homogeneous" | "homogenous" => Some(Self::Homogeneous),
            "heterogeneous" | "heterogenous" => Some(Self::Heterogeneous),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Homogeneous => "homogeneous",
            Self::Heterogeneous => "heterogeneous",
        }
    }
}

impl fmt::Display for TopologyVariance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
