//! Raw samples - one time slice of a channel, read fresh from the archive.

use crate::util::{DMat4, DVec3, DataType, Error, PlainOldDataType, Result, StorageKind};
use half::f16;

/// Typed storage of a raw sample.
///
/// Recorded integers are widened on read (see [`PlainOldDataType::promoted`]),
/// so only a handful of in-memory layouts exist.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleData {
    Uint8(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float16(Vec<f16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<String>),
    /// Affine transforms, one per entry.
    Matrix(Vec<DMat4>),
}

impl SampleData {
    /// Number of scalar values (matrices count once each).
    pub fn len(&self) -> usize {
        match self {
            Self::Uint8(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float16(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Matrix(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self {
            Self::Uint8(_) | Self::Int32(_) | Self::Int64(_) => StorageKind::Integer,
            Self::Float16(_) | Self::Float32(_) | Self::Float64(_) | Self::Matrix(_) => {
                StorageKind::Real
            }
            Self::String(_) => StorageKind::String,
        }
    }

    /// Same variant, ignoring contents.
    fn same_layout(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Byte view of numeric storage. `None` for strings.
    fn as_bytes(&self) -> Option<&[u8]> {
        Some(match self {
            Self::Uint8(v) => v.as_slice(),
            Self::Int32(v) => bytemuck::cast_slice(v),
            Self::Int64(v) => bytemuck::cast_slice(v),
            Self::Float16(v) => bytemuck::cast_slice(v),
            Self::Float32(v) => bytemuck::cast_slice(v),
            Self::Float64(v) => bytemuck::cast_slice(v),
            Self::Matrix(v) => bytemuck::cast_slice(v),
            Self::String(_) => return None,
        })
    }
}

/// One sample of a channel: typed values, tuple size and the constancy of the
/// channel it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSample {
    pub data: SampleData,
    /// Values per entry (3 for a point, 1 for scalars and matrices).
    pub extent: usize,
    /// Element type as recorded, before promotion.
    pub pod: PlainOldDataType,
    /// Inherited from the source channel.
    pub is_constant: bool,
}

impl RawSample {
    pub fn new(data: SampleData, extent: usize, pod: PlainOldDataType) -> Self {
        Self {
            data,
            extent: extent.max(1),
            pod,
            is_constant: false,
        }
    }

    pub fn from_f32(values: Vec<f32>, extent: usize) -> Self {
        Self::new(SampleData::Float32(values), extent, PlainOldDataType::Float32)
    }

    pub fn from_f64(values: Vec<f64>, extent: usize) -> Self {
        Self::new(SampleData::Float64(values), extent, PlainOldDataType::Float64)
    }

    pub fn from_f16(values: Vec<f16>, extent: usize) -> Self {
        Self::new(SampleData::Float16(values), extent, PlainOldDataType::Float16)
    }

    pub fn from_i32(values: Vec<i32>, extent: usize) -> Self {
        Self::new(SampleData::Int32(values), extent, PlainOldDataType::Int32)
    }

    pub fn from_bools(values: &[bool]) -> Self {
        let bytes = values.iter().map(|&b| b as u8).collect();
        Self::new(SampleData::Uint8(bytes), 1, PlainOldDataType::Boolean)
    }

    pub fn from_strings(values: Vec<String>) -> Self {
        Self::new(SampleData::String(values), 1, PlainOldDataType::String)
    }

    pub fn from_matrices(values: Vec<DMat4>) -> Self {
        Self::new(SampleData::Matrix(values), 1, PlainOldDataType::Float64)
    }

    pub fn from_points(points: &[DVec3]) -> Self {
        let flat = points
            .iter()
            .flat_map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect();
        Self::from_f32(flat, 3)
    }

    /// Decode recorded little-endian bytes into promoted storage.
    pub fn from_pod_bytes(pod: PlainOldDataType, extent: usize, bytes: &[u8]) -> Result<Self> {
        let size = pod.num_bytes();
        if size == 0 {
            return Err(Error::ShapeMismatch {
                expected: "fixed-size POD".into(),
                actual: pod.name().into(),
            });
        }
        if bytes.len() % size != 0 {
            return Err(Error::ShapeMismatch {
                expected: format!("multiple of {size} bytes"),
                actual: format!("{} bytes", bytes.len()),
            });
        }

        use PlainOldDataType as P;
        let data = match pod {
            P::Boolean | P::Uint8 => SampleData::Uint8(bytes.to_vec()),
            P::Int8 => SampleData::Int32(bytes.iter().map(|&b| b as i8 as i32).collect()),
            P::Uint16 => SampleData::Int32(
                bytemuck::pod_collect_to_vec::<u8, u16>(bytes)
                    .into_iter()
                    .map(i32::from)
                    .collect(),
            ),
            P::Int16 => SampleData::Int32(
                bytemuck::pod_collect_to_vec::<u8, i16>(bytes)
                    .into_iter()
                    .map(i32::from)
                    .collect(),
            ),
            P::Int32 => SampleData::Int32(bytemuck::pod_collect_to_vec(bytes)),
            P::Uint32 => SampleData::Int64(
                bytemuck::pod_collect_to_vec::<u8, u32>(bytes)
                    .into_iter()
                    .map(i64::from)
                    .collect(),
            ),
            P::Uint64 => SampleData::Int64(
                bytemuck::pod_collect_to_vec::<u8, u64>(bytes)
                    .into_iter()
                    .map(|v| v as i64)
                    .collect(),
            ),
            P::Int64 => SampleData::Int64(bytemuck::pod_collect_to_vec(bytes)),
            P::Float16 => SampleData::Float16(bytemuck::pod_collect_to_vec(bytes)),
            P::Float32 => SampleData::Float32(bytemuck::pod_collect_to_vec(bytes)),
            P::Float64 => SampleData::Float64(bytemuck::pod_collect_to_vec(bytes)),
            P::String | P::Wstring | P::Unknown => {
                return Err(Error::ShapeMismatch {
                    expected: "fixed-size POD".into(),
                    actual: pod.name().into(),
                })
            }
        };
        Ok(Self::new(data, extent, pod))
    }

    pub fn with_constant(mut self, is_constant: bool) -> Self {
        self.is_constant = is_constant;
        self
    }

    /// Number of tuples.
    pub fn num_entries(&self) -> usize {
        self.data.len() / self.extent
    }

    #[inline]
    pub fn storage_kind(&self) -> StorageKind {
        self.data.storage_kind()
    }

    pub fn data_type(&self) -> DataType {
        match self.data {
            SampleData::Matrix(_) => DataType::MAT44D,
            _ => DataType::new(self.pod, self.extent.min(u8::MAX as usize) as u8),
        }
    }

    /// Same storage layout, tuple size and entry count.
    pub fn is_shape_compatible(&self, other: &Self) -> bool {
        self.data.same_layout(&other.data)
            && self.extent == other.extent
            && self.data.len() == other.data.len()
    }

    /// Bit-exact content equality. Used to detect channels whose samples never
    /// change even though several were written.
    pub fn content_eq(&self, other: &Self) -> bool {
        if !self.is_shape_compatible(other) {
            return false;
        }
        match (&self.data, &other.data) {
            (SampleData::String(a), SampleData::String(b)) => a == b,
            (a, b) => a.as_bytes() == b.as_bytes(),
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            SampleData::Float32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            SampleData::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_matrices(&self) -> Option<&[DMat4]> {
        match &self.data {
            SampleData::Matrix(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.data {
            SampleData::String(v) => Some(v),
            _ => None,
        }
    }

    /// All numeric values widened to f64. Empty for strings and matrices.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            SampleData::Uint8(v) => v.iter().map(|&x| x as f64).collect(),
            SampleData::Int32(v) => v.iter().map(|&x| x as f64).collect(),
            SampleData::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            SampleData::Float16(v) => v.iter().map(|x| x.to_f64()).collect(),
            SampleData::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            SampleData::Float64(v) => v.clone(),
            SampleData::String(_) | SampleData::Matrix(_) => Vec::new(),
        }
    }

    /// Integer values widened to i64. `None` for non-integer storage.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match &self.data {
            SampleData::Uint8(v) => Some(v.iter().map(|&x| x as i64).collect()),
            SampleData::Int32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            SampleData::Int64(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Interpret a real sample with extent 3 as points.
    pub fn to_points(&self) -> Option<Vec<DVec3>> {
        if self.extent != 3 || self.storage_kind() != StorageKind::Real {
            return None;
        }
        let flat = self.to_f64_vec();
        if flat.is_empty() && !self.data.is_empty() {
            return None;
        }
        Some(
            flat.chunks_exact(3)
                .map(|c| DVec3::new(c[0], c[1], c[2]))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_and_kind() {
        let s = RawSample::from_f32(vec![0.0; 9], 3);
        assert_eq!(s.num_entries(), 3);
        assert_eq!(s.storage_kind(), StorageKind::Real);
        assert_eq!(s.data_type(), DataType::VEC3F);

        let m = RawSample::from_matrices(vec![DMat4::IDENTITY]);
        assert_eq!(m.num_entries(), 1);
        assert_eq!(m.data_type(), DataType::MAT44D);
    }

    #[test]
    fn test_from_pod_bytes_promotes() {
        let s = RawSample::from_pod_bytes(PlainOldDataType::Int8, 1, &[0xff, 0x01]).unwrap();
        assert_eq!(s.as_i32(), Some(&[-1, 1][..]));
        assert_eq!(s.pod, PlainOldDataType::Int8);

        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|f| f.to_le_bytes()).collect();
        let s = RawSample::from_pod_bytes(PlainOldDataType::Float32, 2, &bytes).unwrap();
        assert_eq!(s.as_f32(), Some(&[1.5, -2.0][..]));
        assert_eq!(s.num_entries(), 1);

        let s = RawSample::from_pod_bytes(PlainOldDataType::Uint32, 1, &u32::MAX.to_le_bytes()).unwrap();
        assert_eq!(s.to_i64_vec(), Some(vec![u32::MAX as i64]));
    }

    #[test]
    fn test_from_pod_bytes_rejects_ragged() {
        assert!(RawSample::from_pod_bytes(PlainOldDataType::Float32, 1, &[0, 0, 0]).is_err());
        assert!(RawSample::from_pod_bytes(PlainOldDataType::String, 1, b"abc").is_err());
    }

    #[test]
    fn test_shape_and_content() {
        let a = RawSample::from_f32(vec![1.0, 2.0], 1);
        let b = RawSample::from_f32(vec![1.0, 2.0], 1).with_constant(true);
        let c = RawSample::from_f32(vec![1.0, 2.5], 1);
        let d = RawSample::from_f64(vec![1.0, 2.0], 1);

        assert!(a.content_eq(&b));
        assert!(!a.content_eq(&c));
        assert!(a.is_shape_compatible(&c));
        assert!(!a.is_shape_compatible(&d));
        assert!(!a.is_shape_compatible(&RawSample::from_f32(vec![1.0, 2.0], 2)));
    }

    #[test]
    fn test_points() {
        let s = RawSample::from_points(&[DVec3::X, DVec3::Y]);
        assert_eq!(s.to_points(), Some(vec![DVec3::X, DVec3::Y]));
        assert!(RawSample::from_f32(vec![0.0; 4], 2).to_points().is_none());
    }
}
