//! Plain Old Data types and the storage classes samples are resolved into.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Plain Old Data type enum - the element type a channel was recorded with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlainOldDataType {
    Boolean = 0,
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    /// 16-bit floating point (IEEE 754 half precision)
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    String = 12,
    /// Wide string (held as UTF-8)
    Wstring = 13,
    #[default]
    Unknown = 127,
}

impl PlainOldDataType {
    /// Size in bytes of one element as recorded in the archive.
    /// Strings have no fixed size and report 0.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Boolean | Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 | Self::Float16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
            Self::String | Self::Wstring | Self::Unknown => 0,
        }
    }

    /// Canonical Alembic name of this type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool_t",
            Self::Uint8 => "uint8_t",
            Self::Int8 => "int8_t",
            Self::Uint16 => "uint16_t",
            Self::Int16 => "int16_t",
            Self::Uint32 => "uint32_t",
            Self::Int32 => "int32_t",
            Self::Uint64 => "uint64_t",
            Self::Int64 => "int64_t",
            Self::Float16 => "float16_t",
            Self::Float32 => "float32_t",
            Self::Float64 => "float64_t",
            Self::String => "string",
            Self::Wstring => "wstring",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse from either the canonical name (`float32_t`) or the short
    /// spelling used in scene descriptions (`float32`, `float`, `int`).
    pub fn from_name(name: &str) -> Self {
        let short = name.strip_suffix("_t").unwrap_or(name);
        match short {
            "bool" | "boolean" => Self::Boolean,
            "uint8" | "uchar" => Self::Uint8,
            "int8" | "char" => Self::Int8,
            "uint16" => Self::Uint16,
            "int16" => Self::Int16,
            "uint32" | "uint" => Self::Uint32,
            "int32" | "int" => Self::Int32,
            "uint64" => Self::Uint64,
            "int64" => Self::Int64,
            "float16" | "half" => Self::Float16,
            "float32" | "float" => Self::Float32,
            "float64" | "double" => Self::Float64,
            "string" => Self::String,
            "wstring" => Self::Wstring,
            _ => Self::Unknown,
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Uint8
                | Self::Int8
                | Self::Uint16
                | Self::Int16
                | Self::Uint32
                | Self::Int32
                | Self::Uint64
                | Self::Int64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::Wstring)
    }

    /// Storage class a sample of this type is resolved into.
    pub const fn storage_kind(self) -> StorageKind {
        if self.is_float() {
            StorageKind::Real
        } else if self.is_string() {
            StorageKind::String
        } else if self.is_integer() {
            StorageKind::Integer
        } else {
            StorageKind::Invalid
        }
    }

    /// In-memory type a recorded element is widened to when read.
    ///
    /// Small signed/unsigned integers are promoted to `Int32`, 32/64-bit
    /// unsigned integers to `Int64`; booleans stay byte-sized.
    pub const fn promoted(self) -> Self {
        match self {
            Self::Boolean | Self::Uint8 => Self::Uint8,
            Self::Int8 | Self::Uint16 | Self::Int16 | Self::Int32 => Self::Int32,
            Self::Uint32 | Self::Uint64 | Self::Int64 => Self::Int64,
            Self::Wstring => Self::String,
            other => other,
        }
    }
}

impl fmt::Display for PlainOldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for PlainOldDataType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for PlainOldDataType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(d)?;
        match Self::from_name(&name) {
            Self::Unknown => Err(serde::de::Error::custom(format!("unknown POD type '{name}'"))),
            pod => Ok(pod),
        }
    }
}

/// Storage class of a resolved sample. Only `Real` samples are ever blended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Integer,
    Real,
    String,
    Invalid,
}

impl StorageKind {
    #[inline]
    pub const fn is_blendable(self) -> bool {
        matches!(self, Self::Real)
    }
}
