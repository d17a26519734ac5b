//! Tagged payload values
//!
//! A `Variant` is one of three shapes:
//! - a typed scalar (null, bool, char, signed/unsigned integers, floats,
//!   string, byte sequence)
//! - an ordered sequence of variants
//! - an ordered map whose keys and values are both variants
//!
//! The graph and dispatch layers move variants around without interpreting
//! them; only element delegates and the standard management services look
//! inside. Serde derives let transport adapters pick their own encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload value for data elements, service invocations, and notifications
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Variant>),
    Map(Vec<(Variant, Variant)>),
}

/// Shape tag of a variant, used by format descriptors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    Null,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    Bytes,
    Seq,
    Map,
}

impl VariantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariantKind::Null => "null",
            VariantKind::Bool => "bool",
            VariantKind::Char => "char",
            VariantKind::I8 => "i8",
            VariantKind::I16 => "i16",
            VariantKind::I32 => "i32",
            VariantKind::I64 => "i64",
            VariantKind::U8 => "u8",
            VariantKind::U16 => "u16",
            VariantKind::U32 => "u32",
            VariantKind::U64 => "u64",
            VariantKind::F32 => "f32",
            VariantKind::F64 => "f64",
            VariantKind::Str => "str",
            VariantKind::Bytes => "bytes",
            VariantKind::Seq => "seq",
            VariantKind::Map => "map",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Variant {
    /// Build a map variant from string keys
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Variant)>,
    {
        Variant::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Variant::Str(k.into()), v))
                .collect(),
        )
    }

    /// Build a sequence variant
    pub fn seq<I: IntoIterator<Item = Variant>>(items: I) -> Self {
        Variant::Seq(items.into_iter().collect())
    }

    pub fn kind(&self) -> VariantKind {
        match self {
            Variant::Null => VariantKind::Null,
            Variant::Bool(_) => VariantKind::Bool,
            Variant::Char(_) => VariantKind::Char,
            Variant::I8(_) => VariantKind::I8,
            Variant::I16(_) => VariantKind::I16,
            Variant::I32(_) => VariantKind::I32,
            Variant::I64(_) => VariantKind::I64,
            Variant::U8(_) => VariantKind::U8,
            Variant::U16(_) => VariantKind::U16,
            Variant::U32(_) => VariantKind::U32,
            Variant::U64(_) => VariantKind::U64,
            Variant::F32(_) => VariantKind::F32,
            Variant::F64(_) => VariantKind::F64,
            Variant::Str(_) => VariantKind::Str,
            Variant::Bytes(_) => VariantKind::Bytes,
            Variant::Seq(_) => VariantKind::Seq,
            Variant::Map(_) => VariantKind::Map,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widening conversion of any integer scalar that fits in i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::I8(v) => Some(*v as i64),
            Variant::I16(v) => Some(*v as i64),
            Variant::I32(v) => Some(*v as i64),
            Variant::I64(v) => Some(*v),
            Variant::U8(v) => Some(*v as i64),
            Variant::U16(v) => Some(*v as i64),
            Variant::U32(v) => Some(*v as i64),
            Variant::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Widening conversion of any non-negative integer scalar
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Variant::U8(v) => Some(*v as u64),
            Variant::U16(v) => Some(*v as u64),
            Variant::U32(v) => Some(*v as u64),
            Variant::U64(v) => Some(*v),
            Variant::I8(v) => u64::try_from(*v).ok(),
            Variant::I16(v) => u64::try_from(*v).ok(),
            Variant::I32(v) => u64::try_from(*v).ok(),
            Variant::I64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Numeric view of any integer or float scalar
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::F32(v) => Some(*v as f64),
            Variant::F64(v) => Some(*v),
            Variant::U64(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Variant::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Variant]> {
        match self {
            Variant::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Variant, Variant)]> {
        match self {
            Variant::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a string key in a map variant; first match wins
    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.as_map()?.iter().find_map(|(k, v)| match k {
            Variant::Str(s) if s == key => Some(v),
            _ => None,
        })
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => f.write_str("null"),
            Variant::Bool(v) => write!(f, "{}", v),
            Variant::Char(v) => write!(f, "{}", v),
            Variant::I8(v) => write!(f, "{}", v),
            Variant::I16(v) => write!(f, "{}", v),
            Variant::I32(v) => write!(f, "{}", v),
            Variant::I64(v) => write!(f, "{}", v),
            Variant::U8(v) => write!(f, "{}", v),
            Variant::U16(v) => write!(f, "{}", v),
            Variant::U32(v) => write!(f, "{}", v),
            Variant::U64(v) => write!(f, "{}", v),
            Variant::F32(v) => write!(f, "{}", v),
            Variant::F64(v) => write!(f, "{}", v),
            Variant::Str(v) => f.write_str(v),
            Variant::Bytes(v) => write!(f, "bytes[{}]", v.len()),
            Variant::Seq(v) => write!(f, "seq[{}]", v.len()),
            Variant::Map(v) => write!(f, "map[{}]", v.len()),
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<char> for Variant {
    fn from(v: char) -> Self {
        Variant::Char(v)
    }
}

impl From<i8> for Variant {
    fn from(v: i8) -> Self {
        Variant::I8(v)
    }
}

impl From<i16> for Variant {
    fn from(v: i16) -> Self {
        Variant::I16(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::I32(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::I64(v)
    }
}

impl From<u8> for Variant {
    fn from(v: u8) -> Self {
        Variant::U8(v)
    }
}

impl From<u16> for Variant {
    fn from(v: u16) -> Self {
        Variant::U16(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Variant::U32(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::U64(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::F32(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::F64(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

impl From<Vec<u8>> for Variant {
    fn from(v: Vec<u8>) -> Self {
        Variant::Bytes(v)
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(v: Vec<Variant>) -> Self {
        Variant::Seq(v)
    }
}
