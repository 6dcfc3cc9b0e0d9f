//! Semantic field types and runtime field values

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Language-level type of a persistable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SemanticType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Text,
    Timestamp,
    Blob,
}

impl SemanticType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SemanticType::Int8 | SemanticType::Int16 | SemanticType::Int32 | SemanticType::Int64
        )
    }

    /// Types allowed for a primary key
    pub fn is_key_type(&self) -> bool {
        matches!(
            self,
            SemanticType::Int16 | SemanticType::Int32 | SemanticType::Int64
        )
    }

    /// Types allowed for a relation link field
    pub fn is_link_type(&self) -> bool {
        self.is_integer() || *self == SemanticType::Text
    }

    pub fn name(&self) -> &'static str {
        match self {
            SemanticType::Int8 => "int8",
            SemanticType::Int16 => "int16",
            SemanticType::Int32 => "int32",
            SemanticType::Int64 => "int64",
            SemanticType::Float32 => "float32",
            SemanticType::Float64 => "float64",
            SemanticType::Bool => "bool",
            SemanticType::Text => "text",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Blob => "blob",
        }
    }
}

impl Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A field value read from or written to an entity
///
/// Text, timestamp and blob carry an `Option` so that absent values survive
/// the trip through the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Text(Option<String>),
    Timestamp(Option<DateTime<Utc>>),
    Blob(Option<Vec<u8>>),
}

impl FieldValue {
    pub fn semantic(&self) -> SemanticType {
        match self {
            FieldValue::Int8(_) => SemanticType::Int8,
            FieldValue::Int16(_) => SemanticType::Int16,
            FieldValue::Int32(_) => SemanticType::Int32,
            FieldValue::Int64(_) => SemanticType::Int64,
            FieldValue::Float32(_) => SemanticType::Float32,
            FieldValue::Float64(_) => SemanticType::Float64,
            FieldValue::Bool(_) => SemanticType::Bool,
            FieldValue::Text(_) => SemanticType::Text,
            FieldValue::Timestamp(_) => SemanticType::Timestamp,
            FieldValue::Blob(_) => SemanticType::Blob,
        }
    }

    /// Integer view, for key and link values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int8(v) => Some(i64::from(*v)),
            FieldValue::Int16(v) => Some(i64::from(*v)),
            FieldValue::Int32(v) => Some(i64::from(*v)),
            FieldValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view; absent and empty text both yield `None`
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(Some(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A Rust type that can be stored in a column
pub trait FieldType: Sized + Send + Sync + 'static {
    const SEMANTIC: SemanticType;

    fn to_field(&self) -> FieldValue;

    /// `None` when the value is of another semantic type
    fn from_field(value: FieldValue) -> Option<Self>;
}

macro_rules! scalar_field_type {
    ($ty:ty, $variant:ident) => {
        impl FieldType for $ty {
            const SEMANTIC: SemanticType = SemanticType::$variant;

            fn to_field(&self) -> FieldValue {
                FieldValue::$variant(*self)
            }

            fn from_field(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

scalar_field_type!(i8, Int8);
scalar_field_type!(i16, Int16);
scalar_field_type!(i32, Int32);
scalar_field_type!(i64, Int64);
scalar_field_type!(f32, Float32);
scalar_field_type!(f64, Float64);
scalar_field_type!(bool, Bool);

impl FieldType for String {
    const SEMANTIC: SemanticType = SemanticType::Text;

    fn to_field(&self) -> FieldValue {
        FieldValue::Text(Some(self.clone()))
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(v) => Some(v.unwrap_or_default()),
            _ => None,
        }
    }
}

impl FieldType for Option<String> {
    const SEMANTIC: SemanticType = SemanticType::Text;

    fn to_field(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldType for Option<DateTime<Utc>> {
    const SEMANTIC: SemanticType = SemanticType::Timestamp;

    fn to_field(&self) -> FieldValue {
        FieldValue::Timestamp(*self)
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Timestamp(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldType for Vec<u8> {
    const SEMANTIC: SemanticType = SemanticType::Blob;

    fn to_field(&self) -> FieldValue {
        FieldValue::Blob(Some(self.clone()))
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Blob(v) => Some(v.unwrap_or_default()),
            _ => None,
        }
    }
}

impl FieldType for Option<Vec<u8>> {
    const SEMANTIC: SemanticType = SemanticType::Blob;

    fn to_field(&self) -> FieldValue {
        FieldValue::Blob(self.clone())
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Blob(v) => Some(v),
            _ => None,
        }
    }
}

/// Integer types usable as a primary key
pub trait PrimaryKey: FieldType + Copy + Eq + Hash + Debug + Display {
    fn to_i64(self) -> i64;

    /// `None` if the value does not fit the key width
    fn from_i64(value: i64) -> Option<Self>;

    /// Parse one token of a comma-joined key list
    fn parse_token(token: &str) -> Option<Self> {
        token.trim().parse::<i64>().ok().and_then(Self::from_i64)
    }
}

impl PrimaryKey for i16 {
    fn to_i64(self) -> i64 {
        i64::from(self)
    }

    fn from_i64(value: i64) -> Option<Self> {
        i16::try_from(value).ok()
    }
}

impl PrimaryKey for i32 {
    fn to_i64(self) -> i64 {
        i64::from(self)
    }

    fn from_i64(value: i64) -> Option<Self> {
        i32::try_from(value).ok()
    }
}

impl PrimaryKey for i64 {
    fn to_i64(self) -> i64 {
        self
    }

    fn from_i64(value: i64) -> Option<Self> {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_types_allow_list() {
        assert!(SemanticType::Int16.is_key_type());
        assert!(SemanticType::Int32.is_key_type());
        assert!(SemanticType::Int64.is_key_type());
        assert!(!SemanticType::Int8.is_key_type());
        assert!(!SemanticType::Text.is_key_type());
        assert!(!SemanticType::Float64.is_key_type());
    }

    #[test]
    fn test_link_types() {
        assert!(SemanticType::Int8.is_link_type());
        assert!(SemanticType::Text.is_link_type());
        assert!(!SemanticType::Bool.is_link_type());
        assert!(!SemanticType::Timestamp.is_link_type());
    }

    #[test]
    fn test_non_optional_text_reads_absent_as_empty() {
        assert_eq!(
            String::from_field(FieldValue::Text(None)),
            Some(String::new())
        );
        assert_eq!(
            Option::<String>::from_field(FieldValue::Text(None)),
            Some(None)
        );
    }

    #[test]
    fn test_from_field_rejects_other_variants() {
        assert_eq!(i32::from_field(FieldValue::Int64(1)), None);
        assert_eq!(bool::from_field(FieldValue::Int8(1)), None);
    }

    #[test]
    fn test_key_narrowing() {
        assert_eq!(i16::from_i64(70_000), None);
        assert_eq!(i32::from_i64(42), Some(42));
        assert_eq!(i32::parse_token(" 7 "), Some(7));
        assert_eq!(i32::parse_token("x"), None);
    }

    #[test]
    fn test_text_view_treats_empty_as_absent() {
        assert_eq!(FieldValue::Text(Some(String::new())).as_text(), None);
        assert_eq!(
            FieldValue::Text(Some("1,2".into())).as_text(),
            Some("1,2")
        );
        assert_eq!(FieldValue::Int32(3).as_i64(), Some(3));
    }
}
