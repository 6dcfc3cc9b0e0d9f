//! Field value <-> stored value conversion
//!
//! `StoredValue` mirrors the five SQLite storage classes so the core crate
//! stays independent of the driver; the store crate converts it to and from
//! `rusqlite::types::Value`.

use super::affinity::{BindOp, DecodeOp};
use crate::errors::{OrmError, OrmErrorKind, Result};
use crate::model::FieldValue;
use chrono::{DateTime, Utc};

/// A value as held by the storage engine
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl StoredValue {
    fn storage_class(&self) -> &'static str {
        match self {
            StoredValue::Null => "NULL",
            StoredValue::Integer(_) => "INTEGER",
            StoredValue::Real(_) => "REAL",
            StoredValue::Text(_) => "TEXT",
            StoredValue::Blob(_) => "BLOB",
        }
    }
}

fn bind_mismatch(op: BindOp, value: &FieldValue) -> OrmError {
    OrmError::new(OrmErrorKind::Internal)
        .with_op("bind")
        .with_message(format!(
            "{:?} cannot bind a {} value",
            op,
            value.semantic()
        ))
}

/// Convert a field value into its stored representation
///
/// # Errors
///
/// `Internal` if the value's type does not fit the bind operation.
pub fn bind(op: BindOp, value: &FieldValue) -> Result<StoredValue> {
    let stored = match (op, value) {
        (BindOp::Integer, v) => StoredValue::Integer(v.as_i64().ok_or_else(|| bind_mismatch(op, v))?),
        (BindOp::Real, FieldValue::Float32(f)) => StoredValue::Real(f64::from(*f)),
        (BindOp::Real, FieldValue::Float64(f)) => StoredValue::Real(*f),
        (BindOp::BoolAsInteger, FieldValue::Bool(b)) => StoredValue::Integer(i64::from(*b)),
        (BindOp::TextOrEmpty, FieldValue::Text(t)) => {
            StoredValue::Text(t.clone().unwrap_or_default())
        }
        (BindOp::EpochSeconds, FieldValue::Timestamp(ts)) => {
            StoredValue::Integer(ts.map(|t| t.timestamp()).unwrap_or(0))
        }
        (BindOp::BlobOrNull, FieldValue::Blob(b)) => match b {
            Some(bytes) => StoredValue::Blob(bytes.clone()),
            None => StoredValue::Null,
        },
        (op, v) => return Err(bind_mismatch(op, v)),
    };
    Ok(stored)
}

fn decode_error(op: DecodeOp, stored: &StoredValue, detail: &str) -> OrmError {
    OrmError::new(OrmErrorKind::Decode)
        .with_op("decode")
        .with_message(format!(
            "{:?} cannot read {} value: {}",
            op,
            stored.storage_class(),
            detail
        ))
}

fn integer_of(op: DecodeOp, stored: &StoredValue) -> Result<i64> {
    match stored {
        StoredValue::Null => Ok(0),
        StoredValue::Integer(v) => Ok(*v),
        StoredValue::Real(f) => Ok(*f as i64),
        StoredValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| decode_error(op, stored, "not an integer")),
        StoredValue::Blob(_) => Err(decode_error(op, stored, "binary data")),
    }
}

fn real_of(op: DecodeOp, stored: &StoredValue) -> Result<f64> {
    match stored {
        StoredValue::Null => Ok(0.0),
        StoredValue::Integer(v) => Ok(*v as f64),
        StoredValue::Real(f) => Ok(*f),
        StoredValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| decode_error(op, stored, "not a number")),
        StoredValue::Blob(_) => Err(decode_error(op, stored, "binary data")),
    }
}

fn narrow<N: TryFrom<i64>>(op: DecodeOp, stored: &StoredValue) -> Result<N> {
    let wide = integer_of(op, stored)?;
    N::try_from(wide).map_err(|_| decode_error(op, stored, "out of range"))
}

/// Convert a stored value back into a field value
///
/// # Errors
///
/// `Decode` if the stored value cannot represent the field's type.
pub fn decode(op: DecodeOp, stored: StoredValue) -> Result<FieldValue> {
    let value = match op {
        DecodeOp::Int8 => FieldValue::Int8(narrow(op, &stored)?),
        DecodeOp::Int16 => FieldValue::Int16(narrow(op, &stored)?),
        DecodeOp::Int32 => FieldValue::Int32(narrow(op, &stored)?),
        DecodeOp::Int64 => FieldValue::Int64(integer_of(op, &stored)?),
        DecodeOp::Float32 => FieldValue::Float32(real_of(op, &stored)? as f32),
        DecodeOp::Float64 => FieldValue::Float64(real_of(op, &stored)?),
        DecodeOp::BoolEqualsOne => FieldValue::Bool(integer_of(op, &stored)? == 1),
        DecodeOp::TextOrAbsent => FieldValue::Text(match stored {
            StoredValue::Null => None,
            StoredValue::Text(s) => Some(s),
            StoredValue::Integer(v) => Some(v.to_string()),
            StoredValue::Real(f) => Some(f.to_string()),
            StoredValue::Blob(bytes) => Some(
                String::from_utf8(bytes)
                    .map_err(|_| decode_error(op, &StoredValue::Null, "invalid UTF-8"))?,
            ),
        }),
        DecodeOp::EpochSecondsZeroAbsent => {
            let secs = integer_of(op, &stored)?;
            if secs == 0 {
                FieldValue::Timestamp(None)
            } else {
                let ts = DateTime::<Utc>::from_timestamp(secs, 0)
                    .ok_or_else(|| decode_error(op, &stored, "timestamp out of range"))?;
                FieldValue::Timestamp(Some(ts))
            }
        }
        DecodeOp::BlobOrAbsent => FieldValue::Blob(match stored {
            StoredValue::Null => None,
            StoredValue::Blob(bytes) => Some(bytes),
            StoredValue::Text(s) => Some(s.into_bytes()),
            other => return Err(decode_error(op, &other, "not binary data")),
        }),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SemanticType;

    fn roundtrip(value: FieldValue) -> FieldValue {
        let semantic = value.semantic();
        let stored = bind(BindOp::of(semantic), &value).unwrap();
        decode(DecodeOp::of(semantic), stored).unwrap()
    }

    #[test]
    fn test_bool_stored_as_zero_one() {
        assert_eq!(
            bind(BindOp::BoolAsInteger, &FieldValue::Bool(true)).unwrap(),
            StoredValue::Integer(1)
        );
        assert_eq!(
            bind(BindOp::BoolAsInteger, &FieldValue::Bool(false)).unwrap(),
            StoredValue::Integer(0)
        );
    }

    #[test]
    fn test_bool_decodes_by_equality_to_one() {
        let decoded = decode(DecodeOp::BoolEqualsOne, StoredValue::Integer(2)).unwrap();
        assert_eq!(decoded, FieldValue::Bool(false));
        let decoded = decode(DecodeOp::BoolEqualsOne, StoredValue::Integer(1)).unwrap();
        assert_eq!(decoded, FieldValue::Bool(true));
    }

    #[test]
    fn test_timestamp_zero_is_absent() {
        assert_eq!(
            decode(DecodeOp::EpochSecondsZeroAbsent, StoredValue::Integer(0)).unwrap(),
            FieldValue::Timestamp(None)
        );
        assert_eq!(
            decode(DecodeOp::EpochSecondsZeroAbsent, StoredValue::Null).unwrap(),
            FieldValue::Timestamp(None)
        );
        assert_eq!(
            bind(BindOp::EpochSeconds, &FieldValue::Timestamp(None)).unwrap(),
            StoredValue::Integer(0)
        );
    }

    #[test]
    fn test_timestamp_drops_sub_second_precision() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 999_000_000).unwrap();
        let back = roundtrip(FieldValue::Timestamp(Some(ts)));
        assert_eq!(
            back,
            FieldValue::Timestamp(DateTime::<Utc>::from_timestamp(1_700_000_000, 0))
        );
    }

    #[test]
    fn test_absent_text_binds_as_empty_string() {
        assert_eq!(
            bind(BindOp::TextOrEmpty, &FieldValue::Text(None)).unwrap(),
            StoredValue::Text(String::new())
        );
    }

    #[test]
    fn test_absent_blob_binds_null() {
        assert_eq!(
            bind(BindOp::BlobOrNull, &FieldValue::Blob(None)).unwrap(),
            StoredValue::Null
        );
        assert_eq!(roundtrip(FieldValue::Blob(None)), FieldValue::Blob(None));
    }

    #[test]
    fn test_numeric_null_decodes_as_zero() {
        assert_eq!(
            decode(DecodeOp::Int32, StoredValue::Null).unwrap(),
            FieldValue::Int32(0)
        );
        assert_eq!(
            decode(DecodeOp::Float64, StoredValue::Null).unwrap(),
            FieldValue::Float64(0.0)
        );
    }

    #[test]
    fn test_narrowing_overflow_is_decode_error() {
        let err = decode(DecodeOp::Int8, StoredValue::Integer(300)).unwrap_err();
        assert_eq!(err.kind(), OrmErrorKind::Decode);
    }

    #[test]
    fn test_bind_type_mismatch_is_internal() {
        let err = bind(BindOp::Real, &FieldValue::Text(None)).unwrap_err();
        assert_eq!(err.kind(), OrmErrorKind::Internal);
    }

    #[test]
    fn test_float32_survives() {
        assert_eq!(
            roundtrip(FieldValue::Float32(1.5)),
            FieldValue::Float32(1.5)
        );
        assert_eq!(
            DecodeOp::of(SemanticType::Float32),
            DecodeOp::Float32
        );
    }
}
