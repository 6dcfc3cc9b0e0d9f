//! Semantic type to storage mapping

use crate::model::SemanticType;
use serde::Serialize;

/// SQLite column affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Affinity {
    Integer,
    Real,
    Text,
    Blob,
}

impl Affinity {
    pub fn of(semantic: SemanticType) -> Self {
        match semantic {
            SemanticType::Int8
            | SemanticType::Int16
            | SemanticType::Int32
            | SemanticType::Int64
            | SemanticType::Bool
            | SemanticType::Timestamp => Affinity::Integer,
            SemanticType::Float32 | SemanticType::Float64 => Affinity::Real,
            SemanticType::Text => Affinity::Text,
            SemanticType::Blob => Affinity::Blob,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
            Affinity::Blob => "BLOB",
        }
    }
}

/// How a field value is written to a statement parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindOp {
    Integer,
    Real,
    /// 1 or 0
    BoolAsInteger,
    /// absent text binds as ""
    TextOrEmpty,
    /// whole seconds; absent binds as 0
    EpochSeconds,
    BlobOrNull,
}

impl BindOp {
    pub fn of(semantic: SemanticType) -> Self {
        match semantic {
            SemanticType::Int8 | SemanticType::Int16 | SemanticType::Int32 | SemanticType::Int64 => {
                BindOp::Integer
            }
            SemanticType::Float32 | SemanticType::Float64 => BindOp::Real,
            SemanticType::Bool => BindOp::BoolAsInteger,
            SemanticType::Text => BindOp::TextOrEmpty,
            SemanticType::Timestamp => BindOp::EpochSeconds,
            SemanticType::Blob => BindOp::BlobOrNull,
        }
    }
}

/// How a stored column value is read back into a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodeOp {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// true iff the stored integer equals 1
    BoolEqualsOne,
    TextOrAbsent,
    /// 0 or NULL decodes to absent
    EpochSecondsZeroAbsent,
    BlobOrAbsent,
}

impl DecodeOp {
    pub fn of(semantic: SemanticType) -> Self {
        match semantic {
            SemanticType::Int8 => DecodeOp::Int8,
            SemanticType::Int16 => DecodeOp::Int16,
            SemanticType::Int32 => DecodeOp::Int32,
            SemanticType::Int64 => DecodeOp::Int64,
            SemanticType::Float32 => DecodeOp::Float32,
            SemanticType::Float64 => DecodeOp::Float64,
            SemanticType::Bool => DecodeOp::BoolEqualsOne,
            SemanticType::Text => DecodeOp::TextOrAbsent,
            SemanticType::Timestamp => DecodeOp::EpochSecondsZeroAbsent,
            SemanticType::Blob => DecodeOp::BlobOrAbsent,
        }
    }
}
