use thiserror::Error;

use crate::types::RecordKind;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: String },

    /// A list query matched nothing. Adapters may return this instead of an
    /// empty list; callers treat both the same way.
    #[error("query returned no rows")]
    NoRows,

    #[error("unknown field `{field}` for {kind}")]
    UnknownField { kind: RecordKind, field: String },

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("expected a {expected} record, got {actual}")]
    KindMismatch {
        expected: RecordKind,
        actual: RecordKind,
    },

    #[error("{kind} {id} already exists")]
    Duplicate { kind: RecordKind, id: String },

    #[error("failed to decode {kind} row: {reason}")]
    Decode { kind: RecordKind, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
