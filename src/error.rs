//! Input validation errors

use thiserror::Error;

/// A raw record that cannot be turned into an [`Event`](crate::types::Event).
///
/// `index` is the zero-based position of the record in the input sequence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRecordError {
    #[error("record {index}: expected 3 fields (kind, timestamp, product id), found {found}")]
    FieldCount { index: usize, found: usize },

    #[error("record {index}: unknown event kind {kind:?}, expected \"VIEW\" or \"PURCHASE\"")]
    UnknownKind { index: usize, kind: String },

    #[error("record {index}: timestamp {value:?} is not a non-negative integer")]
    InvalidTimestamp { index: usize, value: String },
}

impl MalformedRecordError {
    pub fn index(&self) -> usize {
        match self {
            MalformedRecordError::FieldCount { index, .. }
            | MalformedRecordError::UnknownKind { index, .. }
            | MalformedRecordError::InvalidTimestamp { index, .. } => *index,
        }
    }
}

pub type NormalizeResult<T> = Result<T, MalformedRecordError>;
