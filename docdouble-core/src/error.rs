//! Error types and result types for engine operations.
//!
//! This module provides the error taxonomy shared by every backend. Use
//! [`StoreResult<T>`] as the return type for fallible operations.
//!
//! A point lookup on a missing id is not an error: backends answer it with a
//! 404 [`Response`](crate::request::Response). Empty result sets, absent
//! fields and unresolved include targets are normal outcomes as well.

use serde_json::{Error as SerdeJsonError, Value};
use thiserror::Error;

/// Represents all possible errors that can occur when dispatching a request.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization/deserialization error when decoding a payload.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The backend was built with an unusable configuration.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A `beforeSave` or `beforeDelete` hook rejected the operation.
    /// The rejection value is carried verbatim.
    #[error("Hook rejected the operation: {0}")]
    HookRejection(Value),
    /// An atomic update operator this engine does not recognize.
    #[error("Unknown update operator: {0}")]
    UnknownOperator(String),
    /// An array operator targeted a field whose current value is not a list.
    #[error("Field {field} is not an array")]
    MalformedArrayOp {
        /// The field the operator was applied to.
        field: String,
    },
    /// An update operator carried an unusable operand or met an incompatible value.
    #[error("Invalid operand for field {field}: {reason}")]
    InvalidOperand {
        /// The field the operator was applied to.
        field: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The where clause or read parameters could not be interpreted.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The payload is not a usable record.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A request was dispatched through a harness that is not installed.
    #[error("No backend is installed")]
    NotInstalled,
}

/// A specialized `Result` type for engine operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
