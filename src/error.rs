//! Error taxonomy for the driver.
//!
//! Two tiers: [`StoreError`] is produced by [`crate::store::ObjectStoreClient`]
//! implementations and only knows about the wire protocol. [`DriverError`] is
//! the taxonomy the rest of the crate deals in; only the facade (`ffi`) ever
//! turns a `DriverError` into an ABI sentinel.

use thiserror::Error;

/// Transport-level error surfaced by an [`crate::store::ObjectStoreClient`].
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("precondition failed: {bucket}/{key}")]
    PreconditionFailed { bucket: String, key: String },

    #[error("store error ({code}): {message}")]
    Other { code: String, message: String },
}

impl StoreError {
    pub fn other(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Other {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Facade-level error taxonomy.
#[derive(Debug, Error, Clone)]
pub enum DriverError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("driver is not connected")]
    NotConnected,

    #[error("not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("store error ({code}): {message}")]
    Store { code: String, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("arithmetic overflow computing {0}")]
    Overflow(String),

    #[error("unknown handle")]
    UnknownHandle,
}

impl From<StoreError> for DriverError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { bucket, key } => DriverError::NotFound { bucket, key },
            StoreError::PreconditionFailed { bucket, key } => DriverError::Store {
                code: "PreconditionFailed".to_string(),
                message: format!("{bucket}/{key}"),
            },
            StoreError::Other { code, message } => DriverError::Store { code, message },
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
