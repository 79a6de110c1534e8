//! Error taxonomy for routing and registration operations.
//!
//! "Nothing matched" is not an error: resolvers return `Ok(None)` for it.
//! `NotFound` is reserved for operations that address a specific record.

use edge_proto::addr::InvalidAddress;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum RoutingError {
    /// A required parameter is missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    /// The addressed record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error("domain {0} is reserved")]
    ReservedName(String),

    #[error("domain {0} is already registered")]
    AlreadyRegistered(String),

    /// The caller does not own the addressed record.
    #[error("not authorized for {0}")]
    Forbidden(String),

    /// The document store failed, timed out, or has not produced a snapshot yet.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// A stored document does not match its schema.
    #[error("corrupt document {collection}/{key}: {reason}")]
    Corrupt {
        collection: String,
        key: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, RoutingError>;
