//! Error types for the storage engine.

use noderepo_bus::BusError;
use noderepo_model::{ModelError, ValidationErrors};
use noderepo_types::Reference;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live row for the reference.
    #[error("node not found: {0}")]
    NotFound(Reference),

    /// The caller's revision is stale.
    #[error("revision conflict on {reference}: expected {expected}, stored {actual}")]
    RevisionConflict {
        reference: Reference,
        expected: u32,
        actual: u32,
    },

    /// The stored node is already soft-deleted.
    #[error("node already deleted: {0}")]
    AlreadyDeleted(Reference),

    /// No handler is registered for the type.
    #[error("unknown node type: {0}")]
    UnknownType(String),

    /// A node's type cannot change after creation.
    #[error("node {reference} has type {stored}, cannot save as {requested}")]
    TypeChanged {
        reference: Reference,
        stored: String,
        requested: String,
    },

    /// The target parent lies inside the subtree being moved.
    #[error("cannot move {reference} under {parent}: target is inside the moved subtree")]
    InvalidMove {
        reference: Reference,
        parent: Reference,
    },

    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    /// The store was opened read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// Malformed filter, ordering or JSON path.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lifecycle hook failed.
    #[error("hook error: {0}")]
    Hook(#[source] ModelError),

    /// Publishing on the notification bus failed.
    #[error("notify error: {0}")]
    Notify(#[from] BusError),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A thread panicked while holding the connection.
    #[error("connection lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// HTTP status an API layer should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::RevisionConflict { .. } | Self::InvalidMove { .. } => 409,
            Self::AlreadyDeleted(_) => 410,
            Self::ValidationFailed(_) => 422,
            _ => 500,
        }
    }
}

impl From<ModelError> for StoreError {
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::UnknownType(node_type) => Self::UnknownType(node_type),
            other => Self::Hook(other),
        }
    }
}
