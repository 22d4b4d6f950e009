//! Core type definitions for the node repository.
//!
//! This crate defines the small, storage-agnostic types every other crate
//! depends on:
//! - [`Reference`] node identifiers (UUID v7) with the reserved empty sentinel
//! - [`NodeStatus`] and [`ProcessStatus`] lifecycle enums
//! - [`ModelEvent`] change notifications published after every committed write
//!
//! Payload shapes for concrete node types live with their handlers in
//! `noderepo-model`, not here.

mod event;
mod reference;
mod status;

pub use event::{ModelAction, ModelEvent};
pub use reference::Reference;
pub use status::{NodeStatus, ProcessStatus};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid status value: {0}")]
    InvalidStatus(i64),

    #[error("unknown model action: {0}")]
    UnknownAction(String),
}
