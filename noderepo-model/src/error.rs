use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by the registry and by handler hooks.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No handler is registered for the node type.
    #[error("unknown node type: {0}")]
    UnknownType(String),

    /// A payload did not match the handler's shape.
    #[error("invalid payload for {node_type}: {source}")]
    Payload {
        node_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// A lifecycle hook refused the write.
    #[error("hook failed: {0}")]
    Hook(String),

    /// A hook could not publish its side-channel notification.
    #[error("notify failed: {0}")]
    Notify(String),

    /// Password hashing failed.
    #[error("password error: {0}")]
    Password(String),
}
