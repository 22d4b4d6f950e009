use thiserror::Error;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors that can occur on the notification bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The backend connection or hub is closed.
    #[error("notification channel closed")]
    Closed,

    /// The subscriber has been stopped.
    #[error("subscriber stopped")]
    Stopped,

    /// Invalid channel name.
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// The backend connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The dispatch task panicked or was cancelled.
    #[error("dispatch task failed: {0}")]
    Task(String),
}
