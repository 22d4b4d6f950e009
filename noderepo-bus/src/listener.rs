use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::BusResult;

/// A message received on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
}

impl Notification {
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Publish side of the bus.
pub trait Notifier: Send + Sync {
    fn notify(&self, channel: &str, payload: &str) -> BusResult<()>;
}

/// A backend connection that can subscribe to channels and receive their
/// notifications.
///
/// `recv` must be cancel safe: the subscriber races it against its command
/// channel and the keep-alive timer.
#[async_trait]
pub trait Listener: Send {
    /// Starts delivering notifications for `topic`.
    async fn listen(&mut self, topic: &str) -> BusResult<()>;

    /// Waits for the next notification.
    ///
    /// `Ok(None)` means the connection was re-established and notifications
    /// may have been missed; it carries nothing to dispatch.
    async fn recv(&mut self) -> BusResult<Option<Notification>>;

    /// Keep-alive ping, sent after an idle period.
    async fn ping(&mut self) -> BusResult<()>;

    async fn close(&mut self) -> BusResult<()>;
}
