//! In-process notification backend.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{BusConfig, BusError, BusResult, Listener, Notification, Notifier};

/// Broadcast fan-out shared by publishers and listeners.
///
/// Cloning is cheap; clones publish into the same hub.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
    shutdown: Arc<AtomicBool>,
}

impl NotificationHub {
    /// Creates a hub where each listener buffers up to `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.hub_capacity)
    }

    /// Opens a new connection. It receives nothing until it listens on a topic.
    #[must_use]
    pub fn listener(&self) -> HubListener {
        HubListener {
            receiver: self.sender.subscribe(),
            topics: HashSet::new(),
            shutdown: Arc::clone(&self.shutdown),
            closed: false,
        }
    }

    /// Rejects further publishes and makes listener pings fail.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Number of open connections.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, channel: &str, payload: &str) -> BusResult<()> {
        if channel.is_empty() {
            return Err(BusError::InvalidChannel(channel.to_string()));
        }
        if self.is_shutdown() {
            return Err(BusError::Closed);
        }
        // No open connection is not a failure: nobody is interested yet.
        match self.sender.send(Notification::new(channel, payload)) {
            Ok(receivers) => debug!(channel, receivers, "notification published"),
            Err(_) => debug!(channel, "notification published without listeners"),
        }
        Ok(())
    }
}

/// A connection to a [`NotificationHub`].
#[derive(Debug)]
pub struct HubListener {
    receiver: broadcast::Receiver<Notification>,
    topics: HashSet<String>,
    shutdown: Arc<AtomicBool>,
    closed: bool,
}

impl HubListener {
    fn ensure_open(&self) -> BusResult<()> {
        if self.closed || self.shutdown.load(Ordering::SeqCst) {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Listener for HubListener {
    async fn listen(&mut self, topic: &str) -> BusResult<()> {
        if topic.is_empty() {
            return Err(BusError::InvalidChannel(topic.to_string()));
        }
        self.ensure_open()?;
        self.topics.insert(topic.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> BusResult<Option<Notification>> {
        if self.closed {
            return Err(BusError::Closed);
        }
        loop {
            match self.receiver.recv().await {
                Ok(notification) if self.topics.contains(&notification.channel) => {
                    return Ok(Some(notification));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "listener lagged behind the hub");
                    return Ok(None);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }

    async fn ping(&mut self) -> BusResult<()> {
        self.ensure_open()
    }

    async fn close(&mut self) -> BusResult<()> {
        self.closed = true;
        self.topics.clear();
        Ok(())
    }
}
