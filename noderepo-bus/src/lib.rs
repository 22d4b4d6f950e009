//! Change notification bus.
//!
//! Writers publish `(channel, payload)` pairs through a [`Notifier`];
//! readers attach a [`Subscriber`] to a [`Listener`] connection and register
//! per-channel handlers. The subscriber owns one background task that
//! receives notifications, fans them out to handlers in registration order
//! and keeps the connection alive with periodic pings.
//!
//! [`NotificationHub`] is the in-process backend: a broadcast fan-out that
//! implements [`Notifier`] and hands out [`HubListener`] connections.

mod config;
mod error;
mod hub;
mod listener;
mod subscriber;

pub use config::BusConfig;
pub use error::{BusError, BusResult};
pub use hub::{HubListener, NotificationHub};
pub use listener::{Listener, Notification, Notifier};
pub use subscriber::{ListenStatus, Subscriber, SubscriberHandler, decoded};
