//! Subscriber: per-channel handler fan-out over one listener connection.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{BusConfig, BusError, BusResult, Listener, Notification};

/// What a handler wants after processing a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenStatus {
    /// Keep receiving notifications.
    Continue,
    /// Remove this handler.
    Stop,
}

/// Callback invoked for each notification on a subscribed channel.
///
/// An `Err` is logged and the handler stays registered.
pub type SubscriberHandler =
    Box<dyn FnMut(&Notification) -> anyhow::Result<ListenStatus> + Send + 'static>;

enum BusCommand {
    Subscribe {
        topic: String,
        handler: SubscriberHandler,
        ack: oneshot::Sender<BusResult<()>>,
    },
    Stop,
}

enum State {
    Idle(Box<dyn Listener>),
    Running {
        command_tx: mpsc::Sender<BusCommand>,
        task: JoinHandle<Box<dyn Listener>>,
    },
    Stopped,
}

/// Dispatches notifications from one [`Listener`] to registered handlers.
///
/// The dispatch task starts on the first [`subscribe`](Self::subscribe) and
/// runs until [`stop`](Self::stop). Handler lists live inside that task and
/// change only through its command channel.
pub struct Subscriber {
    state: Mutex<State>,
    config: BusConfig,
}

impl Subscriber {
    pub fn new(listener: impl Listener + 'static, config: BusConfig) -> Self {
        Self {
            state: Mutex::new(State::Idle(Box::new(listener))),
            config,
        }
    }

    /// Registers `handler` for `topic`.
    ///
    /// Starts the dispatch task if needed, listens on `topic` the first time
    /// it is seen, and returns once the handler will receive notifications.
    pub async fn subscribe<F>(&self, topic: &str, handler: F) -> BusResult<()>
    where
        F: FnMut(&Notification) -> anyhow::Result<ListenStatus> + Send + 'static,
    {
        if topic.is_empty() {
            return Err(BusError::InvalidChannel(topic.to_string()));
        }

        let command_tx = self.ensure_started().await?;
        let (ack, ack_rx) = oneshot::channel();

        command_tx
            .send(BusCommand::Subscribe {
                topic: topic.to_string(),
                handler: Box::new(handler),
                ack,
            })
            .await
            .map_err(|_| BusError::Stopped)?;

        ack_rx.await.map_err(|_| BusError::Stopped)?
    }

    /// Stops the dispatch task, waits for it and closes the connection.
    ///
    /// Safe to call more than once and before any subscription.
    pub async fn stop(&self) -> BusResult<()> {
        let mut state = self.state.lock().await;

        match std::mem::replace(&mut *state, State::Stopped) {
            State::Idle(mut listener) => listener.close().await,
            State::Running { command_tx, task } => {
                // A closed channel means the task already exited.
                let _ = command_tx.send(BusCommand::Stop).await;
                drop(command_tx);

                let mut listener = task.await.map_err(|e| BusError::Task(e.to_string()))?;
                let result = listener.close().await;
                info!("subscriber stopped");
                result
            }
            State::Stopped => Ok(()),
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, State::Running { .. })
    }

    async fn ensure_started(&self) -> BusResult<mpsc::Sender<BusCommand>> {
        let mut state = self.state.lock().await;

        match &*state {
            State::Running { command_tx, .. } => return Ok(command_tx.clone()),
            State::Stopped => return Err(BusError::Stopped),
            State::Idle(_) => {}
        }

        let State::Idle(listener) = std::mem::replace(&mut *state, State::Stopped) else {
            return Err(BusError::Stopped);
        };

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let idle_timeout = self.config.idle_timeout;
        let retry_delay = self.config.retry_delay;

        let task = tokio::spawn(async move {
            run_dispatch_loop(listener, command_rx, idle_timeout, retry_delay).await
        });

        *state = State::Running {
            command_tx: command_tx.clone(),
            task,
        };
        info!("subscriber started");
        Ok(command_tx)
    }
}

async fn run_dispatch_loop(
    mut listener: Box<dyn Listener>,
    mut command_rx: mpsc::Receiver<BusCommand>,
    idle_timeout: Duration,
    retry_delay: Duration,
) -> Box<dyn Listener> {
    let mut handlers: HashMap<String, Vec<SubscriberHandler>> = HashMap::new();
    let mut connected = true;

    loop {
        let wait = if connected { idle_timeout } else { retry_delay };

        tokio::select! {
            command = command_rx.recv() => match command {
                Some(BusCommand::Subscribe { topic, handler, ack }) => {
                    let result = if handlers.contains_key(&topic) {
                        Ok(())
                    } else {
                        listener.listen(&topic).await
                    };
                    if result.is_ok() {
                        debug!(channel = %topic, "handler registered");
                        handlers.entry(topic).or_default().push(handler);
                    }
                    let _ = ack.send(result);
                }
                Some(BusCommand::Stop) | None => break,
            },
            received = listener.recv(), if connected => match received {
                Ok(Some(notification)) => dispatch(&mut handlers, &notification),
                Ok(None) => info!("notification connection re-established"),
                Err(e) => {
                    warn!("notification connection lost: {e}");
                    connected = false;
                }
            },
            _ = tokio::time::sleep(wait) => {
                debug!("no notification received, pinging connection");
                match listener.ping().await {
                    Ok(()) if !connected => {
                        info!("notification connection recovered");
                        connected = true;
                    }
                    Ok(()) => {}
                    Err(e) => warn!("notification ping failed: {e}"),
                }
            }
        }
    }

    listener
}

fn dispatch(handlers: &mut HashMap<String, Vec<SubscriberHandler>>, notification: &Notification) {
    let Some(list) = handlers.get_mut(&notification.channel) else {
        debug!(channel = %notification.channel, "no handler for channel");
        return;
    };

    list.retain_mut(|handler| match (handler)(notification) {
        Ok(ListenStatus::Continue) => true,
        Ok(ListenStatus::Stop) => {
            debug!(channel = %notification.channel, "handler removed");
            false
        }
        Err(e) => {
            warn!(channel = %notification.channel, "handler failed: {e:#}");
            true
        }
    });
}

/// Adapts a handler over a typed payload.
///
/// Payloads that do not decode as `T` are logged and skipped; the handler
/// stays registered.
pub fn decoded<T, F>(mut handler: F) -> impl FnMut(&Notification) -> anyhow::Result<ListenStatus> + Send + 'static
where
    T: DeserializeOwned + 'static,
    F: FnMut(T) -> anyhow::Result<ListenStatus> + Send + 'static,
{
    move |notification: &Notification| match serde_json::from_str::<T>(&notification.payload) {
        Ok(value) => handler(value),
        Err(e) => {
            warn!(channel = %notification.channel, "undecodable payload: {e}");
            Ok(ListenStatus::Continue)
        }
    }
}
