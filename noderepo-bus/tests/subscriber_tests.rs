use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use noderepo_bus::{
    BusConfig, BusError, BusResult, ListenStatus, Listener, Notification, Subscriber, decoded,
};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Scripted connection: the test pushes what `recv` returns.
struct MockListener {
    incoming: mpsc::UnboundedReceiver<BusResult<Option<Notification>>>,
    calls: Calls,
}

#[derive(Clone, Default)]
struct Calls {
    topics: Arc<Mutex<Vec<String>>>,
    pings: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_pings: Arc<std::sync::atomic::AtomicBool>,
}

#[async_trait]
impl Listener for MockListener {
    async fn listen(&mut self, topic: &str) -> BusResult<()> {
        self.calls.topics.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> BusResult<Option<Notification>> {
        match self.incoming.recv().await {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn ping(&mut self) -> BusResult<()> {
        self.calls.pings.fetch_add(1, Ordering::SeqCst);
        if self.calls.fail_pings.load(Ordering::SeqCst) {
            Err(BusError::Connection("ping refused".into()))
        } else {
            Ok(())
        }
    }

    async fn close(&mut self) -> BusResult<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type Feed = mpsc::UnboundedSender<BusResult<Option<Notification>>>;

fn mock_subscriber() -> (Subscriber, Feed, Calls) {
    let (tx, rx) = mpsc::unbounded_channel();
    let calls = Calls::default();
    let listener = MockListener {
        incoming: rx,
        calls: calls.clone(),
    };
    (Subscriber::new(listener, BusConfig::default()), tx, calls)
}

fn note(channel: &str, payload: &str) -> BusResult<Option<Notification>> {
    Ok(Some(Notification::new(channel, payload)))
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("channel closed")
}

// ── Registration ─────────────────────────────────────────────────

#[tokio::test]
async fn starts_lazily_on_first_subscribe() {
    let (subscriber, _feed, calls) = mock_subscriber();
    assert!(!subscriber.is_running().await);

    subscriber
        .subscribe("nodes_manager_action", |_| Ok(ListenStatus::Continue))
        .await
        .unwrap();

    assert!(subscriber.is_running().await);
    assert_eq!(*calls.topics.lock().unwrap(), vec!["nodes_manager_action"]);
    subscriber.stop().await.unwrap();
}

#[tokio::test]
async fn listens_once_per_topic() {
    let (subscriber, _feed, calls) = mock_subscriber();

    for _ in 0..3 {
        subscriber.subscribe("a", |_| Ok(ListenStatus::Continue)).await.unwrap();
    }
    subscriber.subscribe("b", |_| Ok(ListenStatus::Continue)).await.unwrap();

    assert_eq!(*calls.topics.lock().unwrap(), vec!["a", "b"]);
    subscriber.stop().await.unwrap();
}

#[tokio::test]
async fn empty_topic_is_rejected() {
    let (subscriber, _feed, _calls) = mock_subscriber();
    let err = subscriber
        .subscribe("", |_| Ok(ListenStatus::Continue))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::InvalidChannel(_)));
    assert!(!subscriber.is_running().await);
}

// ── Dispatch ─────────────────────────────────────────────────────

#[tokio::test]
async fn handlers_run_in_registration_order() {
    let (subscriber, feed, _calls) = mock_subscriber();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    for name in ["first", "second"] {
        let seen_tx = seen_tx.clone();
        subscriber
            .subscribe("topic", move |n: &Notification| {
                seen_tx.send(format!("{name}:{}", n.payload))?;
                Ok(ListenStatus::Continue)
            })
            .await
            .unwrap();
    }

    feed.send(note("topic", "1")).unwrap();
    feed.send(note("topic", "2")).unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(next(&mut seen_rx).await);
    }
    assert_eq!(seen, vec!["first:1", "second:1", "first:2", "second:2"]);
    subscriber.stop().await.unwrap();
}

#[tokio::test]
async fn stop_status_removes_only_that_handler() {
    let (subscriber, feed, _calls) = mock_subscriber();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    let once_tx = seen_tx.clone();
    subscriber
        .subscribe("topic", move |n: &Notification| {
            once_tx.send(format!("once:{}", n.payload))?;
            Ok(ListenStatus::Stop)
        })
        .await
        .unwrap();
    let always_tx = seen_tx.clone();
    subscriber
        .subscribe("topic", move |n: &Notification| {
            always_tx.send(format!("always:{}", n.payload))?;
            Ok(ListenStatus::Continue)
        })
        .await
        .unwrap();

    feed.send(note("topic", "1")).unwrap();
    feed.send(note("topic", "2")).unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(next(&mut seen_rx).await);
    }
    assert_eq!(seen, vec!["once:1", "always:1", "always:2"]);
    subscriber.stop().await.unwrap();
}

#[tokio::test]
async fn failing_handler_stays_registered() {
    let (subscriber, feed, _calls) = mock_subscriber();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    subscriber
        .subscribe("topic", move |n: &Notification| {
            seen_tx.send(n.payload.clone())?;
            anyhow::bail!("cannot process {}", n.payload)
        })
        .await
        .unwrap();

    feed.send(note("topic", "1")).unwrap();
    feed.send(note("topic", "2")).unwrap();

    assert_eq!(next(&mut seen_rx).await, "1");
    assert_eq!(next(&mut seen_rx).await, "2");
    subscriber.stop().await.unwrap();
}

#[tokio::test]
async fn other_topics_and_reconnects_are_not_dispatched() {
    let (subscriber, feed, _calls) = mock_subscriber();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    subscriber
        .subscribe("wanted", move |n: &Notification| {
            seen_tx.send(n.payload.clone())?;
            Ok(ListenStatus::Continue)
        })
        .await
        .unwrap();

    feed.send(note("unwanted", "x")).unwrap();
    feed.send(Ok(None)).unwrap();
    feed.send(note("wanted", "y")).unwrap();

    assert_eq!(next(&mut seen_rx).await, "y");
    subscriber.stop().await.unwrap();
}

#[derive(Debug, Deserialize, PartialEq)]
struct Ping {
    n: u32,
}

#[tokio::test]
async fn decoded_skips_bad_payloads() {
    let (subscriber, feed, _calls) = mock_subscriber();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    subscriber
        .subscribe(
            "typed",
            decoded(move |ping: Ping| {
                seen_tx.send(ping.n)?;
                Ok(ListenStatus::Continue)
            }),
        )
        .await
        .unwrap();

    feed.send(note("typed", "not json")).unwrap();
    feed.send(note("typed", r#"{"n": 7}"#)).unwrap();

    assert_eq!(next(&mut seen_rx).await, 7);
    subscriber.stop().await.unwrap();
}

// ── Keep-alive ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn idle_connection_is_pinged() {
    let (subscriber, _feed, calls) = mock_subscriber();
    subscriber.subscribe("quiet", |_| Ok(ListenStatus::Continue)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(65)).await;

    assert_eq!(calls.pings.load(Ordering::SeqCst), 3);
    subscriber.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_ping_keeps_loop_alive() {
    let (subscriber, feed, calls) = mock_subscriber();
    calls.fail_pings.store(true, Ordering::SeqCst);
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    subscriber
        .subscribe("topic", move |n: &Notification| {
            seen_tx.send(n.payload.clone())?;
            Ok(ListenStatus::Continue)
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(calls.pings.load(Ordering::SeqCst), 2);

    feed.send(note("topic", "still here")).unwrap();
    assert_eq!(next(&mut seen_rx).await, "still here");
    subscriber.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn lost_connection_recovers_after_ping() {
    let (subscriber, feed, calls) = mock_subscriber();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    subscriber
        .subscribe("topic", move |n: &Notification| {
            seen_tx.send(n.payload.clone())?;
            Ok(ListenStatus::Continue)
        })
        .await
        .unwrap();

    feed.send(Err(BusError::Connection("reset".into()))).unwrap();
    feed.send(note("topic", "after")).unwrap();

    // recv is paused until a retry ping succeeds
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(calls.pings.load(Ordering::SeqCst) >= 1);
    assert_eq!(next(&mut seen_rx).await, "after");
    subscriber.stop().await.unwrap();
}

// ── Stop ─────────────────────────────────────────────────────────

#[tokio::test]
async fn stop_closes_connection_once() {
    let (subscriber, _feed, calls) = mock_subscriber();
    subscriber.subscribe("t", |_| Ok(ListenStatus::Continue)).await.unwrap();

    subscriber.stop().await.unwrap();
    subscriber.stop().await.unwrap();

    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    assert!(!subscriber.is_running().await);
}

#[tokio::test]
async fn stop_before_start_closes_connection() {
    let (subscriber, _feed, calls) = mock_subscriber();
    subscriber.stop().await.unwrap();
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subscribe_after_stop_fails() {
    let (subscriber, _feed, _calls) = mock_subscriber();
    subscriber.stop().await.unwrap();

    let err = subscriber
        .subscribe("t", |_| Ok(ListenStatus::Continue))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::Stopped));
}
