//! Push-channel supervision: reconnects, degradation and teardown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use shopsync_core::config::BackoffPolicy;
use shopsync_core::event::{OrderEventType, PushEnvelope};
use shopsync_core::session::SessionStore;
use shopsync_core::{OrderId, Role};
use shopsync_stream::subscriber::{EventSubscriber, StreamStatus};
use shopsync_testing::mocks::{ConnectScript, MockEventSource};
use shopsync_testing::session;
use std::time::Duration;
use tokio::time::timeout;

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn envelope(order: &str, event: OrderEventType) -> PushEnvelope {
    PushEnvelope {
        event,
        order_id: OrderId::from(order),
        payload: serde_json::Value::Null,
        timestamp: Utc::now(),
    }
}

fn logged_in(role: Role) -> SessionStore {
    SessionStore::with_session(session("access-1", "refresh-1", role))
}

#[tokio::test]
async fn events_flow_to_the_subscription() {
    let source = MockEventSource::new();
    source.push_connect(ConnectScript::EventsThenOpen(vec![
        envelope("o-1", OrderEventType::Shipped),
        envelope("o-2", OrderEventType::Placed),
    ]));

    let subscriber = EventSubscriber::new(source, logged_in(Role::Admin), fast_backoff(), 5);
    let mut subscription = subscriber.subscribe();

    let first = timeout(Duration::from_secs(1), subscription.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.order_id, OrderId::from("o-1"));
    assert_eq!(first.event, OrderEventType::Shipped);

    let second = timeout(Duration::from_secs(1), subscription.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.order_id, OrderId::from("o-2"));
    assert_eq!(subscription.status(), StreamStatus::Connected);
}

#[tokio::test]
async fn dropped_channel_reconnects_transparently() {
    let source = MockEventSource::new();
    // First connect drops after one event; second stays open.
    source.push_connect(ConnectScript::Events(vec![envelope(
        "o-1",
        OrderEventType::Processing,
    )]));
    source.push_connect(ConnectScript::EventsThenOpen(vec![envelope(
        "o-1",
        OrderEventType::Shipped,
    )]));

    let subscriber =
        EventSubscriber::new(source.clone(), logged_in(Role::Customer), fast_backoff(), 5);
    let mut subscription = subscriber.subscribe();

    let first = timeout(Duration::from_secs(1), subscription.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.event, OrderEventType::Processing);

    // The drop is invisible: the next event arrives after the reconnect.
    let second = timeout(Duration::from_secs(1), subscription.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.event, OrderEventType::Shipped);
    assert!(source.connect_calls() >= 2);
}

#[tokio::test]
async fn repeated_failures_reach_degraded_then_recover() {
    let source = MockEventSource::new();
    source.push_failures(4);
    source.push_connect(ConnectScript::EventsThenOpen(vec![]));

    // Roomier backoff than the other tests so the Degraded phase is
    // observable before the recovering connect lands.
    let backoff = BackoffPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(40),
        multiplier: 2.0,
    };
    let subscriber =
        EventSubscriber::new(source.clone(), logged_in(Role::Customer), backoff, 3);
    let subscription = subscriber.subscribe();
    let mut status = subscription.status_watch();

    // Degraded after the third consecutive failure...
    timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == StreamStatus::Degraded),
    )
    .await
    .unwrap()
    .unwrap();

    // ...but it keeps retrying and recovers on the next good connect.
    timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == StreamStatus::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(source.connect_calls(), 5);
}

#[tokio::test]
async fn session_teardown_closes_the_channel() {
    let source = MockEventSource::new();
    source.push_connect(ConnectScript::EventsThenOpen(vec![]));

    let sessions = logged_in(Role::Customer);
    let subscriber = EventSubscriber::new(source, sessions.clone(), fast_backoff(), 5);
    let mut subscription = subscriber.subscribe();
    let mut status = subscription.status_watch();

    timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == StreamStatus::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    sessions.clear().await;

    timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == StreamStatus::Closed),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(subscription.next_event().await, None);
}

#[tokio::test]
async fn teardown_wins_over_a_backpressured_send() {
    let source = MockEventSource::new();
    // Far more events than the channel buffers, and a consumer that
    // never reads: the supervision task ends up parked on a full buffer.
    let flood: Vec<_> = (0..200)
        .map(|i| envelope(&format!("o-{i}"), OrderEventType::Placed))
        .collect();
    source.push_connect(ConnectScript::EventsThenOpen(flood));

    let sessions = logged_in(Role::Admin);
    let subscriber = EventSubscriber::new(source, sessions.clone(), fast_backoff(), 5);
    let subscription = subscriber.subscribe();
    let mut status = subscription.status_watch();

    timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == StreamStatus::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    // Logging out must close the channel even though nothing drains it.
    sessions.clear().await;
    timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == StreamStatus::Closed),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn no_session_means_immediate_close() {
    let source = MockEventSource::new();
    let subscriber = EventSubscriber::new(source, SessionStore::new(), fast_backoff(), 5);
    let subscription = subscriber.subscribe();
    let mut status = subscription.status_watch();

    timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == StreamStatus::Closed),
    )
    .await
    .unwrap()
    .unwrap();
}
