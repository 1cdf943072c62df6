//! Connection manager behaviour against fake network collaborators
//! Run with: cargo test --test adapter_lifecycle_test

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{ensure_init, eventually, FakeConnector, RecordingRobot, ScriptedProbe, ROBOT_ID};
use slack_bridge::{BotError, ConnectionState, MemoryStore, SlackAdapter, SlackConfig};

struct Harness {
    adapter: SlackAdapter,
    robot: Arc<RecordingRobot>,
    connector: Arc<FakeConnector>,
    probe: Arc<ScriptedProbe>,
}

fn config(verify_peer: bool, verify_attempts: u32) -> SlackConfig {
    SlackConfig {
        rtm_connection_verify_peer: verify_peer,
        verify_max_attempts: verify_attempts,
        verify_delay_secs: 0,
        auto_reconnect: false,
        ..SlackConfig::new("xoxb-test")
    }
}

fn harness(config: SlackConfig, probe_failures: u32) -> Harness {
    ensure_init();
    let robot = RecordingRobot::new();
    let connector = FakeConnector::new();
    let probe = ScriptedProbe::failing(probe_failures);
    let adapter = SlackAdapter::new(config, robot.clone(), Arc::new(MemoryStore::new()))
        .unwrap()
        .with_connector(connector.clone())
        .with_probe(probe.clone());

    Harness { adapter, robot, connector, probe }
}

#[tokio::test]
async fn test_run_connects_and_dispatches_frames() {
    let h = harness(config(true, 10), 0);

    h.adapter.run().await.unwrap();
    assert_eq!(h.adapter.state(), ConnectionState::Connected);
    assert_eq!(h.connector.connects(), 1);
    assert_eq!(h.probe.calls(), 0, "probe only runs when peer verification is off");

    // the robot learns its own identity from the session
    assert_eq!(h.robot.identity.lock().as_ref().unwrap().id, ROBOT_ID);

    let stream = h.connector.take_stream();
    stream.send(r#"{"type":"hello"}"#);
    stream.send("this is not json");
    stream.send(r#"{"type":"message","channel":"C1","user":"U1","text":"hi <@UBOT>"}"#);
    stream.send(r#"{"type":"message","channel":"C1","user":"UBOT","text":"my own echo"}"#);

    assert!(eventually(|| h.robot.messages().len() == 1).await);
    assert_eq!(h.robot.event_names(), vec!["connected"]);
    assert_eq!(h.robot.messages()[0].body, "hi @lita");

    h.adapter.shut_down().await;
}

#[tokio::test]
async fn test_run_is_noop_while_connected() {
    let h = harness(config(true, 10), 0);

    h.adapter.run().await.unwrap();
    h.adapter.run().await.unwrap();
    assert_eq!(h.connector.connects(), 1);

    h.adapter.shut_down().await;
}

#[tokio::test]
async fn test_verification_retries_then_connects() {
    let h = harness(config(false, 4), 3);

    h.adapter.run().await.unwrap();
    assert_eq!(h.probe.calls(), 4);
    assert_eq!(h.connector.connects(), 1);
    assert_eq!(h.adapter.state(), ConnectionState::Connected);

    h.adapter.shut_down().await;
}

#[tokio::test]
async fn test_verification_exhaustion_aborts_run() {
    let h = harness(config(false, 2), u32::MAX);

    let err = h.adapter.run().await.unwrap_err();
    assert!(matches!(err, BotError::Tls { attempts: 2, .. }));
    assert_eq!(h.probe.calls(), 2);
    assert_eq!(h.connector.connects(), 0, "stream must never start");
    assert_eq!(h.adapter.state(), ConnectionState::Disconnected);

    // nothing to shut down
    h.adapter.shut_down().await;
    assert!(h.robot.event_names().is_empty());
}

#[tokio::test]
async fn test_failed_connect_allows_retry() {
    let h = harness(config(true, 10), 0);
    h.connector.fail.store(true, Ordering::SeqCst);

    assert!(matches!(h.adapter.run().await, Err(BotError::Network(_))));
    assert_eq!(h.adapter.state(), ConnectionState::Disconnected);

    h.connector.fail.store(false, Ordering::SeqCst);
    h.adapter.run().await.unwrap();
    assert_eq!(h.adapter.state(), ConnectionState::Connected);

    h.adapter.shut_down().await;
}

#[tokio::test]
async fn test_shut_down_without_connection_is_noop() {
    let h = harness(config(true, 10), 0);

    h.adapter.shut_down().await;
    assert!(h.robot.event_names().is_empty());
    assert_eq!(h.adapter.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_shut_down_closes_stream_once() {
    let h = harness(config(true, 10), 0);
    h.adapter.run().await.unwrap();
    let stream = h.connector.take_stream();

    h.adapter.shut_down().await;
    assert!(stream.is_closed());
    assert_eq!(h.adapter.state(), ConnectionState::Disconnected);
    assert_eq!(h.robot.event_names(), vec!["disconnected"]);

    h.adapter.shut_down().await;
    assert_eq!(h.robot.event_names(), vec!["disconnected"]);
}

#[tokio::test]
async fn test_reconnects_after_stream_ends() {
    let mut config = config(true, 10);
    config.auto_reconnect = true;
    config.reconnect_delay_ms = 1;
    let h = harness(config, 0);

    h.adapter.run().await.unwrap();
    let first = h.connector.take_stream();
    drop(first);

    assert!(eventually(|| h.connector.connects() == 2).await);
    let second = h.connector.take_stream();
    second.send(r#"{"type":"message","channel":"D1","user":"U1","text":"still here"}"#);
    assert!(eventually(|| h.robot.messages().len() == 1).await);
    assert!(h.robot.messages()[0].source.private_message);
    assert_eq!(h.adapter.state(), ConnectionState::Connected);

    h.adapter.shut_down().await;
    assert!(second.is_closed());
}

#[tokio::test]
async fn test_stream_end_without_reconnect_disconnects() {
    let h = harness(config(true, 10), 0);
    h.adapter.run().await.unwrap();
    drop(h.connector.take_stream());

    assert!(eventually(|| h.adapter.state() == ConnectionState::Disconnected).await);
    assert_eq!(h.connector.connects(), 1);

    // a new run may start once the old stream is gone
    h.adapter.run().await.unwrap();
    assert_eq!(h.connector.connects(), 2);
    h.adapter.shut_down().await;
}

#[tokio::test]
async fn test_run_while_shutting_down_is_noop() {
    let h = harness(config(true, 10), 0);
    h.connector.close_delay_ms.store(50, Ordering::SeqCst);
    h.adapter.run().await.unwrap();

    let ((), during) = tokio::join!(h.adapter.shut_down(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.adapter.run().await
    });
    during.unwrap();

    assert_eq!(h.connector.connects(), 1, "no stream may open while the old one closes");
    assert_eq!(h.adapter.state(), ConnectionState::Disconnected);
    assert_eq!(h.robot.event_names(), vec!["disconnected"]);

    // once shut down, run connects again and stays the only connection
    h.adapter.run().await.unwrap();
    h.adapter.run().await.unwrap();
    assert_eq!(h.connector.connects(), 2);
    assert_eq!(h.adapter.state(), ConnectionState::Connected);

    h.adapter.shut_down().await;
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let mut config = config(true, 10);
    config.auto_reconnect = true;
    config.reconnect_delay_ms = 1;
    config.max_reconnect_delay_ms = 4;
    config.max_reconnect_attempts = 3;
    let h = harness(config, 0);

    h.adapter.run().await.unwrap();
    h.connector.fail.store(true, Ordering::SeqCst);
    drop(h.connector.take_stream());

    assert!(eventually(|| h.adapter.state() == ConnectionState::Disconnected).await);
    assert_eq!(h.connector.connects(), 1 + 3);
    assert!(
        h.robot.event_names().is_empty(),
        "giving up does not trigger disconnected"
    );

    // the adapter can be started again after giving up
    h.connector.fail.store(false, Ordering::SeqCst);
    h.adapter.run().await.unwrap();
    assert_eq!(h.adapter.state(), ConnectionState::Connected);
    h.adapter.shut_down().await;
}
