//! Fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;

use slack_bridge::infrastructure::adapters::slack::rtm::{FrameStream, RtmConnector, RtmSession};
use slack_bridge::infrastructure::adapters::slack::verify::TlsProbe;
use slack_bridge::{BotError, Message, Robot, RobotEvent, User};

static INIT: Once = Once::new();

pub fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const ROBOT_ID: &str = "UBOT";

/// Robot that records everything it is given
#[derive(Default)]
pub struct RecordingRobot {
    pub messages: Mutex<Vec<Message>>,
    pub events: Mutex<Vec<RobotEvent>>,
    pub identity: Mutex<Option<User>>,
}

impl RecordingRobot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(RobotEvent::name).collect()
    }
}

impl Robot for RecordingRobot {
    fn mention_name(&self) -> String {
        self.identity
            .lock()
            .as_ref()
            .map(|user| user.mention_name.clone())
            .unwrap_or_else(|| "lita".to_string())
    }

    fn set_identity(&self, user: &User) {
        *self.identity.lock() = Some(user.clone());
    }

    fn receive(&self, message: Message) {
        self.messages.lock().push(message);
    }

    fn trigger(&self, event: RobotEvent) {
        self.events.lock().push(event);
    }
}

/// Probe failing a fixed number of times before succeeding
pub struct ScriptedProbe {
    failures: u32,
    pub calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn failing(failures: u32) -> Arc<Self> {
        Arc::new(Self { failures, calls: AtomicU32::new(0) })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TlsProbe for ScriptedProbe {
    async fn handshake(&self, _host: &str) -> Result<(), String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err("SSL_connect returned=1 certificate verify failed".to_string())
        } else {
            Ok(())
        }
    }
}

/// Frame stream fed from an mpsc channel
pub struct ChannelStream {
    rx: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
    close_delay: Duration,
}

#[async_trait]
impl FrameStream for ChannelStream {
    async fn next_frame(&mut self) -> Option<Result<String, BotError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Handle the test keeps to drive one opened stream
pub struct StreamHandle {
    pub frames: mpsc::UnboundedSender<String>,
    pub closed: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn send(&self, frame: &str) {
        self.frames.send(frame.to_string()).expect("read loop is gone");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector handing out channel-backed streams
#[derive(Default)]
pub struct FakeConnector {
    pub connects: AtomicU32,
    pub handles: Mutex<VecDeque<StreamHandle>>,
    pub fail: AtomicBool,
    /// How long each opened stream takes to close
    pub close_delay_ms: AtomicU64,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Handle of the oldest stream not yet taken
    pub fn take_stream(&self) -> StreamHandle {
        self.handles.lock().pop_front().expect("no stream was opened")
    }
}

#[async_trait]
impl RtmConnector for FakeConnector {
    async fn connect(&self) -> Result<(RtmSession, Box<dyn FrameStream>), BotError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BotError::Network("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        self.handles.lock().push_back(StreamHandle { frames: tx, closed: closed.clone() });

        let session = RtmSession {
            url: "wss://example.invalid/websocket".to_string(),
            self_id: ROBOT_ID.to_string(),
            self_name: "lita".to_string(),
        };
        let close_delay = Duration::from_millis(self.close_delay_ms.load(Ordering::SeqCst));
        Ok((session, Box::new(ChannelStream { rx, closed, close_delay })))
    }
}

/// Polls until the condition holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
