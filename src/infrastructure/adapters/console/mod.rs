//! Console robot - prints what the adapter publishes, for local runs

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::domain::entities::{Message, RobotEvent, User};
use crate::domain::traits::Robot;

/// Robot façade that writes deliveries to stdout and events to the log
pub struct ConsoleRobot {
    name: RwLock<String>,
    mention_name: RwLock<String>,
    sender: Option<mpsc::Sender<Message>>,
}

impl ConsoleRobot {
    pub fn new(name: impl Into<String>, mention_name: impl Into<String>) -> Self {
        Self {
            name: RwLock::new(name.into()),
            mention_name: RwLock::new(mention_name.into()),
            sender: None,
        }
    }

    /// Also forward every received message to a channel
    pub fn with_sender(mut self, sender: mpsc::Sender<Message>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    fn format(message: &Message) -> String {
        let room = message
            .source
            .room
            .as_ref()
            .map(|room| room.to_string())
            .unwrap_or_else(|| "-".to_string());
        let marker = if message.source.private_message { " (private)" } else { "" };
        format!("[{}] {}{}: {}", room, message.user().mention_name, marker, message.body)
    }
}

impl Robot for ConsoleRobot {
    fn mention_name(&self) -> String {
        self.mention_name.read().clone()
    }

    fn set_identity(&self, user: &User) {
        tracing::info!("Robot identity is now {} (@{})", user.name, user.mention_name);
        *self.name.write() = user.name.clone();
        *self.mention_name.write() = user.mention_name.clone();
    }

    fn receive(&self, message: Message) {
        println!("{}", Self::format(&message));
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.try_send(message) {
                tracing::warn!("Dropping message for console consumer: {}", e);
            }
        }
    }

    fn trigger(&self, event: RobotEvent) {
        tracing::info!("Event {} {}", event.name(), event.payload());
    }
}
