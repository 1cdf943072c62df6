use super::{RoomRef, User};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Where a message came from
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub user: User,
    pub room: Option<RoomRef>,
    pub private_message: bool,
}

impl Source {
    pub fn new(user: User, room: Option<RoomRef>) -> Self {
        Self {
            user,
            room,
            private_message: false,
        }
    }

    pub fn private_message(mut self) -> Self {
        self.private_message = true;
        self
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room.as_ref().map(RoomRef::id)
    }
}

/// A decoded inbound message, ready for framework-level routing
#[derive(Debug, Clone)]
pub struct Message {
    pub body: String,
    pub source: Source,
    pub command: bool,
    pub timestamp: DateTime<Utc>,
    /// Protocol metadata keyed by adapter name
    pub extensions: HashMap<String, serde_json::Value>,
}

impl Message {
    pub fn new(body: impl Into<String>, source: Source) -> Self {
        Self {
            body: body.into(),
            source,
            command: false,
            timestamp: Utc::now(),
            extensions: HashMap::new(),
        }
    }

    /// Mark the message as addressed to the robot
    pub fn command(mut self) -> Self {
        self.command = true;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn is_command(&self) -> bool {
        self.command
    }

    pub fn user(&self) -> &User {
        &self.source.user
    }

    /// Original Slack `ts` of the message, used to correlate replies and reactions
    pub fn slack_timestamp(&self) -> Option<&str> {
        self.extensions
            .get("slack")
            .and_then(|slack| slack.get("timestamp"))
            .and_then(|ts| ts.as_str())
    }
}
