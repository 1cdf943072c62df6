use serde::Serialize;
use std::fmt;

/// Kind of conversation, implied by the first character of its id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoomKind {
    /// `C...`
    Channel,
    /// `G...`, shared by private groups and multi-party IMs
    Group,
    /// `D...`
    DirectMessage,
    Unknown,
}

impl RoomKind {
    pub fn from_id(id: &str) -> Self {
        match id.chars().next() {
            Some('C') => RoomKind::Channel,
            Some('G') => RoomKind::Group,
            Some('D') => RoomKind::DirectMessage,
            _ => RoomKind::Unknown,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, RoomKind::DirectMessage)
    }
}

/// A channel, group or IM known to the framework
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub kind: RoomKind,
    pub metadata: serde_json::Value,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            kind: RoomKind::from_id(&id),
            id,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A room as seen by a message source: resolved, or just the raw channel id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RoomRef {
    Known(Room),
    Unknown(String),
}

impl RoomRef {
    pub fn id(&self) -> &str {
        match self {
            RoomRef::Known(room) => &room.id,
            RoomRef::Unknown(id) => id,
        }
    }

    pub fn room(&self) -> Option<&Room> {
        match self {
            RoomRef::Known(room) => Some(room),
            RoomRef::Unknown(_) => None,
        }
    }
}

impl fmt::Display for RoomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomRef::Known(room) => write!(f, "#{}", room.name),
            RoomRef::Unknown(id) => write!(f, "{}", id),
        }
    }
}
