use serde::Serialize;
use std::fmt;

/// A chat user (or bot) known to the framework, keyed by its Slack id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub mention_name: String,
    /// Raw payload of the last profile update seen for this user
    pub metadata: serde_json::Value,
}

impl User {
    /// Minimal user built from nothing but an id
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            mention_name: id.clone(),
            id,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_mention_name(mut self, mention_name: impl Into<String>) -> Self {
        self.mention_name = mention_name.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
