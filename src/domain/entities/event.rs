use super::User;
use serde::Serialize;

/// Payload of `slack_reaction_added` / `slack_reaction_removed`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionPayload {
    pub user: User,
    pub name: String,
    pub item_user: User,
    pub item: serde_json::Value,
    pub event_ts: Option<String>,
}

/// Named events the adapter triggers on the robot
#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    Connected,
    Disconnected,
    ReactionAdded(ReactionPayload),
    ReactionRemoved(ReactionPayload),
    UserSaved(User),
}

impl RobotEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RobotEvent::Connected => "connected",
            RobotEvent::Disconnected => "disconnected",
            RobotEvent::ReactionAdded(_) => "slack_reaction_added",
            RobotEvent::ReactionRemoved(_) => "slack_reaction_removed",
            RobotEvent::UserSaved(_) => "slack_user_saved",
        }
    }

    /// Event payload as JSON, `null` for lifecycle events
    pub fn payload(&self) -> serde_json::Value {
        match self {
            RobotEvent::Connected | RobotEvent::Disconnected => serde_json::Value::Null,
            RobotEvent::ReactionAdded(payload) | RobotEvent::ReactionRemoved(payload) => {
                serde_json::to_value(payload).unwrap_or_default()
            }
            RobotEvent::UserSaved(user) => serde_json::to_value(user).unwrap_or_default(),
        }
    }
}
