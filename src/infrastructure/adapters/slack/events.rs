//! Inbound RTM frames

use serde_json::Value;

use crate::domain::entities::{Room, User};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    pub text: Option<String>,
    pub fallback: Option<String>,
}

impl Attachment {
    pub fn from_data(data: &Value) -> Self {
        Self {
            text: str_field(data, "text"),
            fallback: str_field(data, "fallback"),
        }
    }

    /// `text`, or `fallback` when the attachment has no text
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().or(self.fallback.as_deref())
    }
}

/// A `message` frame. Fields of the wrong type read as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageEvent {
    pub subtype: Option<String>,
    pub user: Option<String>,
    /// Set instead of `user` on integration posts
    pub bot_id: Option<String>,
    pub username: Option<String>,
    pub channel: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub ts: Option<String>,
}

impl MessageEvent {
    pub fn from_data(data: &Value) -> Self {
        Self {
            subtype: str_field(data, "subtype"),
            user: str_field(data, "user"),
            bot_id: str_field(data, "bot_id"),
            username: str_field(data, "username"),
            channel: str_field(data, "channel"),
            text: str_field(data, "text"),
            attachments: data
                .get("attachments")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(Attachment::from_data).collect())
                .unwrap_or_default(),
            ts: str_field(data, "ts"),
        }
    }

    /// Id of whoever posted: the user, else the integration
    pub fn sender_id(&self) -> Option<&str> {
        self.user
            .as_deref()
            .or(self.bot_id.as_deref())
            .or(self.username.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionEvent {
    pub user: Option<String>,
    pub reaction: Option<String>,
    pub item_user: Option<String>,
    pub item: Value,
    pub event_ts: Option<String>,
}

impl ReactionEvent {
    pub fn from_data(data: &Value) -> Self {
        Self {
            user: str_field(data, "user"),
            reaction: str_field(data, "reaction"),
            item_user: str_field(data, "item_user"),
            item: data.get("item").cloned().unwrap_or(Value::Null),
            event_ts: str_field(data, "event_ts"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolError {
    pub code: Option<i64>,
    pub msg: Option<String>,
}

/// User or bot profile embedded in change events
#[derive(Debug, Clone, PartialEq)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub real_name: String,
    pub raw: Value,
}

impl SlackUser {
    /// Builds a profile from whatever fields are present; only `id` is required
    pub fn from_data(data: &Value) -> Option<Self> {
        let id = data.get("id")?.as_str()?.to_string();
        let name = str_field(data, "name").unwrap_or_default();
        let real_name = str_field(data, "real_name")
            .or_else(|| data.get("profile").and_then(|p| str_field(p, "real_name")))
            .unwrap_or_default();

        Some(Self {
            id,
            name,
            real_name,
            raw: data.clone(),
        })
    }
}

impl From<SlackUser> for User {
    fn from(slack: SlackUser) -> Self {
        let mut user = User::new(&slack.id);
        if !slack.name.is_empty() {
            user.mention_name = slack.name.clone();
        }
        user.name = if !slack.real_name.is_empty() {
            slack.real_name
        } else if !slack.name.is_empty() {
            slack.name
        } else {
            user.name
        };
        user.with_metadata(slack.raw)
    }
}

/// Channel or group embedded in change events
#[derive(Debug, Clone, PartialEq)]
pub struct SlackChannel {
    pub id: String,
    pub name: Option<String>,
    pub raw: Value,
}

impl SlackChannel {
    pub fn from_data(data: &Value) -> Option<Self> {
        let id = data.get("id")?.as_str()?.to_string();
        Some(Self {
            id,
            name: str_field(data, "name"),
            raw: data.clone(),
        })
    }
}

impl From<SlackChannel> for Room {
    fn from(slack: SlackChannel) -> Self {
        let room = Room::new(&slack.id).with_metadata(slack.raw);
        match slack.name {
            Some(name) => room.with_name(name),
            None => room,
        }
    }
}

/// A classified RTM frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Hello,
    Message(MessageEvent),
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    UserChange(Option<SlackUser>),
    TeamJoin(Option<SlackUser>),
    BotAdded(Option<SlackUser>),
    BotChanged(Option<SlackUser>),
    ChannelCreated(Option<SlackChannel>),
    ChannelRename(Option<SlackChannel>),
    GroupRename(Option<SlackChannel>),
    Error(ProtocolError),
    Unknown { kind: String, reply_to: Option<Value> },
}

impl InboundEvent {
    /// Parses a raw frame. Only invalid JSON is an error; everything else degrades.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(v: Value) -> Self {
        let kind = v.get("type").and_then(|t| t.as_str()).unwrap_or("").to_string();

        match kind.as_str() {
            "hello" => InboundEvent::Hello,
            "message" => InboundEvent::Message(MessageEvent::from_data(&v)),
            "reaction_added" => InboundEvent::ReactionAdded(ReactionEvent::from_data(&v)),
            "reaction_removed" => InboundEvent::ReactionRemoved(ReactionEvent::from_data(&v)),
            "user_change" => InboundEvent::UserChange(embedded_user(&v, "user")),
            "team_join" => InboundEvent::TeamJoin(embedded_user(&v, "user")),
            "bot_added" => InboundEvent::BotAdded(embedded_user(&v, "bot")),
            "bot_changed" => InboundEvent::BotChanged(embedded_user(&v, "bot")),
            "channel_created" => InboundEvent::ChannelCreated(embedded_channel(&v)),
            "channel_rename" => InboundEvent::ChannelRename(embedded_channel(&v)),
            "group_rename" => InboundEvent::GroupRename(embedded_channel(&v)),
            "error" => {
                let error = v.get("error");
                InboundEvent::Error(ProtocolError {
                    code: error.and_then(|e| e.get("code")).and_then(|c| c.as_i64()),
                    msg: error.and_then(|e| str_field(e, "msg")),
                })
            }
            _ => InboundEvent::Unknown {
                reply_to: v.get("reply_to").filter(|r| !r.is_null()).cloned(),
                kind: kind.clone(),
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::Hello => "hello",
            InboundEvent::Message(_) => "message",
            InboundEvent::ReactionAdded(_) => "reaction_added",
            InboundEvent::ReactionRemoved(_) => "reaction_removed",
            InboundEvent::UserChange(_) => "user_change",
            InboundEvent::TeamJoin(_) => "team_join",
            InboundEvent::BotAdded(_) => "bot_added",
            InboundEvent::BotChanged(_) => "bot_changed",
            InboundEvent::ChannelCreated(_) => "channel_created",
            InboundEvent::ChannelRename(_) => "channel_rename",
            InboundEvent::GroupRename(_) => "group_rename",
            InboundEvent::Error(_) => "error",
            InboundEvent::Unknown { kind, .. } => kind,
        }
    }
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn embedded_user(v: &Value, key: &str) -> Option<SlackUser> {
    v.get(key).and_then(SlackUser::from_data)
}

fn embedded_channel(v: &Value) -> Option<SlackChannel> {
    v.get("channel").and_then(SlackChannel::from_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message() {
        let event = InboundEvent::parse(
            r#"{"type":"message","channel":"C1","user":"U1","text":"hi","ts":"1355517523.000005",
                "attachments":[{"fallback":"fb"},{"text":"t"}]}"#,
        )
        .unwrap();

        let InboundEvent::Message(message) = event else {
            panic!("expected message event");
        };
        assert_eq!(message.channel.as_deref(), Some("C1"));
        assert_eq!(message.user.as_deref(), Some("U1"));
        assert_eq!(message.subtype, None);
        assert_eq!(message.attachments.len(), 2);
        assert_eq!(message.attachments[0].content(), Some("fb"));
        assert_eq!(message.attachments[1].content(), Some("t"));
    }

    #[test]
    fn test_malformed_message_degrades() {
        let event = InboundEvent::from_value(json!({"type": "message", "text": 42}));
        assert_eq!(event, InboundEvent::Message(MessageEvent::default()));
    }

    #[test]
    fn test_mistyped_fields_keep_the_rest() {
        let event = InboundEvent::from_value(json!({
            "type": "message", "channel": "C1", "user": "U1", "text": "hi",
            "attachments": null, "ts": 1355517523
        }));
        let InboundEvent::Message(message) = event else {
            panic!("expected message event");
        };
        assert_eq!(message.user.as_deref(), Some("U1"));
        assert_eq!(message.text.as_deref(), Some("hi"));
        assert!(message.attachments.is_empty());
        assert_eq!(message.ts, None);

        let event = InboundEvent::from_value(json!({
            "type": "reaction_added", "user": "U1", "reaction": ["thumbsup"],
            "item": {"type": "message", "channel": "C1"}
        }));
        let InboundEvent::ReactionAdded(reaction) = event else {
            panic!("expected reaction event");
        };
        assert_eq!(reaction.user.as_deref(), Some("U1"));
        assert_eq!(reaction.reaction, None);
        assert_eq!(reaction.item["channel"], "C1");
    }

    #[test]
    fn test_bot_message_sender() {
        let message = MessageEvent::from_data(&json!({
            "subtype": "bot_message", "bot_id": "B1", "username": "deploybot", "text": "done"
        }));
        assert_eq!(message.user, None);
        assert_eq!(message.sender_id(), Some("B1"));

        let message = MessageEvent::from_data(&json!({"user": "U1", "bot_id": "B1"}));
        assert_eq!(message.sender_id(), Some("U1"));
    }

    #[test]
    fn test_change_events_with_missing_payload() {
        assert_eq!(
            InboundEvent::from_value(json!({"type": "user_change"})),
            InboundEvent::UserChange(None)
        );
        assert_eq!(
            InboundEvent::from_value(json!({"type": "channel_rename", "channel": {"name": "x"}})),
            InboundEvent::ChannelRename(None)
        );
    }

    #[test]
    fn test_bot_payload_uses_bot_key() {
        let event = InboundEvent::from_value(json!({
            "type": "bot_changed",
            "bot": {"id": "B1", "name": "deploybot"}
        }));
        let InboundEvent::BotChanged(Some(bot)) = event else {
            panic!("expected bot payload");
        };
        let user: User = bot.into();
        assert_eq!(user.id, "B1");
        assert_eq!(user.name, "deploybot");
        assert_eq!(user.mention_name, "deploybot");
    }

    #[test]
    fn test_user_real_name_preferred() {
        let slack = SlackUser::from_data(&json!({
            "id": "U1", "name": "bob", "profile": {"real_name": "Bob Smith"}
        }))
        .unwrap();
        let user: User = slack.into();
        assert_eq!(user.name, "Bob Smith");
        assert_eq!(user.mention_name, "bob");
    }

    #[test]
    fn test_error_frame() {
        let event = InboundEvent::from_value(json!({
            "type": "error", "error": {"code": 1, "msg": "Socket URL has expired"}
        }));
        assert_eq!(
            event,
            InboundEvent::Error(ProtocolError {
                code: Some(1),
                msg: Some("Socket URL has expired".to_string()),
            })
        );
    }

    #[test]
    fn test_unknown_and_reply_frames() {
        let reply = InboundEvent::from_value(json!({"ok": true, "reply_to": 1, "ts": "1.2"}));
        assert_eq!(
            reply,
            InboundEvent::Unknown { kind: String::new(), reply_to: Some(json!(1)) }
        );

        let presence = InboundEvent::from_value(json!({"type": "presence_change"}));
        assert_eq!(presence.kind(), "presence_change");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(InboundEvent::parse("{not json").is_err());
    }
}
