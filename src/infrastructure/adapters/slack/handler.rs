//! Routes classified RTM events to the robot

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::events::{InboundEvent, MessageEvent, ProtocolError, ReactionEvent, SlackChannel, SlackUser};
use super::formatter;
use crate::application::services::EntityResolver;
use crate::domain::entities::{Message, ReactionPayload, RobotEvent, RoomKind, Source, User};
use crate::domain::traits::Robot;

/// Slack's own system user
const SLACKBOT_ID: &str = "USLACKBOT";

/// Subtype always dispatched: `/me` messages
const ME_MESSAGE: &str = "me_message";

/// Handles one event at a time. Never fails: bad input is logged and dropped.
pub struct MessageHandler {
    robot: Arc<dyn Robot>,
    resolver: EntityResolver,
    robot_id: String,
    supported_subtypes: Vec<String>,
}

impl MessageHandler {
    pub fn new(
        robot: Arc<dyn Robot>,
        resolver: EntityResolver,
        robot_id: impl Into<String>,
        supported_subtypes: &[String],
    ) -> Self {
        let mut supported_subtypes = supported_subtypes.to_vec();
        supported_subtypes.push(ME_MESSAGE.to_string());

        Self {
            robot,
            resolver,
            robot_id: robot_id.into(),
            supported_subtypes,
        }
    }

    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    pub fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::Hello => self.handle_hello(),
            InboundEvent::Message(message) => self.handle_message(message),
            InboundEvent::ReactionAdded(reaction) => self.handle_reaction(reaction, true),
            InboundEvent::ReactionRemoved(reaction) => self.handle_reaction(reaction, false),
            InboundEvent::UserChange(user) | InboundEvent::TeamJoin(user) => {
                debug!("Updating user data.");
                self.handle_user_change(user);
            }
            InboundEvent::BotAdded(bot) | InboundEvent::BotChanged(bot) => {
                debug!("Updating user data for bot.");
                self.handle_user_change(bot);
            }
            InboundEvent::ChannelCreated(channel)
            | InboundEvent::ChannelRename(channel)
            | InboundEvent::GroupRename(channel) => self.handle_channel_change(channel),
            InboundEvent::Error(error) => self.handle_error(error),
            InboundEvent::Unknown { kind, reply_to } => {
                if reply_to.is_none() {
                    debug!("{} event received from Slack and will be ignored.", kind);
                }
            }
        }
    }

    fn handle_hello(&self) {
        info!("Connected to Slack.");
        self.robot.trigger(RobotEvent::Connected);
    }

    fn supported_subtype(&self, subtype: Option<&str>) -> bool {
        match subtype {
            Some(subtype) => self.supported_subtypes.iter().any(|s| s == subtype),
            None => true,
        }
    }

    fn from_self(&self, user: &User) -> bool {
        user.id == self.robot_id
    }

    fn handle_message(&self, event: MessageEvent) {
        if !self.supported_subtype(event.subtype.as_deref()) {
            return;
        }
        let user = match event.sender_id() {
            Some(SLACKBOT_ID) => return,
            Some(id) => self.resolver.resolve_user(id),
            None => {
                debug!("Message without a sender id; dispatching from an anonymous user.");
                User::new("")
            }
        };
        if self.from_self(&user) {
            return;
        }

        self.dispatch_message(user, event);
    }

    fn dispatch_message(&self, user: User, event: MessageEvent) {
        let body = formatter::normalize(
            event.text.as_deref(),
            &event.attachments,
            &self.robot_id,
            &self.robot.mention_name(),
            &self.resolver,
        );

        let channel = event.channel.as_deref();
        let mut source = Source::new(
            user.clone(),
            channel.map(|id| self.resolver.resolve_channel(id)),
        );
        let private = channel.map(RoomKind::from_id) == Some(RoomKind::DirectMessage);
        if private {
            source = source.private_message();
        }

        let timestamp = event.ts.as_deref().and_then(parse_ts);
        let mut message = Message::new(body, source)
            .with_extension("slack", json!({ "timestamp": event.ts }));
        if let Some(timestamp) = timestamp {
            message = message.with_timestamp(timestamp);
        }
        if private {
            message = message.command();
        }

        debug!("Dispatching message to the robot from {}.", user.id);
        self.robot.receive(message);
    }

    fn handle_reaction(&self, event: ReactionEvent, added: bool) {
        debug!(
            "reaction_{} event received from Slack",
            if added { "added" } else { "removed" }
        );

        let Some(user_id) = event.user.as_deref() else {
            debug!("Reaction without a user received from Slack and will be ignored.");
            return;
        };
        let user = self.resolver.resolve_user(user_id);
        if self.from_self(&user) {
            return;
        }

        let item_user = match event.item_user.as_deref() {
            Some(id) => self.resolver.resolve_user(id),
            None => User::new(""),
        };

        let payload = ReactionPayload {
            user,
            name: event.reaction.unwrap_or_default(),
            item_user,
            item: event.item,
            event_ts: event.event_ts,
        };

        self.robot.trigger(if added {
            RobotEvent::ReactionAdded(payload)
        } else {
            RobotEvent::ReactionRemoved(payload)
        });
    }

    fn handle_user_change(&self, data: Option<SlackUser>) {
        let Some(data) = data else {
            debug!("User change without a user payload; nothing to update.");
            return;
        };

        let user = self.resolver.update_user(User::from(data));
        if self.from_self(&user) {
            self.robot.set_identity(&user);
        }
        self.robot.trigger(RobotEvent::UserSaved(user));
    }

    fn handle_channel_change(&self, data: Option<SlackChannel>) {
        debug!("Updating channel data.");
        match data {
            Some(channel) => {
                self.resolver.update_channel(channel.into());
            }
            None => debug!("Channel change without a channel payload; nothing to update."),
        }
    }

    fn handle_error(&self, error: ProtocolError) {
        error!(
            "Error with code {} received from Slack: {}",
            error.code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()),
            error.msg.as_deref().unwrap_or("")
        );
    }
}

/// Converts a Slack `ts` ("1355517523.000005") to a UTC timestamp
fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, micros) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = format!("{:0<6}", micros).get(..6)?.parse().ok()?;
    DateTime::from_timestamp(secs, micros * 1_000)
}
