//! Bridge between Slack's RTM event stream and a bot framework.
//!
//! The [`SlackAdapter`](infrastructure::adapters::slack::SlackAdapter) keeps
//! the stream open and publishes decoded messages and events into a
//! [`Robot`](domain::traits::Robot).

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::errors::{BotError, ConfigError};
pub use domain::entities::{Message, Room, RoomRef, RobotEvent, Source, User};
pub use domain::traits::{EntityStore, Robot};
pub use infrastructure::adapters::slack::{ConnectionState, SlackAdapter};
pub use infrastructure::config::{Config, SlackConfig};
pub use infrastructure::storage::MemoryStore;
