//! Domain entities - Objects shared between the adapter and the framework

pub mod user;
pub mod room;
pub mod message;
pub mod event;

pub use user::User;
pub use room::{Room, RoomKind, RoomRef};
pub use message::{Message, Source};
pub use event::{ReactionPayload, RobotEvent};
