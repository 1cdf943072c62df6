use crate::domain::entities::{Message, RobotEvent, User};

/// Robot trait - the bot framework façade the adapter publishes into
///
/// Calls are fire-and-forget: implementations must not block the read loop.
pub trait Robot: Send + Sync {
    /// Name the robot answers to, without the leading `@`
    fn mention_name(&self) -> String;

    /// Refresh the robot's own identity after its user record changed
    fn set_identity(&self, user: &User);

    /// Hand a decoded message to the framework for routing
    fn receive(&self, message: Message);

    /// Trigger a named event
    fn trigger(&self, event: RobotEvent);
}
