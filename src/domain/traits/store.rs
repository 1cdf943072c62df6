use crate::domain::entities::{Room, User};

/// Keyed registry of users and rooms
pub trait EntityStore: Send + Sync {
    fn find_user(&self, id: &str) -> Option<User>;

    /// Look up a user, creating a minimal one if absent. Must be atomic.
    fn find_or_create_user(&self, id: &str) -> User;

    /// Insert or overwrite a user
    fn save_user(&self, user: User) -> User;

    fn find_room(&self, id: &str) -> Option<Room>;

    /// Insert or overwrite a room
    fn save_room(&self, room: Room) -> Room;
}

/// Read-only lookups used when decoding message markup
pub trait EntityLookup {
    fn user_mention_name(&self, id: &str) -> Option<String>;
    fn room_name(&self, id: &str) -> Option<String>;
}
