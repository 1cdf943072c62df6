use std::sync::Arc;

use crate::domain::entities::{Room, RoomRef, User};
use crate::domain::traits::{EntityLookup, EntityStore};

/// Maps Slack ids to framework users and rooms
///
/// Users are created on first reference. Rooms are only ever created by
/// explicit updates; an unknown room resolves to its raw id.
#[derive(Clone)]
pub struct EntityResolver {
    store: Arc<dyn EntityStore>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub fn find_user(&self, id: &str) -> Option<User> {
        self.store.find_user(id)
    }

    pub fn resolve_user(&self, id: &str) -> User {
        self.store.find_or_create_user(id)
    }

    pub fn resolve_channel(&self, id: &str) -> RoomRef {
        match self.store.find_room(id) {
            Some(room) => RoomRef::Known(room),
            None => RoomRef::Unknown(id.to_string()),
        }
    }

    pub fn update_user(&self, user: User) -> User {
        tracing::debug!("Saving user {} ({})", user.id, user.mention_name);
        self.store.save_user(user)
    }

    pub fn update_channel(&self, room: Room) -> Room {
        tracing::debug!("Saving room {} ({})", room.id, room.name);
        self.store.save_room(room)
    }
}

impl EntityLookup for EntityResolver {
    fn user_mention_name(&self, id: &str) -> Option<String> {
        self.store.find_user(id).map(|user| user.mention_name)
    }

    fn room_name(&self, id: &str) -> Option<String> {
        self.store.find_room(id).map(|room| room.name)
    }
}
