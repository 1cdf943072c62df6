//! In-memory entity storage

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::entities::{Room, User};
use crate::domain::traits::EntityStore;

/// Process-lifetime user and room registry
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    rooms: RwLock<HashMap<String, Room>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}

impl EntityStore for MemoryStore {
    fn find_user(&self, id: &str) -> Option<User> {
        self.users.read().get(id).cloned()
    }

    fn find_or_create_user(&self, id: &str) -> User {
        if let Some(user) = self.users.read().get(id) {
            return user.clone();
        }
        // re-checked under the write lock so racing creators agree
        self.users
            .write()
            .entry(id.to_string())
            .or_insert_with(|| User::new(id))
            .clone()
    }

    fn save_user(&self, user: User) -> User {
        self.users.write().insert(user.id.clone(), user.clone());
        user
    }

    fn find_room(&self, id: &str) -> Option<Room> {
        self.rooms.read().get(id).cloned()
    }

    fn save_room(&self, room: Room) -> Room {
        self.rooms.write().insert(room.id.clone(), room.clone());
        room
    }
}
