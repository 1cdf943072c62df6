//! Domain layer - Core business objects with no network dependencies
//! 
//! This layer contains:
//! - Entities: Users, rooms, normalized messages and robot events
//! - Traits: Abstractions the adapter talks to (Robot, EntityStore)

pub mod entities;
pub mod traits;
