//! Domain traits - Abstractions for the framework side of the bridge

pub mod robot;
pub mod store;

pub use robot::Robot;
pub use store::{EntityLookup, EntityStore};
