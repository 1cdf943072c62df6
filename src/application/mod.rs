//! Application layer - Use cases on top of the domain
//! 
//! This layer contains:
//! - Services: Entity resolution policy
//! - Errors: Error types shared by every layer

pub mod errors;
pub mod services;
