//! Application services - Business logic orchestration

pub mod entity_resolver;

pub use entity_resolver::EntityResolver;
