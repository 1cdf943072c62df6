//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: In-memory user and room registry
//! - Adapters: Platform integrations (Slack) and the console robot

pub mod config;
pub mod storage;
pub mod adapters;
