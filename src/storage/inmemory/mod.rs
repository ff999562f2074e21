//! In-memory storage implementations
//!
//! Suitable for development and testing. Nothing survives a restart.

mod oauth;

pub use oauth::MemoryOAuthStorage;
