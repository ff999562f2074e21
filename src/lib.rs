//! Grant Store library crate.
//!
//! Persistence and lifecycle engine for an OAuth 2.0 / OpenID Connect authorization server:
//! client records, signature-keyed token and session artifacts, and cascading revocation.

pub mod config;
pub mod errors;
pub mod oauth;
pub mod storage;
