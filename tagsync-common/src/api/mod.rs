//! Shared API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//!
//! The server wraps these with axum middleware and the WebSocket handshake.

pub mod auth;

pub use auth::{hash_token, parse_bearer, ApiAuthError};
#[cfg(feature = "sqlx")]
pub use auth::{count_tokens, initialize_admin_token, lookup_token_identity, store_token};
