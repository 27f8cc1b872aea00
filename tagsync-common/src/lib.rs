//! # tagsync common library
//!
//! Shared code for the tagsync service:
//! - Canonical tag model and diagnostics
//! - Event types and EventBus
//! - Configuration loading and root folder resolution
//! - Bearer token hashing and storage
//! - Database initialization

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod model;
pub mod sse;

pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use error::{Error, Result};
pub use model::{AreaKind, CanonicalTag, Category, DataType, ProjectId, Scope, StoredTag, Vendor};
