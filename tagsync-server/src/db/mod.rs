//! Tag store gateway
//!
//! The only place that writes tag rows. Schema creation lives in
//! `tagsync_common::db`; this module reads and upserts rows in it.

pub mod tags;

pub use tags::{SqliteTagStore, TagStore};
