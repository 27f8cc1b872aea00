//! HTTP API handlers for tagsync-server
//!
//! REST for tags, bulk transfer and vendor utilities, SSE for
//! application events, and the `/ws` live sync endpoint.

pub mod auth;
pub mod bulk;
pub mod events;
pub mod health;
pub mod tags;
pub mod vendor;
pub mod ws;

pub use auth::{auth_middleware, Identity};
pub use bulk::bulk_routes;
pub use events::event_stream;
pub use health::health_routes;
pub use tags::tag_routes;
pub use vendor::vendor_routes;
pub use ws::sync_socket;

use tagsync_common::Vendor;

use crate::codec::ContainerFormat;
use crate::error::ApiResult;

/// Vendor query parameter; accepts names and the A/B/C letters
pub(crate) fn parse_vendor(raw: &str) -> ApiResult<Vendor> {
    Ok(raw.parse()?)
}

pub(crate) fn parse_format(raw: Option<&str>) -> ApiResult<Option<ContainerFormat>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}
