//! Bulk import/export endpoints
//!
//! Import takes the raw container as the request body. A container that
//! fails to decode is answered with 400 and nothing is written.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tagsync_common::ProjectId;

use super::{parse_format, parse_vendor};
use crate::bulk::{export_container, import_container, ImportSummary};
use crate::codec::ContainerFormat;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Largest accepted import body
const MAX_IMPORT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct BulkParams {
    pub vendor: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// POST /api/projects/:id/import?vendor=&format=
pub async fn import_tags(
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Query(params): Query<BulkParams>,
    body: Bytes,
) -> ApiResult<Json<ImportSummary>> {
    let vendor = parse_vendor(&params.vendor)?;
    let format = parse_format(params.format.as_deref())?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("empty import body".to_string()));
    }

    let summary = import_container(&state.hub, project_id, vendor, format, &body).await?;
    Ok(Json(summary))
}

/// GET /api/projects/:id/export?vendor=&format=
///
/// Defaults to the delimited format. Tags that cannot be expressed for
/// the vendor are counted in `X-Skipped-Tags`.
pub async fn export_tags(
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Query(params): Query<BulkParams>,
) -> ApiResult<impl IntoResponse> {
    let vendor = parse_vendor(&params.vendor)?;
    let format = parse_format(params.format.as_deref())?.unwrap_or(ContainerFormat::Csv);

    let exported = export_container(&state.hub, project_id, vendor, format).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(exported.format.content_type()),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        exported.format.file_name(vendor, project_id)
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    headers.insert("x-skipped-tags", HeaderValue::from(exported.skipped.len()));

    Ok((headers, exported.bytes))
}

pub fn bulk_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:id/import",
            post(import_tags).layer(DefaultBodyLimit::max(MAX_IMPORT_BYTES)),
        )
        .route("/api/projects/:id/export", get(export_tags))
}
