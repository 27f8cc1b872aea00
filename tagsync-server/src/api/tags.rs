//! Stored tag listing

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tagsync_common::{ProjectId, StoredTag};

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/projects/:id/tags
pub async fn list_tags(
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Json<Vec<StoredTag>>> {
    let tags = state.store.list_tags(project_id).await?;
    Ok(Json(tags))
}

pub fn tag_routes() -> Router<AppState> {
    Router::new().route("/api/projects/:id/tags", get(list_tags))
}
