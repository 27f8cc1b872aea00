//! Server-Sent Events for application events

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tagsync_common::sse::event_sse_stream;
use tagsync_common::ProjectId;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventParams {
    /// Only forward events for this project
    #[serde(default)]
    pub project: Option<ProjectId>,
}

/// GET /events
///
/// Streams `TagsReconciled`, `ImportCompleted`, `SessionOpened` and
/// `SessionClosed`.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(params): Query<EventParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_sse_stream(&state.event_bus, params.project)
}
