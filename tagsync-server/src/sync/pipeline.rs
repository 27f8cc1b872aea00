//! Debounced sync pass
//!
//! extract -> translate/validate -> reconcile -> broadcast. Cancellation is
//! honoured up to the point where reconciliation starts; after that the
//! pass runs to completion even if nobody is left to receive the result.

use chrono::Utc;
use tagsync_common::events::TagEvent;
use tagsync_common::{ProjectId, Vendor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::ServerMessage;
use super::SyncHub;
use crate::reconcile::BatchOrigin;
use crate::vendor::{dialect, prepare_batch};

/// One armed `syncEdit`
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub sync_id: u64,
    pub project_id: ProjectId,
    pub vendor: Vendor,
    pub source_text: String,
    pub origin: BatchOrigin,
}

/// Run a sync pass; `None` when it was cancelled before reconciling
pub async fn run_sync(
    hub: &SyncHub,
    request: SyncRequest,
    cancel: &CancellationToken,
) -> Option<ServerMessage> {
    let SyncRequest {
        sync_id,
        project_id,
        vendor,
        source_text,
        origin,
    } = request;

    let extraction = dialect(vendor).extract(&source_text);
    if cancel.is_cancelled() {
        debug!("Sync {} superseded after extraction", sync_id);
        return None;
    }

    let (tags, mut diagnostics) = extraction.into_canonical();
    let (accepted, issues) = prepare_batch(tags);
    diagnostics.extend(issues);
    if cancel.is_cancelled() {
        debug!("Sync {} superseded after translation", sync_id);
        return None;
    }

    let report = match hub.engine.reconcile(project_id, accepted, origin).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Sync {} for project {} failed: {}", sync_id, project_id, e);
            return Some(ServerMessage::error(format!("sync {} failed: {}", sync_id, e)));
        }
    };

    match hub.broadcaster.broadcast_tags(project_id).await {
        Ok(delivered) => debug!("Sync {}: tagsUpdated sent to {} sessions", sync_id, delivered),
        Err(e) => warn!("Sync {}: broadcast for project {} failed: {}", sync_id, project_id, e),
    }

    hub.events.emit_lossy(TagEvent::TagsReconciled {
        project_id,
        inserted: report.inserted,
        updated: report.updated,
        errors: report.errors.len(),
        timestamp: Utc::now(),
    });

    info!(
        "Sync {} complete for project {} ({} diagnostics)",
        sync_id,
        project_id,
        diagnostics.len() + report.errors.len()
    );

    diagnostics.extend(report.errors);
    Some(ServerMessage::SyncComplete {
        sync_id,
        project_id,
        inserted: report.inserted,
        updated: report.updated,
        unchanged: report.unchanged,
        diagnostics,
    })
}
