//! Bulk import and export
//!
//! Single-shot transfer of a whole project through a vendor container.
//! Imports skip the debounce path entirely: decode, validate, reconcile,
//! then push the new tag set to live subscribers.

use chrono::Utc;
use serde::Serialize;
use tagsync_common::events::TagEvent;
use tagsync_common::{Diagnostic, ProjectId, Vendor};
use thiserror::Error;
use tracing::{info, warn};

use crate::codec::{CodecError, ContainerFormat};
use crate::reconcile::BatchOrigin;
use crate::sync::SyncHub;
use crate::vendor::{dialect, prepare_batch, translate_tag};

#[derive(Debug, Error)]
pub enum BulkError {
    /// The container was rejected as a whole; nothing was written
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] tagsync_common::Error),
}

/// Result of one import
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// The container decoded and the batch was reconciled
    pub success: bool,
    pub inserted_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
    /// Per-row and per-tag problems, in the order they were found
    pub errors: Vec<Diagnostic>,
}

/// An encoded project ready to download
#[derive(Debug, Clone)]
pub struct ExportedContainer {
    pub format: ContainerFormat,
    pub bytes: Vec<u8>,
    pub exported: usize,
    /// Tags with no representation in the target vendor
    pub skipped: Vec<Diagnostic>,
}

/// Decode `bytes` as a `vendor` container and merge it into the project
///
/// `format` is sniffed from the content when not given.
pub async fn import_container(
    hub: &SyncHub,
    project_id: ProjectId,
    vendor: Vendor,
    format: Option<ContainerFormat>,
    bytes: &[u8],
) -> Result<ImportSummary, BulkError> {
    let format = format.unwrap_or_else(|| ContainerFormat::sniff(bytes));
    let decoded = dialect(vendor).decode(bytes, format).map_err(|e| {
        warn!("Import into project {} rejected: {}", project_id, e);
        e
    })?;

    let mut errors = decoded.issues;
    let (accepted, issues) = prepare_batch(decoded.tags);
    errors.extend(issues);

    let report = hub
        .engine
        .reconcile(project_id, accepted, BatchOrigin::Import)
        .await?;
    errors.extend(report.errors);

    if let Err(e) = hub.broadcaster.broadcast_tags(project_id).await {
        warn!("Broadcast after import into project {} failed: {}", project_id, e);
    }

    hub.events.emit_lossy(TagEvent::ImportCompleted {
        project_id,
        vendor,
        inserted: report.inserted,
        updated: report.updated,
        errors: errors.len(),
        timestamp: Utc::now(),
    });

    info!(
        "Imported {} {} container into project {}: {} inserted, {} updated, {} issues",
        vendor,
        format,
        project_id,
        report.inserted,
        report.updated,
        errors.len()
    );

    Ok(ImportSummary {
        success: true,
        inserted_count: report.inserted,
        updated_count: report.updated,
        unchanged_count: report.unchanged,
        errors,
    })
}

/// Encode every tag of the project as a `vendor` container
///
/// Tags stored under another vendor are translated first; those without
/// an equivalent are left out and reported in `skipped`.
pub async fn export_container(
    hub: &SyncHub,
    project_id: ProjectId,
    vendor: Vendor,
    format: ContainerFormat,
) -> Result<ExportedContainer, BulkError> {
    let stored = hub.engine.store().list_tags(project_id).await?;

    let mut tags = Vec::with_capacity(stored.len());
    let mut skipped = Vec::new();
    for stored_tag in stored {
        let tag = stored_tag.tag;
        if tag.vendor == vendor {
            tags.push(tag);
            continue;
        }
        match translate_tag(&tag, vendor) {
            Ok(translated) => tags.push(translated),
            Err(e) => {
                warn!("Export of '{}' to {} skipped: {}", tag.name, vendor, e);
                skipped.push(e.to_diagnostic(&tag.name));
            }
        }
    }

    let bytes = dialect(vendor).encode(&tags, format)?;
    info!(
        "Exported {} tags of project {} as {} {} ({} skipped)",
        tags.len(),
        project_id,
        vendor,
        format,
        skipped.len()
    );

    Ok(ExportedContainer {
        format,
        bytes,
        exported: tags.len(),
        skipped,
    })
}
