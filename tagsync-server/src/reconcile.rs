//! Reconciliation engine
//!
//! Merges a batch of prepared tags into a project's stored set:
//! update when the (case-insensitive) name exists, insert otherwise,
//! never delete. Batches for one project run one at a time; different
//! projects reconcile concurrently.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tagsync_common::{CanonicalTag, Diagnostic, DiagnosticCode, ProjectId, Result};
use tracing::{debug, info, warn};

use crate::db::TagStore;

/// Where a batch came from; decides `is_generated` for new rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOrigin {
    /// Live editor sync
    Editor,
    /// Machine-produced source (code generator, assistant)
    Generated,
    /// Bulk container import
    Import,
}

impl BatchOrigin {
    pub fn is_generated(&self) -> bool {
        matches!(self, BatchOrigin::Generated)
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Per-tag problems; the rest of the batch was still applied
    pub errors: Vec<Diagnostic>,
}

/// One async mutex per project, created on first use
#[derive(Default)]
pub(crate) struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProjectLocks {
    pub(crate) fn get(&self, project_id: ProjectId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(project_id).or_default().clone()
    }
}

pub struct ReconcileEngine {
    store: Arc<dyn TagStore>,
    locks: ProjectLocks,
}

impl ReconcileEngine {
    pub fn new(store: Arc<dyn TagStore>) -> Self {
        Self {
            store,
            locks: ProjectLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TagStore> {
        &self.store
    }

    /// Apply `batch` to the project
    ///
    /// Only failing to load the current tag set is an error; everything
    /// per tag is reported in [`ReconcileReport::errors`]. Later entries
    /// with an already seen name overwrite the earlier ones.
    pub async fn reconcile(
        &self,
        project_id: ProjectId,
        batch: Vec<CanonicalTag>,
        origin: BatchOrigin,
    ) -> Result<ReconcileReport> {
        let lock = self.locks.get(project_id);
        let _guard = lock.lock().await;

        let mut current: HashMap<String, CanonicalTag> = self
            .store
            .list_tags(project_id)
            .await?
            .into_iter()
            .map(|stored| (stored.tag.name_key(), stored.tag))
            .collect();

        let mut report = ReconcileReport::default();
        let mut seen = HashSet::new();

        for mut tag in batch {
            let key = tag.name_key();
            if !seen.insert(key.clone()) {
                report.errors.push(
                    Diagnostic::error(
                        DiagnosticCode::DuplicateName,
                        format!("duplicate tag name '{}' in batch; later entry applied", tag.name),
                    )
                    .for_tag(&tag.name),
                );
            }

            let exists = match current.get(&key) {
                Some(stored) if same_fields(stored, &tag) => {
                    report.unchanged += 1;
                    continue;
                }
                Some(_) => true,
                None => false,
            };

            tag.is_generated = origin.is_generated();
            match self.store.upsert_tag(project_id, &tag).await {
                Ok(stored) => {
                    if exists {
                        report.updated += 1;
                    } else {
                        report.inserted += 1;
                    }
                    current.insert(key, stored.tag);
                }
                Err(e) => {
                    warn!("Project {}: failed to store tag {}: {}", project_id, tag.name, e);
                    report.errors.push(
                        Diagnostic::error(DiagnosticCode::StoreConflict, e.to_string())
                            .for_tag(&tag.name),
                    );
                }
            }
        }

        info!(
            "Project {} reconciled ({:?}): {} inserted, {} updated, {} unchanged, {} errors",
            project_id,
            origin,
            report.inserted,
            report.updated,
            report.unchanged,
            report.errors.len()
        );
        debug!("Project {} now has {} tags", project_id, current.len());

        Ok(report)
    }
}

/// Mutable fields equal (name case and `is_generated` ignored)
fn same_fields(stored: &CanonicalTag, incoming: &CanonicalTag) -> bool {
    stored.data_type == incoming.data_type
        && stored.address == incoming.address
        && stored.scope == incoming.scope
        && stored.category == incoming.category
        && stored.default_value == incoming.default_value
        && stored.description == incoming.description
        && stored.vendor == incoming.vendor
}
