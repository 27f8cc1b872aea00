//! Project subscriber registry
//!
//! Maps a project to the outbound queues of the sessions subscribed to
//! it. One instance per process, created at startup and shared through
//! [`super::SyncHub`]. A project entry exists only while it has at least
//! one subscriber.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tagsync_common::ProjectId;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::protocol::ServerMessage;

/// Sending half of a session's outbound queue
pub type Outbound = mpsc::Sender<Arc<ServerMessage>>;

#[derive(Default)]
pub struct SubscriberRegistry {
    projects: RwLock<HashMap<ProjectId, HashMap<Uuid, Outbound>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, project_id: ProjectId, session_id: Uuid, outbound: Outbound) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        projects
            .entry(project_id)
            .or_default()
            .insert(session_id, outbound);
        debug!("Session {} subscribed to project {}", session_id, project_id);
    }

    /// Remove a session; drops the project entry once it is empty
    pub fn unsubscribe(&self, project_id: ProjectId, session_id: Uuid) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        if let Some(sessions) = projects.get_mut(&project_id) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                projects.remove(&project_id);
            }
        }
        debug!("Session {} left project {}", session_id, project_id);
    }

    /// Snapshot of a project's subscribers
    pub fn subscribers(&self, project_id: ProjectId) -> Vec<(Uuid, Outbound)> {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        projects
            .get(&project_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, project_id: ProjectId) -> usize {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        projects.get(&project_id).map_or(0, HashMap::len)
    }

    /// Number of projects with at least one subscriber
    pub fn project_count(&self) -> usize {
        self.projects.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_removed_when_empty() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry.subscribe(7, a, tx.clone());
        registry.subscribe(7, b, tx);
        assert_eq!(registry.subscriber_count(7), 2);

        registry.unsubscribe(7, a);
        assert_eq!(registry.project_count(), 1);
        registry.unsubscribe(7, b);
        assert_eq!(registry.project_count(), 0);
        assert!(registry.subscribers(7).is_empty());
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let registry = SubscriberRegistry::new();
        registry.unsubscribe(1, Uuid::new_v4());
        assert_eq!(registry.project_count(), 0);
    }
}
