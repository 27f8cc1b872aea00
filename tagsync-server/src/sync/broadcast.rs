//! Broadcast dispatcher
//!
//! Pushes a project's tag set to its subscribers. Delivery never waits:
//! a full or closed queue drops the message for that subscriber only.
//!
//! Joining a project and broadcasting to it take the same per-project
//! lock, so a subscriber's `subscribed` snapshot is always queued ahead
//! of any `tagsUpdated` carrying a newer tag set.

use std::sync::Arc;
use tagsync_common::{ProjectId, Result};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::ServerMessage;
use super::registry::{Outbound, SubscriberRegistry};
use crate::db::TagStore;
use crate::reconcile::ProjectLocks;

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    store: Arc<dyn TagStore>,
    locks: Arc<ProjectLocks>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>, store: Arc<dyn TagStore>) -> Self {
        Self {
            registry,
            store,
            locks: Arc::new(ProjectLocks::default()),
        }
    }

    /// Load the project's tags once and send `tagsUpdated` to every
    /// subscriber; returns how many queues accepted it
    pub async fn broadcast_tags(&self, project_id: ProjectId) -> Result<usize> {
        let lock = self.locks.get(project_id);
        let _guard = lock.lock().await;

        if self.registry.subscriber_count(project_id) == 0 {
            debug!("Project {} has no subscribers, skipping broadcast", project_id);
            return Ok(0);
        }

        let tags = self.store.list_tags(project_id).await?;
        Ok(self.deliver(project_id, ServerMessage::TagsUpdated { project_id, tags }))
    }

    /// Register a session with the project and queue `subscribed` with
    /// the current tag set to it; returns the number of tags sent
    ///
    /// Nothing is registered when loading the tags fails.
    pub async fn join(
        &self,
        project_id: ProjectId,
        session_id: Uuid,
        outbound: &Outbound,
    ) -> Result<usize> {
        let lock = self.locks.get(project_id);
        let _guard = lock.lock().await;

        let tags = self.store.list_tags(project_id).await?;
        let count = tags.len();
        self.registry.subscribe(project_id, session_id, outbound.clone());

        if outbound
            .send(Arc::new(ServerMessage::Subscribed { project_id, tags }))
            .await
            .is_err()
        {
            debug!("Session {} closed while joining project {}", session_id, project_id);
        }
        Ok(count)
    }

    /// Send one message to all subscribers of a project
    pub fn deliver(&self, project_id: ProjectId, message: ServerMessage) -> usize {
        let message = Arc::new(message);
        let mut delivered = 0;

        for (session_id, outbound) in self.registry.subscribers(project_id) {
            match outbound.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Session {} outbound queue full, dropping update", session_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Session {} already closed", session_id);
                }
            }
        }

        debug!("Project {}: delivered to {} subscribers", project_id, delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteTagStore;
    use tagsync_common::db::init_memory_database;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn broadcaster() -> (Broadcaster, Arc<SubscriberRegistry>) {
        let store = SqliteTagStore::new(init_memory_database().await.unwrap());
        let registry = Arc::new(SubscriberRegistry::new());
        (Broadcaster::new(registry.clone(), Arc::new(store)), registry)
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_others() {
        let (broadcaster, registry) = broadcaster().await;

        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        let (closed_tx, closed_rx) = mpsc::channel(8);
        drop(closed_rx);

        registry.subscribe(7, Uuid::new_v4(), slow_tx.clone());
        registry.subscribe(7, Uuid::new_v4(), fast_tx);
        registry.subscribe(7, Uuid::new_v4(), closed_tx);

        // Fill the slow queue
        slow_tx.try_send(Arc::new(ServerMessage::Pong)).unwrap();

        let delivered = broadcaster.broadcast_tags(7).await.unwrap();
        assert_eq!(delivered, 1);
        let message = fast_rx.try_recv().unwrap();
        assert!(matches!(*message, ServerMessage::TagsUpdated { project_id: 7, .. }));
    }

    #[tokio::test]
    async fn test_join_queues_snapshot_before_updates() {
        let (broadcaster, registry) = broadcaster().await;
        let (tx, mut rx) = mpsc::channel(8);
        let session = Uuid::new_v4();

        assert_eq!(broadcaster.join(3, session, &tx).await.unwrap(), 0);
        assert_eq!(registry.subscriber_count(3), 1);
        assert_eq!(broadcaster.broadcast_tags(3).await.unwrap(), 1);

        let first = rx.try_recv().unwrap();
        assert!(matches!(*first, ServerMessage::Subscribed { project_id: 3, .. }));
        let second = rx.try_recv().unwrap();
        assert!(matches!(*second, ServerMessage::TagsUpdated { project_id: 3, .. }));
    }

    #[tokio::test]
    async fn test_other_projects_not_notified() {
        let (broadcaster, registry) = broadcaster().await;
        let (tx7, mut rx7) = mpsc::channel(8);
        let (tx8, mut rx8) = mpsc::channel(8);
        registry.subscribe(7, Uuid::new_v4(), tx7);
        registry.subscribe(8, Uuid::new_v4(), tx8);

        assert_eq!(broadcaster.broadcast_tags(7).await.unwrap(), 1);
        assert!(rx7.try_recv().is_ok());
        assert!(rx8.try_recv().is_err());
    }
}
