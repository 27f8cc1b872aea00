//! Test Helper Utilities
//!
//! Shared setup for the tagsync-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tagsync_common::config::{AuthConfig, SyncConfig, TokenEntry};
use tagsync_common::events::EventBus;
use tagsync_common::{CanonicalTag, ProjectId, Result, StoredTag};
use tagsync_server::auth::{Authenticator, TokenAuthenticator};
use tagsync_server::db::TagStore;
use tagsync_server::reconcile::ReconcileEngine;
use tagsync_server::sync::{ServerMessage, SyncHub, SyncSession};
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_IDENTITY: &str = "engineer";

/// Non-persistent [`TagStore`] with the same upsert rules as SQLite
///
/// Never blocks outside the runtime, so it is safe under paused time.
#[derive(Default)]
pub struct MemoryTagStore {
    rows: Mutex<Vec<StoredTag>>,
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn list_tags(&self, project_id: ProjectId) -> Result<Vec<StoredTag>> {
        let rows = self.rows.lock().await;
        let mut tags: Vec<StoredTag> = rows
            .iter()
            .filter(|row| row.project_id == project_id)
            .cloned()
            .collect();
        tags.sort_by_key(|row| row.tag.name_key());
        Ok(tags)
    }

    async fn find_tag(&self, project_id: ProjectId, name: &str) -> Result<Option<StoredTag>> {
        let key = tagsync_common::model::name_key(name);
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|row| row.project_id == project_id && row.tag.name_key() == key)
            .cloned())
    }

    async fn upsert_tag(&self, project_id: ProjectId, tag: &CanonicalTag) -> Result<StoredTag> {
        let mut rows = self.rows.lock().await;
        let now = Utc::now();
        let key = tag.name_key();

        if let Some(row) = rows
            .iter_mut()
            .find(|row| row.project_id == project_id && row.tag.name_key() == key)
        {
            let name = std::mem::take(&mut row.tag.name);
            let is_generated = row.tag.is_generated;
            row.tag = tag.clone();
            row.tag.name = name;
            row.tag.is_generated = is_generated;
            row.updated_at = now;
            return Ok(row.clone());
        }

        let row = StoredTag {
            id: Uuid::new_v4(),
            project_id,
            tag: tag.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }
}

struct ListGate {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// [`MemoryTagStore`] whose next `list_tags` can be held after reading
#[derive(Default)]
pub struct GatedTagStore {
    pub inner: MemoryTagStore,
    gate: std::sync::Mutex<Option<ListGate>>,
}

impl GatedTagStore {
    /// The next `list_tags` reads its rows, signals the first receiver and
    /// returns only once the sender is used or dropped
    pub fn hold_next_list(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(ListGate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }
}

#[async_trait]
impl TagStore for GatedTagStore {
    async fn list_tags(&self, project_id: ProjectId) -> Result<Vec<StoredTag>> {
        let tags = self.inner.list_tags(project_id).await?;
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.await;
        }
        Ok(tags)
    }

    async fn find_tag(&self, project_id: ProjectId, name: &str) -> Result<Option<StoredTag>> {
        self.inner.find_tag(project_id, name).await
    }

    async fn upsert_tag(&self, project_id: ProjectId, tag: &CanonicalTag) -> Result<StoredTag> {
        self.inner.upsert_tag(project_id, tag).await
    }
}

pub fn token_auth_config() -> AuthConfig {
    AuthConfig {
        disabled: false,
        tokens: vec![TokenEntry {
            token: TEST_TOKEN.to_string(),
            identity: TEST_IDENTITY.to_string(),
        }],
    }
}

/// Hub over a [`MemoryTagStore`] accepting [`TEST_TOKEN`]
pub fn memory_hub() -> (Arc<SyncHub>, Arc<MemoryTagStore>) {
    let store = Arc::new(MemoryTagStore::default());
    (hub_over(store.clone()), store)
}

/// Hub over any store, accepting [`TEST_TOKEN`]
pub fn hub_over(store: Arc<dyn TagStore>) -> Arc<SyncHub> {
    let engine = Arc::new(ReconcileEngine::new(store));
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(TokenAuthenticator::new(token_auth_config(), None));
    Arc::new(SyncHub::new(
        engine,
        authenticator,
        EventBus::new(64),
        SyncConfig::default(),
    ))
}

/// Session plus the receiving end of its outbound queue
pub struct TestClient {
    pub session: SyncSession,
    pub rx: mpsc::Receiver<Arc<ServerMessage>>,
}

impl TestClient {
    pub fn new(hub: &Arc<SyncHub>) -> Self {
        let (tx, rx) = mpsc::channel(hub.config.outbound_queue);
        Self {
            session: SyncSession::new(hub.clone(), tx),
            rx,
        }
    }

    /// Authenticated, not yet subscribed
    pub async fn authenticated(hub: &Arc<SyncHub>) -> Self {
        let mut client = Self::new(hub);
        let reply = client.session.authenticate(Some(TEST_TOKEN)).await;
        assert!(matches!(reply, ServerMessage::Authenticated { .. }), "{:?}", reply);
        client
    }

    /// Authenticated and subscribed to `project_id`, snapshot consumed
    pub async fn subscribed(hub: &Arc<SyncHub>, project_id: ProjectId) -> Self {
        let mut client = Self::authenticated(hub).await;
        let reply = client
            .session
            .handle(tagsync_server::sync::ClientMessage::Subscribe { project_id })
            .await;
        assert_eq!(reply, None);
        let snapshot = client.next().await;
        assert!(
            matches!(snapshot, ServerMessage::Subscribed { project_id: p, .. } if p == project_id),
            "{:?}",
            snapshot
        );
        client
    }

    /// Next queued message, failing the test after 10 (virtual) seconds
    pub async fn next(&mut self) -> ServerMessage {
        let message = tokio::time::timeout(Duration::from_secs(10), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("outbound queue closed");
        (*message).clone()
    }

    /// Skip messages until a `syncComplete` arrives
    pub async fn next_sync_complete(&mut self) -> ServerMessage {
        loop {
            let message = self.next().await;
            if matches!(message, ServerMessage::SyncComplete { .. }) {
                return message;
            }
        }
    }

    /// Nothing queued after letting `wait` pass
    pub async fn assert_quiet(&mut self, wait: Duration) {
        tokio::time::sleep(wait).await;
        if let Ok(message) = self.rx.try_recv() {
            panic!("unexpected message: {:?}", message);
        }
    }
}
