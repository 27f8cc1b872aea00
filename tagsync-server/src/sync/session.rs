//! Per-connection sync session
//!
//! Owns the connection's state, subscription and debounce slot. Dropping
//! the session cancels a pending sync and leaves the subscribed project.

use chrono::Utc;
use std::sync::Arc;
use tagsync_common::events::TagEvent;
use tagsync_common::{ProjectId, Vendor};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::debounce::{self, DebounceSlot};
use super::pipeline::{self, SyncRequest};
use super::protocol::{ClientMessage, ServerMessage};
use super::registry::Outbound;
use super::SyncHub;
use crate::reconcile::BatchOrigin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Subscribed(ProjectId),
}

pub struct SyncSession {
    id: Uuid,
    hub: Arc<SyncHub>,
    outbound: Outbound,
    state: SessionState,
    identity: Option<String>,
    debounce: DebounceSlot,
    closed: bool,
}

impl SyncSession {
    /// New unauthenticated session writing to `outbound`
    pub fn new(hub: Arc<SyncHub>, outbound: Outbound) -> Self {
        Self {
            id: Uuid::new_v4(),
            hub,
            outbound,
            state: SessionState::Unauthenticated,
            identity: None,
            debounce: DebounceSlot::new(),
            closed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Check a credential; the reply is `authenticated` or `error`
    pub async fn authenticate(&mut self, credential: Option<&str>) -> ServerMessage {
        if self.state != SessionState::Unauthenticated {
            return ServerMessage::error("already authenticated");
        }

        match self.hub.authenticator.authenticate(credential).await {
            Ok(identity) => {
                info!("Session {} authenticated as {}", self.id, identity);
                self.state = SessionState::Authenticated;
                self.identity = Some(identity.clone());
                self.hub.events.emit_lossy(TagEvent::SessionOpened {
                    session_id: self.id,
                    identity: identity.clone(),
                    timestamp: Utc::now(),
                });
                ServerMessage::Authenticated { identity }
            }
            Err(e) => {
                warn!("Session {} authentication failed: {}", self.id, e);
                ServerMessage::error(e.to_string())
            }
        }
    }

    /// Handle one inbound message; the immediate reply, if any, is returned
    ///
    /// Replies that must stay ordered against broadcasts (`subscribed`)
    /// are queued on the outbound queue instead.
    pub async fn handle(&mut self, message: ClientMessage) -> Option<ServerMessage> {
        match (message, self.state) {
            (ClientMessage::Ping, _) => Some(ServerMessage::Pong),

            (ClientMessage::Auth { token }, _) => Some(self.authenticate(Some(token.as_str())).await),

            (_, SessionState::Unauthenticated) => {
                Some(ServerMessage::error("authentication required"))
            }

            (ClientMessage::Subscribe { project_id }, _) => self.subscribe(project_id).await,

            (ClientMessage::Unsubscribe, SessionState::Subscribed(project_id)) => {
                self.leave(project_id);
                self.state = SessionState::Authenticated;
                Some(ServerMessage::Unsubscribed { project_id })
            }
            (ClientMessage::Unsubscribe, _) => Some(ServerMessage::error("not subscribed")),

            (
                ClientMessage::SyncEdit {
                    vendor,
                    source_text,
                    debounce_ms,
                    generated,
                },
                SessionState::Subscribed(project_id),
            ) => Some(self.sync_edit(project_id, vendor, source_text, debounce_ms, generated)),
            (ClientMessage::SyncEdit { .. }, _) => {
                Some(ServerMessage::error("subscribe to a project before syncing"))
            }
        }
    }

    /// Join a project; `subscribed` is queued by the broadcaster, so only
    /// a failure produces an immediate reply
    async fn subscribe(&mut self, project_id: ProjectId) -> Option<ServerMessage> {
        if let SessionState::Subscribed(previous) = self.state {
            self.leave(previous);
            self.state = SessionState::Authenticated;
        }

        match self
            .hub
            .broadcaster
            .join(project_id, self.id, &self.outbound)
            .await
        {
            Ok(count) => {
                self.state = SessionState::Subscribed(project_id);
                info!(
                    "Session {} subscribed to project {} ({} tags)",
                    self.id, project_id, count
                );
                None
            }
            Err(e) => {
                warn!("Session {}: loading project {} failed: {}", self.id, project_id, e);
                Some(ServerMessage::error(format!(
                    "cannot load project {}: {}",
                    project_id, e
                )))
            }
        }
    }

    fn sync_edit(
        &mut self,
        project_id: ProjectId,
        vendor: Vendor,
        source_text: String,
        debounce_ms: Option<u64>,
        generated: bool,
    ) -> ServerMessage {
        let sync_id = self.hub.next_sync_id();
        let delay = self.hub.config.debounce_delay(debounce_ms);
        let token = self.debounce.arm();

        let request = SyncRequest {
            sync_id,
            project_id,
            vendor,
            source_text,
            origin: if generated {
                BatchOrigin::Generated
            } else {
                BatchOrigin::Editor
            },
        };
        let hub = self.hub.clone();
        let outbound = self.outbound.clone();

        debug!("Session {}: sync {} armed for {:?}", self.id, sync_id, delay);
        tokio::spawn(async move {
            if !debounce::wait(&token, delay).await {
                debug!("Sync {} coalesced into a later edit", sync_id);
                return;
            }
            if let Some(reply) = pipeline::run_sync(&hub, request, &token).await {
                if outbound.send(Arc::new(reply)).await.is_err() {
                    debug!("Sync {} finished after its session closed", sync_id);
                }
            }
        });

        ServerMessage::SyncQueued { sync_id }
    }

    fn leave(&mut self, project_id: ProjectId) {
        self.debounce.cancel();
        self.hub.registry.unsubscribe(project_id, self.id);
    }

    /// Cancel pending work and leave the project; safe to call twice
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.debounce.cancel();
        if let SessionState::Subscribed(project_id) = self.state {
            self.hub.registry.unsubscribe(project_id, self.id);
        }
        if self.identity.is_some() {
            self.hub.events.emit_lossy(TagEvent::SessionClosed {
                session_id: self.id,
                timestamp: Utc::now(),
            });
        }
        self.state = SessionState::Unauthenticated;
        info!("Session {} closed", self.id);
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.close();
    }
}
