//! Event definitions and EventBus
//!
//! Application-wide notifications (reconciliation passes, imports, session
//! lifecycle) fan out through one `tokio::broadcast` channel. The SSE
//! endpoint is the main consumer; the live tag push to WebSocket
//! subscribers uses the dedicated subscriber registry instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{ProjectId, Vendor};

/// tagsync event types
///
/// Serialized with a `type` discriminator so SSE clients can dispatch
/// on it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TagEvent {
    /// A reconciliation pass finished for a project
    TagsReconciled {
        project_id: ProjectId,
        inserted: usize,
        updated: usize,
        errors: usize,
        timestamp: DateTime<Utc>,
    },

    /// A bulk import finished (successfully or with itemized errors)
    ImportCompleted {
        project_id: ProjectId,
        vendor: Vendor,
        inserted: usize,
        updated: usize,
        errors: usize,
        timestamp: DateTime<Utc>,
    },

    /// A live sync connection authenticated
    SessionOpened {
        session_id: Uuid,
        identity: String,
        timestamp: DateTime<Utc>,
    },

    /// A live sync connection went away
    SessionClosed {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl TagEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TagEvent::TagsReconciled { .. } => "TagsReconciled",
            TagEvent::ImportCompleted { .. } => "ImportCompleted",
            TagEvent::SessionOpened { .. } => "SessionOpened",
            TagEvent::SessionClosed { .. } => "SessionClosed",
        }
    }

    /// Project the event belongs to, if any
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            TagEvent::TagsReconciled { project_id, .. }
            | TagEvent::ImportCompleted { project_id, .. } => Some(*project_id),
            TagEvent::SessionOpened { .. } | TagEvent::SessionClosed { .. } => None,
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use tagsync_common::events::{EventBus, TagEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(TagEvent::TagsReconciled {
///     project_id: 7,
///     inserted: 1,
///     updated: 0,
///     errors: 0,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TagEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TagEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TagEvent) -> Result<usize, broadcast::error::SendError<TagEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TagEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
