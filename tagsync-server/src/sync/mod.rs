//! Live sync
//!
//! # Architecture
//!
//! - [`SyncHub`] is the process-wide context: reconciliation engine,
//!   subscriber registry, broadcaster, event bus and sync settings
//! - One [`SyncSession`] per connection drives the
//!   `Unauthenticated -> Authenticated -> Subscribed(project)` state machine
//! - `syncEdit` arms the session's [`DebounceSlot`]; the pass itself runs
//!   on its own task so the connection keeps reading control messages

pub mod broadcast;
pub mod debounce;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod session;

pub use broadcast::Broadcaster;
pub use debounce::DebounceSlot;
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{Outbound, SubscriberRegistry};
pub use session::{SessionState, SyncSession};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tagsync_common::config::SyncConfig;
use tagsync_common::events::EventBus;

use crate::auth::Authenticator;
use crate::reconcile::ReconcileEngine;

/// Shared state of all sync sessions
pub struct SyncHub {
    pub engine: Arc<ReconcileEngine>,
    pub registry: Arc<SubscriberRegistry>,
    pub broadcaster: Broadcaster,
    pub authenticator: Arc<dyn Authenticator>,
    pub events: EventBus,
    pub config: SyncConfig,
    next_sync_id: AtomicU64,
}

impl SyncHub {
    pub fn new(
        engine: Arc<ReconcileEngine>,
        authenticator: Arc<dyn Authenticator>,
        events: EventBus,
        config: SyncConfig,
    ) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone(), engine.store().clone());
        Self {
            engine,
            registry,
            broadcaster,
            authenticator,
            events,
            config,
            next_sync_id: AtomicU64::new(1),
        }
    }

    /// Monotonically increasing per process
    pub fn next_sync_id(&self) -> u64 {
        self.next_sync_id.fetch_add(1, Ordering::Relaxed)
    }
}
