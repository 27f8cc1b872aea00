//! Live sync wire messages
//!
//! JSON text frames, one flat object per message with a `type`
//! discriminator and camelCase fields.

use serde::{Deserialize, Serialize};
use tagsync_common::{Diagnostic, ProjectId, StoredTag, Vendor};

/// Client -> server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Credential for connections that did not send one on upgrade
    Auth { token: String },

    #[serde(rename_all = "camelCase")]
    Subscribe { project_id: ProjectId },

    Unsubscribe,

    #[serde(rename_all = "camelCase")]
    SyncEdit {
        vendor: Vendor,
        source_text: String,
        #[serde(default)]
        debounce_ms: Option<u64>,
        /// Source produced by a generator rather than typed by a user
        #[serde(default)]
        generated: bool,
    },

    Ping,
}

/// Server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Authenticated { identity: String },

    #[serde(rename_all = "camelCase")]
    Subscribed {
        project_id: ProjectId,
        tags: Vec<StoredTag>,
    },

    #[serde(rename_all = "camelCase")]
    Unsubscribed { project_id: ProjectId },

    /// Immediate acknowledgement of a `syncEdit`
    #[serde(rename_all = "camelCase")]
    SyncQueued { sync_id: u64 },

    /// Result of a debounced sync pass, sent to the requesting connection
    #[serde(rename_all = "camelCase")]
    SyncComplete {
        sync_id: u64,
        project_id: ProjectId,
        inserted: usize,
        updated: usize,
        unchanged: usize,
        diagnostics: Vec<Diagnostic>,
    },

    /// Full tag set after a reconciliation, sent to every subscriber
    #[serde(rename_all = "camelCase")]
    TagsUpdated {
        project_id: ProjectId,
        tags: Vec<StoredTag>,
    },

    Error { message: String },

    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
