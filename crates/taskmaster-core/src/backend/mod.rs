//! Task backend seam
//!
//! The hosted database owns the authoritative task collection. This module
//! defines the contract the sync store needs from it, plus two
//! implementations:
//!
//! - [`PocketBaseBackend`]: REST records API + Server-Sent Events realtime
//! - [`MemoryBackend`]: in-process collection, used by tests and embedders
//!
//! ## Contract
//!
//! 1. `list_tasks` returns the whole collection, newest first, with tags
//!    expanded
//! 2. `subscribe` opens a change feed that yields one event per
//!    create/update/delete; dropping the feed unsubscribes
//! 3. `create_task` / `update_task` / `delete_task` mutate the collection

mod memory;
mod pocketbase;
mod sse;

use std::future::Future;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::SyncResult;
use crate::models::{Task, TaskDraft};

pub use memory::MemoryBackend;
pub use pocketbase::{token_expiry, token_is_valid, AuthSession, AuthUser, PocketBaseBackend};
pub use sse::{SseDecoder, SseEvent};

/// Query parameters for a full collection fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Sort expression, `-` prefix for descending
    pub sort: String,
    /// Comma-separated relations to expand
    pub expand: String,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            sort: "-created".to_string(),
            expand: "tags".to_string(),
        }
    }
}

/// Kind of change reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

/// A change notification
///
/// The store only uses it as a trigger for a full refetch; the fields are
/// kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    pub record_id: String,
}

/// Receiving end of a backend change subscription
///
/// Dropping the feed stops the task that feeds it, which closes the
/// backend subscription.
pub struct ChangeFeed {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    pump: Option<AbortHandle>,
}

impl ChangeFeed {
    /// Feed backed by a channel the backend pushes into directly
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self { events, pump: None }
    }

    /// Feed backed by a background task that is aborted on drop
    pub fn with_pump(events: mpsc::UnboundedReceiver<ChangeEvent>, pump: AbortHandle) -> Self {
        Self {
            events,
            pump: Some(pump),
        }
    }

    /// Wait for the next change; `None` once the backend closed the feed
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Contract consumed by [`crate::store::TaskSyncStore`]
pub trait TaskBackend: Send + Sync + 'static {
    /// Fetch the full task collection
    fn list_tasks(&self, query: &ListQuery) -> impl Future<Output = SyncResult<Vec<Task>>> + Send;

    /// Open a change feed over the task collection
    fn subscribe(&self) -> impl Future<Output = SyncResult<ChangeFeed>> + Send;

    /// Create a task, returning the stored record
    fn create_task(&self, draft: &TaskDraft) -> impl Future<Output = SyncResult<Task>> + Send;

    /// Replace the writable fields of a task
    fn update_task(
        &self,
        id: &str,
        fields: &TaskDraft,
    ) -> impl Future<Output = SyncResult<Task>> + Send;

    /// Delete a task
    fn delete_task(&self, id: &str) -> impl Future<Output = SyncResult<()>> + Send;

    /// Cheap reachability check
    fn health(&self) -> impl Future<Output = SyncResult<()>> + Send;
}
