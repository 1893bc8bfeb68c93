//! In-memory task backend
//!
//! Holds an authoritative collection in process and fans change events out
//! to every open feed, the way the hosted backend does. Network loss can be
//! simulated with [`MemoryBackend::set_online`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ChangeAction, ChangeEvent, ChangeFeed, ListQuery, TaskBackend};
use crate::error::{SyncError, SyncResult};
use crate::models::{short_id, Tag, Task, TaskDraft, TaskExpand};

const MEMORY_URL: &str = "memory://tasks";

#[derive(Debug)]
struct MemoryState {
    /// Records in creation order
    records: Vec<Task>,
    tags: HashMap<String, Tag>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeEvent>>,
    online: bool,
    list_calls: usize,
}

/// Shared in-memory backend; clones share the same collection
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                records: Vec::new(),
                tags: HashMap::new(),
                subscribers: Vec::new(),
                online: true,
                list_calls: 0,
            })),
        }
    }

    /// Register a tag so that task lists can expand it
    pub fn insert_tag(&self, tag: Tag) {
        self.lock().tags.insert(tag.id.clone(), tag);
    }

    /// Simulate losing or regaining the network
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Close every open feed, as a server dropping its realtime clients would
    pub fn close_feeds(&self) {
        let closed = std::mem::take(&mut self.lock().subscribers).len();
        debug!(closed, "closed change feeds");
    }

    /// Current authoritative collection, newest first
    pub fn records(&self) -> Vec<Task> {
        let state = self.lock();
        state.records.iter().rev().cloned().collect()
    }

    /// Number of `list_tasks` calls served so far
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Number of feeds that are still open
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves the data consistent; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_online(state: &MemoryState) -> SyncResult<()> {
        if state.online {
            Ok(())
        } else {
            Err(SyncError::network(MEMORY_URL, "backend unreachable"))
        }
    }

    fn validate(draft: &TaskDraft) -> SyncResult<()> {
        if draft.title.trim().is_empty() {
            return Err(SyncError::Validation {
                message: "Failed to validate record.".to_string(),
                fields: vec![("title".to_string(), "Cannot be blank.".to_string())],
            });
        }
        Ok(())
    }

    fn notify(state: &mut MemoryState, action: ChangeAction, record_id: &str) {
        let event = ChangeEvent {
            action,
            record_id: record_id.to_string(),
        };
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
        debug!(?action, record_id, "memory backend change");
    }

    fn expand(state: &MemoryState, task: &Task) -> Task {
        let mut task = task.clone();
        let tags = task
            .tags
            .iter()
            .filter_map(|id| state.tags.get(id).cloned())
            .collect();
        task.expand = Some(TaskExpand { tags });
        task
    }

    fn apply_draft(task: &mut Task, draft: &TaskDraft) {
        task.title = draft.title.clone();
        task.description = draft.description.clone();
        task.due_date = draft.due_date;
        task.priority = draft.priority;
        task.status = draft.status;
        task.tags = draft.tags.clone();
        task.subtasks = draft.subtasks.clone();
        task.attachments = draft.attachments.clone();
    }
}

fn now_string() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}

impl TaskBackend for MemoryBackend {
    async fn list_tasks(&self, query: &ListQuery) -> SyncResult<Vec<Task>> {
        let mut state = self.lock();
        Self::ensure_online(&state)?;
        state.list_calls += 1;

        let mut tasks: Vec<Task> = state.records.clone();
        if query.sort.starts_with('-') {
            tasks.reverse();
        }
        if query.expand.split(',').any(|e| e.trim() == "tags") {
            tasks = tasks.iter().map(|t| Self::expand(&state, t)).collect();
        }
        Ok(tasks)
    }

    async fn subscribe(&self) -> SyncResult<ChangeFeed> {
        let mut state = self.lock();
        Self::ensure_online(&state)?;

        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        Ok(ChangeFeed::new(rx))
    }

    async fn create_task(&self, draft: &TaskDraft) -> SyncResult<Task> {
        let mut state = self.lock();
        Self::ensure_online(&state)?;
        Self::validate(draft)?;

        let now = now_string();
        let mut task = Task {
            id: short_id(),
            collection_id: "memory".to_string(),
            collection_name: "tasks".to_string(),
            created: now.clone(),
            updated: now,
            title: String::new(),
            description: String::new(),
            due_date: draft.due_date,
            priority: draft.priority,
            status: draft.status,
            tags: Vec::new(),
            subtasks: Vec::new(),
            attachments: Vec::new(),
            expand: None,
        };
        Self::apply_draft(&mut task, draft);

        state.records.push(task.clone());
        Self::notify(&mut state, ChangeAction::Create, &task.id);
        Ok(task)
    }

    async fn update_task(&self, id: &str, fields: &TaskDraft) -> SyncResult<Task> {
        let mut state = self.lock();
        Self::ensure_online(&state)?;
        Self::validate(fields)?;

        let task = state
            .records
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SyncError::NotFound { id: id.to_string() })?;
        Self::apply_draft(task, fields);
        task.updated = now_string();
        let task = task.clone();

        Self::notify(&mut state, ChangeAction::Update, id);
        Ok(task)
    }

    async fn delete_task(&self, id: &str) -> SyncResult<()> {
        let mut state = self.lock();
        Self::ensure_online(&state)?;

        let pos = state
            .records
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| SyncError::NotFound { id: id.to_string() })?;
        state.records.remove(pos);

        Self::notify(&mut state, ChangeAction::Delete, id);
        Ok(())
    }

    async fn health(&self) -> SyncResult<()> {
        Self::ensure_online(&self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    #[tokio::test]
    async fn test_create_list_newest_first() {
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("first")).await.unwrap();
        backend.create_task(&TaskDraft::new("second")).await.unwrap();

        let tasks = backend.list_tasks(&ListQuery::default()).await.unwrap();
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert!(!tasks[0].id.is_empty());
        assert!(tasks[0].created_at().is_some());
    }

    #[tokio::test]
    async fn test_list_expands_tags() {
        let backend = MemoryBackend::new();
        backend.insert_tag(Tag {
            id: "t1".to_string(),
            name: "Work".to_string(),
            color: "#0000ff".to_string(),
        });
        backend
            .create_task(&TaskDraft::new("tagged").with_tag("t1").with_tag("missing"))
            .await
            .unwrap();

        let tasks = backend.list_tasks(&ListQuery::default()).await.unwrap();
        assert_eq!(tasks[0].expanded_tags().len(), 1);
        assert_eq!(tasks[0].expanded_tags()[0].name, "Work");
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let backend = MemoryBackend::new();
        let err = backend.create_task(&TaskDraft::new("  ")).await.unwrap_err();

        assert!(matches!(err, SyncError::Validation { .. }));
        assert!(backend.records().is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.set_online(false);

        assert!(backend.health().await.unwrap_err().is_network());
        assert!(backend
            .list_tasks(&ListQuery::default())
            .await
            .unwrap_err()
            .is_network());
        assert!(backend.subscribe().await.is_err());
        assert!(backend.create_task(&TaskDraft::new("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_feed_receives_every_change() {
        let backend = MemoryBackend::new();
        let mut feed = backend.subscribe().await.unwrap();

        let task = backend.create_task(&TaskDraft::new("a")).await.unwrap();
        backend
            .update_task(&task.id, &task.to_draft().with_status(TaskStatus::Completed))
            .await
            .unwrap();
        backend.delete_task(&task.id).await.unwrap();

        let actions = vec![
            feed.recv().await.unwrap().action,
            feed.recv().await.unwrap().action,
            feed.recv().await.unwrap().action,
        ];
        assert_eq!(
            actions,
            vec![ChangeAction::Create, ChangeAction::Update, ChangeAction::Delete]
        );
    }

    #[tokio::test]
    async fn test_dropped_feed_is_pruned() {
        let backend = MemoryBackend::new();
        let feed = backend.subscribe().await.unwrap();
        assert_eq!(backend.subscriber_count(), 1);

        drop(feed);
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_feeds_ends_open_feeds() {
        let backend = MemoryBackend::new();
        let mut feed = backend.subscribe().await.unwrap();

        backend.close_feeds();

        assert!(feed.recv().await.is_none());
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_record() {
        let backend = MemoryBackend::new();

        let err = backend
            .update_task("nope", &TaskDraft::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));

        let err = backend.delete_task("nope").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }
}
