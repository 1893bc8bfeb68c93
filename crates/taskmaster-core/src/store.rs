//! Task sync store
//!
//! The `TaskSyncStore` owns the client-side snapshot of the task
//! collection and keeps it eventually consistent with the backend:
//!
//! - `fetch_all` replaces the whole snapshot from a full backend fetch
//! - `subscribe_to_changes` refetches on every change-feed event
//! - mutations go straight to the backend; the change feed brings the
//!   result back into the snapshot
//!
//! ## Invalidate, then reload
//!
//! There is no incremental patching. Every change notification causes a
//! full refetch, and every fetch result replaces the snapshot wholesale.
//! A fetch that resolves after a newer one has been applied is discarded,
//! so overlapping fetches never roll the snapshot back.
//!
//! ## Failure handling
//!
//! A failed fetch marks the store offline and keeps the previous snapshot,
//! unless a newer fetch has already reported in. Failed mutations are logged, recorded in `last_error` and returned to
//! the caller; network failures also mark the store offline. Nothing is
//! retried automatically.
//!
//! When the backend closes the change feed, `SyncState::is_live` turns
//! false and the subscription goes inactive; callers decide when to
//! resubscribe.
//!
//! ## Usage
//!
//! ```ignore
//! let store = TaskSyncStore::new(PocketBaseBackend::from_config(&config));
//! let subscription = store.start().await;
//!
//! store.add_task(&TaskDraft::new("Write report")).await?;
//! let tasks = store.tasks();
//!
//! drop(subscription); // stops live updates
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{ListQuery, TaskBackend};
use crate::connectivity::Connectivity;
use crate::error::SyncResult;
use crate::models::{Task, TaskDraft};
use crate::storage::{SnapshotCache, StorageError};

/// Observable state of the store
///
/// Rebuilt wholesale on every applied fetch; consumers only ever see
/// clones of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    tasks: Vec<Task>,
    is_offline: bool,
    in_flight: usize,
    last_synced: Option<DateTime<Utc>>,
    last_error: Option<String>,
    generation: u64,
    /// Fetch whose success or failure `is_offline` and `last_error` reflect
    outcome: u64,
    /// Id of the change subscription currently delivering updates
    feed: Option<u64>,
}

impl SyncState {
    /// Tasks in the order of the last fetch (newest created first)
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Look up a task by id
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Whether at least one fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Whether the backend is believed to be unreachable
    pub fn is_offline(&self) -> bool {
        self.is_offline
    }

    /// When the displayed snapshot was fetched
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    /// Message of the most recent failed backend call
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Sequence number of the fetch whose result is displayed (0 = none)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a change subscription is delivering live updates
    pub fn is_live(&self) -> bool {
        self.feed.is_some()
    }
}

/// Snapshot cache plus the fetch sequence number last written to it
struct CacheSlot {
    cache: SnapshotCache,
    written: u64,
}

struct StoreInner<B> {
    backend: B,
    query: ListQuery,
    state: Arc<watch::Sender<SyncState>>,
    /// Last fetch sequence number handed out
    fetch_seq: AtomicU64,
    /// Last subscription id handed out
    feed_seq: AtomicU64,
    /// Cleared by `shutdown`; late results are dropped afterwards
    alive: AtomicBool,
    cache: Option<Arc<Mutex<CacheSlot>>>,
}

/// Client-side task snapshot kept in sync with a [`TaskBackend`]
///
/// Cloning is cheap and every clone shares the same snapshot.
pub struct TaskSyncStore<B: TaskBackend> {
    inner: Arc<StoreInner<B>>,
}

impl<B: TaskBackend> Clone for TaskSyncStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Keeps `in_flight` balanced even if a fetch future is dropped mid-await
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SyncState>,
}

impl<'a> LoadingGuard<'a> {
    fn enter(state: &'a watch::Sender<SyncState>) -> Self {
        state.send_modify(|s| s.in_flight += 1);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.in_flight = s.in_flight.saturating_sub(1));
    }
}

impl<B: TaskBackend> TaskSyncStore<B> {
    /// Create a store with an empty snapshot
    pub fn new(backend: B) -> Self {
        Self::build(backend, SyncState::default(), None)
    }

    /// Create a store seeded from, and writing through to, a snapshot cache
    ///
    /// The cached snapshot is served until the first successful fetch.
    pub fn with_cache(backend: B, cache: SnapshotCache) -> Self {
        let mut initial = SyncState::default();

        match cache.load() {
            Ok(tasks) => initial.tasks = tasks,
            Err(e) => warn!("Ignoring unreadable snapshot cache: {}", e),
        }
        initial.last_synced = cache.last_synced().unwrap_or_else(|e| {
            warn!("Failed to read cache metadata: {}", e);
            None
        });
        debug!(count = initial.tasks.len(), "seeded snapshot from cache");

        let slot = CacheSlot { cache, written: 0 };
        Self::build(backend, initial, Some(Arc::new(Mutex::new(slot))))
    }

    /// Apply an initial connectivity reading
    pub fn with_connectivity(self, connectivity: Connectivity) -> Self {
        self.set_connectivity(connectivity);
        self
    }

    fn build(backend: B, initial: SyncState, cache: Option<Arc<Mutex<CacheSlot>>>) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(StoreInner {
                backend,
                query: ListQuery::default(),
                state: Arc::new(state),
                fetch_seq: AtomicU64::new(0),
                feed_seq: AtomicU64::new(0),
                alive: AtomicBool::new(true),
                cache,
            }),
        }
    }

    /// The backend this store talks to
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    // ==================== Read-only views ====================

    /// Clone of the current state
    pub fn snapshot(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    /// Clone of the current task list
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.state.borrow().tasks.clone()
    }

    /// Clone of a single task
    pub fn task(&self, id: &str) -> Option<Task> {
        self.inner.state.borrow().task(id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn is_offline(&self) -> bool {
        self.inner.state.borrow().is_offline
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    // ==================== Lifecycle ====================

    /// Initial fetch followed by a change subscription
    ///
    /// A failed subscription is logged and leaves the store usable without
    /// live updates.
    pub async fn start(&self) -> Option<Subscription> {
        if let Err(e) = self.fetch_all().await {
            debug!("initial fetch failed: {}", e);
        }

        match self.subscribe_to_changes().await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!("Realtime subscribe failed: {}", e);
                None
            }
        }
    }

    /// Stop applying results; in-flight fetches resolve into nothing
    pub fn shutdown(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        info!("task store shut down");
    }

    fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    // ==================== Sync ====================

    /// Replace the snapshot with a full fetch from the backend
    ///
    /// Returns the number of fetched tasks. On failure the store is marked
    /// offline and the previous snapshot is kept. Results that resolve after
    /// a newer fetch has been applied change nothing.
    pub async fn fetch_all(&self) -> SyncResult<usize> {
        self.fetch_with_liveness(None).await
    }

    /// Manual re-sync ("Sync Now")
    pub async fn sync_tasks(&self) -> SyncResult<usize> {
        info!("manual sync requested");
        self.fetch_all().await
    }

    async fn fetch_with_liveness(&self, liveness: Option<&AtomicBool>) -> SyncResult<usize> {
        let seq = self.inner.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let result = {
            let _loading = LoadingGuard::enter(&self.inner.state);
            self.inner.backend.list_tasks(&self.inner.query).await
        };

        let live = || self.is_alive() && liveness.map_or(true, |f| f.load(Ordering::SeqCst));

        match result {
            Ok(tasks) => {
                let count = tasks.len();
                let now = Utc::now();
                let mut stale = false;
                let cached = self.inner.cache.is_some().then(|| tasks.clone());

                let applied = self.inner.state.send_if_modified(|s| {
                    if !live() {
                        return false;
                    }
                    if seq <= s.generation {
                        stale = true;
                        return false;
                    }
                    s.tasks = tasks;
                    s.generation = seq;
                    s.last_synced = Some(now);
                    if seq > s.outcome {
                        s.outcome = seq;
                        s.is_offline = false;
                        s.last_error = None;
                    }
                    true
                });

                if applied {
                    debug!(count, seq, "snapshot replaced");
                    if let Some(tasks) = cached {
                        self.persist_snapshot(seq, tasks, now).await;
                    }
                } else if stale {
                    debug!(seq, "discarding fetch older than displayed snapshot");
                } else {
                    debug!(seq, "discarding fetch after teardown");
                }
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to fetch tasks: {}", e);
                let message = e.to_string();
                let mut stale = false;

                self.inner.state.send_if_modified(|s| {
                    if !live() {
                        return false;
                    }
                    if seq <= s.outcome {
                        stale = true;
                        return false;
                    }
                    s.outcome = seq;
                    s.is_offline = true;
                    s.last_error = Some(message);
                    true
                });

                if stale {
                    debug!(seq, "ignoring failure of a fetch older than the last result");
                }
                Err(e)
            }
        }
    }

    /// Write an applied snapshot to the cache off the async workers
    ///
    /// A write older than the one already cached is skipped.
    async fn persist_snapshot(&self, seq: u64, tasks: Vec<Task>, synced_at: DateTime<Utc>) {
        let Some(ref slot) = self.inner.cache else {
            return;
        };

        let slot = Arc::clone(slot);
        let written = tokio::task::spawn_blocking(move || {
            let mut slot = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if seq <= slot.written {
                return Ok(false);
            }
            slot.cache.replace_all(&tasks, synced_at)?;
            slot.written = seq;
            Ok::<_, StorageError>(true)
        })
        .await;

        match written {
            Ok(Ok(true)) => debug!(seq, "snapshot cached"),
            Ok(Ok(false)) => debug!(seq, "newer snapshot already cached"),
            Ok(Err(e)) => warn!("Failed to write snapshot cache: {}", e),
            Err(e) => warn!("Snapshot cache writer failed: {}", e),
        }
    }

    /// Open the backend change feed; each event triggers a full refetch
    ///
    /// Events are not de-duplicated or merged. The returned handle stops
    /// the feed when unsubscribed or dropped. If the backend closes the
    /// feed, `SyncState::is_live` turns false and the handle goes inactive.
    pub async fn subscribe_to_changes(&self) -> SyncResult<Subscription> {
        let mut feed = self.inner.backend.subscribe().await?;
        let id = self.inner.feed_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_modify(|s| s.feed = Some(id));

        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);
        let store = self.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                if !flag.load(Ordering::SeqCst) || !store.is_alive() {
                    break;
                }
                debug!(action = ?event.action, record = %event.record_id, "change received, refetching");
                let _ = store.fetch_with_liveness(Some(&flag)).await;
            }

            if flag.swap(false, Ordering::SeqCst) && store.is_alive() {
                warn!("Change feed closed by the backend; live updates stopped");
                release_feed(&store.inner.state, id);
            }
        });

        info!(feed = id, "subscribed to task changes");
        Ok(Subscription {
            id,
            active,
            state: Arc::clone(&self.inner.state),
            task: Some(task),
        })
    }

    // ==================== Mutations ====================

    /// Create a task on the backend
    ///
    /// The snapshot picks the new record up from the change feed.
    pub async fn add_task(&self, draft: &TaskDraft) -> SyncResult<Task> {
        let result = self.inner.backend.create_task(draft).await;
        self.note_mutation("add", result)
    }

    /// Send a full-record update for `task`
    pub async fn update_task(&self, task: &Task) -> SyncResult<Task> {
        let result = self
            .inner
            .backend
            .update_task(&task.id, &task.to_draft())
            .await;
        self.note_mutation("update", result)
    }

    /// Delete a task on the backend
    pub async fn delete_task(&self, id: &str) -> SyncResult<()> {
        let result = self.inner.backend.delete_task(id).await;
        self.note_mutation("delete", result)
    }

    fn note_mutation<T>(&self, operation: &str, result: SyncResult<T>) -> SyncResult<T> {
        if let Err(ref e) = result {
            warn!("Failed to {} task: {}", operation, e);
            let offline = e.is_network();
            let message = e.to_string();
            self.inner.state.send_modify(|s| {
                s.last_error = Some(message);
                if offline {
                    s.is_offline = true;
                }
            });
        }
        result
    }

    // ==================== Connectivity ====================

    /// Apply a connectivity signal
    ///
    /// Going offline flips the flag immediately; coming back online clears
    /// it without refetching.
    pub fn set_connectivity(&self, connectivity: Connectivity) {
        let offline = connectivity == Connectivity::Offline;
        let changed = self.inner.state.send_if_modified(|s| {
            if s.is_offline == offline {
                return false;
            }
            s.is_offline = offline;
            true
        });

        if changed {
            info!(?connectivity, "connectivity changed");
        }
    }

    /// Apply every signal received on `signals` until it closes
    pub fn watch_connectivity(&self, mut signals: mpsc::Receiver<Connectivity>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            while let Some(connectivity) = signals.recv().await {
                if !store.is_alive() {
                    break;
                }
                store.set_connectivity(connectivity);
            }
        })
    }
}

/// Clear the live marker if `id` is still the current subscription
fn release_feed(state: &watch::Sender<SyncState>, id: u64) {
    state.send_if_modified(|s| {
        if s.feed != Some(id) {
            return false;
        }
        s.feed = None;
        true
    });
}

/// Handle for a live change subscription
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    state: Arc<watch::Sender<SyncState>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Whether the subscription still delivers changes
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
            && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop delivering changes
    ///
    /// After this returns, no fetch triggered by this subscription will
    /// replace the snapshot.
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            release_feed(&self.state, self.id);
            debug!(feed = self.id, "unsubscribed from task changes");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::TaskStatus;
    use std::time::Duration;

    async fn settle<F>(store: &TaskSyncStore<MemoryBackend>, predicate: F)
    where
        F: FnMut(&SyncState) -> bool,
    {
        let mut rx = store.watch();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
            .await
            .expect("store did not settle")
            .expect("store dropped");
    }

    #[tokio::test]
    async fn test_new_store_is_empty_and_idle() {
        let store = TaskSyncStore::new(MemoryBackend::new());
        let state = store.snapshot();

        assert!(state.tasks().is_empty());
        assert!(!state.is_loading());
        assert!(!state.is_offline());
        assert_eq!(state.generation(), 0);
    }

    #[tokio::test]
    async fn test_fetch_all_replaces_snapshot() {
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("one")).await.unwrap();
        backend.create_task(&TaskDraft::new("two")).await.unwrap();
        let store = TaskSyncStore::new(backend);

        let count = store.fetch_all().await.unwrap();

        assert_eq!(count, 2);
        let titles: Vec<_> = store.tasks().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["two", "one"]);
        assert!(!store.is_loading());
        assert!(store.snapshot().last_synced().is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_snapshot_and_goes_offline() {
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("kept")).await.unwrap();
        let store = TaskSyncStore::new(backend.clone());
        store.fetch_all().await.unwrap();
        let before = store.tasks();

        backend.set_online(false);
        let err = store.fetch_all().await.unwrap_err();

        assert!(err.is_network());
        assert!(store.is_offline());
        assert!(!store.is_loading());
        assert_eq!(store.tasks(), before);
        assert!(store.snapshot().last_error().is_some());
    }

    #[tokio::test]
    async fn test_successful_sync_clears_offline() {
        let backend = MemoryBackend::new();
        let store = TaskSyncStore::new(backend.clone());

        backend.set_online(false);
        assert!(store.fetch_all().await.is_err());
        assert!(store.is_offline());

        backend.set_online(true);
        backend.create_task(&TaskDraft::new("fresh")).await.unwrap();
        store.sync_tasks().await.unwrap();

        assert!(!store.is_offline());
        assert_eq!(store.tasks().len(), 1);
        assert!(store.snapshot().last_error().is_none());
    }

    #[tokio::test]
    async fn test_mutations_do_not_touch_snapshot_directly() {
        let store = TaskSyncStore::new(MemoryBackend::new());

        let created = store.add_task(&TaskDraft::new("later")).await.unwrap();

        assert!(store.tasks().is_empty());
        assert_eq!(store.backend().records().len(), 1);
        assert_eq!(store.backend().records()[0].id, created.id);
    }

    #[tokio::test]
    async fn test_change_feed_triggers_refetch() {
        let store = TaskSyncStore::new(MemoryBackend::new());
        let _subscription = store.subscribe_to_changes().await.unwrap();

        store.add_task(&TaskDraft::new("via feed")).await.unwrap();

        settle(&store, |s| s.tasks().len() == 1).await;
        assert_eq!(store.tasks()[0].title, "via feed");
    }

    #[tokio::test]
    async fn test_update_round_trip_has_no_duplicates() {
        let backend = MemoryBackend::new();
        let created = backend.create_task(&TaskDraft::new("A")).await.unwrap();
        let store = TaskSyncStore::new(backend);
        store.fetch_all().await.unwrap();
        let _subscription = store.subscribe_to_changes().await.unwrap();

        let mut task = store.task(&created.id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        task.status = TaskStatus::Completed;
        store.update_task(&task).await.unwrap();

        settle(&store, |s| {
            s.task(&created.id)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        })
        .await;
        let matching = store
            .tasks()
            .into_iter()
            .filter(|t| t.id == created.id)
            .count();
        assert_eq!(matching, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_updates() {
        let backend = MemoryBackend::new();
        let store = TaskSyncStore::new(backend.clone());
        let subscription = store.subscribe_to_changes().await.unwrap();
        assert!(subscription.is_active());

        subscription.unsubscribe();
        tokio::task::yield_now().await;
        let calls_before = backend.list_calls();

        backend.create_task(&TaskDraft::new("unseen")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.tasks().is_empty());
        assert_eq!(backend.list_calls(), calls_before);
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_discards_late_results() {
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("late")).await.unwrap();
        let store = TaskSyncStore::new(backend);

        store.shutdown();
        let count = store.fetch_all().await.unwrap();

        assert_eq!(count, 1);
        assert!(store.tasks().is_empty());
        assert_eq!(store.snapshot().generation(), 0);
    }

    #[tokio::test]
    async fn test_mutation_errors_are_surfaced() {
        let backend = MemoryBackend::new();
        let store = TaskSyncStore::new(backend.clone());

        let err = store.add_task(&TaskDraft::new("")).await.unwrap_err();
        assert!(!err.is_network());
        assert!(!store.is_offline());
        assert!(store.snapshot().last_error().is_some());

        backend.set_online(false);
        let err = store.delete_task("missing").await.unwrap_err();
        assert!(err.is_network());
        assert!(store.is_offline());
    }

    #[tokio::test]
    async fn test_connectivity_signals() {
        let store = TaskSyncStore::new(MemoryBackend::new());

        store.set_connectivity(Connectivity::Offline);
        assert!(store.is_offline());

        let generation = store.snapshot().generation();
        store.set_connectivity(Connectivity::Online);
        assert!(!store.is_offline());
        // Coming online does not refetch
        assert_eq!(store.snapshot().generation(), generation);
        assert_eq!(store.backend().list_calls(), 0);
    }

    #[tokio::test]
    async fn test_initial_connectivity() {
        let store = TaskSyncStore::new(MemoryBackend::new()).with_connectivity(Connectivity::Offline);
        assert!(store.is_offline());
    }

    #[tokio::test]
    async fn test_watch_connectivity_channel() {
        let store = TaskSyncStore::new(MemoryBackend::new());
        let (tx, rx) = mpsc::channel(4);
        let handle = store.watch_connectivity(rx);

        tx.send(Connectivity::Offline).await.unwrap();
        settle(&store, |s| s.is_offline()).await;

        tx.send(Connectivity::Online).await.unwrap();
        settle(&store, |s| !s.is_offline()).await;

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_start_fetches_then_subscribes() {
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("existing")).await.unwrap();
        let store = TaskSyncStore::new(backend.clone());

        let subscription = store.start().await;

        assert!(subscription.is_some());
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(backend.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_start_offline_returns_no_subscription() {
        let backend = MemoryBackend::new();
        backend.set_online(false);
        let store = TaskSyncStore::new(backend);

        assert!(store.start().await.is_none());
        assert!(store.is_offline());
    }

    #[tokio::test]
    async fn test_cache_seeds_and_receives_snapshot() {
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("cached")).await.unwrap();

        let store = TaskSyncStore::with_cache(backend.clone(), SnapshotCache::open_in_memory().unwrap());
        store.fetch_all().await.unwrap();

        let slot = store.inner.cache.as_ref().unwrap().lock().unwrap();
        let cached = slot.cache.load().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].title, "cached");
        assert!(slot.cache.last_synced().unwrap().is_some());
        assert_eq!(slot.written, 1);
    }

    #[tokio::test]
    async fn test_cache_keeps_newest_snapshot() {
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("first")).await.unwrap();
        let store = TaskSyncStore::with_cache(backend.clone(), SnapshotCache::open_in_memory().unwrap());
        store.fetch_all().await.unwrap();
        backend.create_task(&TaskDraft::new("second")).await.unwrap();
        store.fetch_all().await.unwrap();

        // A late write from the first fetch must not replace the second
        store.persist_snapshot(1, Vec::new(), Utc::now()).await;

        let slot = store.inner.cache.as_ref().unwrap().lock().unwrap();
        assert_eq!(slot.written, 2);
        assert_eq!(slot.cache.load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_subscription_marks_store_live() {
        let store = TaskSyncStore::new(MemoryBackend::new());
        assert!(!store.snapshot().is_live());

        let subscription = store.subscribe_to_changes().await.unwrap();
        assert!(store.snapshot().is_live());

        subscription.unsubscribe();
        assert!(!store.snapshot().is_live());
    }

    #[tokio::test]
    async fn test_closed_feed_is_observable() {
        let backend = MemoryBackend::new();
        let store = TaskSyncStore::new(backend.clone());
        let subscription = store.subscribe_to_changes().await.unwrap();

        backend.close_feeds();
        settle(&store, |s| !s.is_live()).await;

        tokio::task::yield_now().await;
        assert!(!subscription.is_active());
        assert!(!store.is_offline());
    }

    #[tokio::test]
    async fn test_stale_subscription_drop_keeps_newer_feed_live() {
        let backend = MemoryBackend::new();
        let store = TaskSyncStore::new(backend.clone());
        let old = store.subscribe_to_changes().await.unwrap();
        let _new = store.subscribe_to_changes().await.unwrap();

        drop(old);

        assert!(store.snapshot().is_live());
        assert_eq!(backend.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_cached_snapshot_served_while_offline() {
        let mut cache = SnapshotCache::open_in_memory().unwrap();
        let backend = MemoryBackend::new();
        backend.create_task(&TaskDraft::new("from last run")).await.unwrap();
        cache.replace_all(&backend.records(), Utc::now()).unwrap();

        backend.set_online(false);
        let store = TaskSyncStore::with_cache(backend, cache);
        assert!(store.fetch_all().await.is_err());

        assert!(store.is_offline());
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].title, "from last run");
    }
}
