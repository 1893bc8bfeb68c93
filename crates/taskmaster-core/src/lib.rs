//! Taskmaster Core Library
//!
//! This crate keeps a client-side snapshot of a hosted task collection
//! eventually consistent with the backend.
//!
//! # Architecture
//!
//! - **Backend**: source of truth (PocketBase over REST + Server-Sent Events)
//! - **Store**: in-memory snapshot, replaced wholesale on every fetch and
//!   refetched on every change notification
//! - **Cache**: SQLite copy of the last snapshot for offline reads
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = TaskSyncStore::new(PocketBaseBackend::from_config(&config));
//! let subscription = store.start().await;
//!
//! // Add a task; it shows up once the change feed round-trips
//! store.add_task(&TaskDraft::new("Write report")).await?;
//!
//! // Read the snapshot
//! let board = Board::from_tasks(&store.tasks());
//! ```
//!
//! # Modules
//!
//! - `store`: Sync store (main entry point)
//! - `backend`: Backend contract, PocketBase and in-memory implementations
//! - `models`: Task records and drafts
//! - `connectivity`: Background reachability probe
//! - `views`: Board, filters, calendar
//! - `stats`: Productivity statistics and CSV export
//! - `storage`: SQLite snapshot cache
//! - `config`: Application configuration

pub mod backend;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod stats;
pub mod storage;
pub mod store;
pub mod views;

pub use backend::{
    ChangeAction, ChangeEvent, ChangeFeed, ListQuery, MemoryBackend, PocketBaseBackend, TaskBackend,
};
pub use config::Config;
pub use connectivity::{spawn_probe, Connectivity, ConnectivityProbe, ProbeHandle};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use models::{Priority, Subtask, Tag, Task, TaskDraft, TaskStatus};
pub use stats::TaskStats;
pub use storage::{SnapshotCache, StorageError};
pub use store::{Subscription, SyncState, TaskSyncStore};
pub use views::{Board, DueUrgency, DueWindow, MonthView, TaskFilter};
