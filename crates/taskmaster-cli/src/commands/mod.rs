//! Command handlers

pub mod auth;
pub mod board;
pub mod calendar;
pub mod config;
pub mod stats;
pub mod status;
pub mod sync;
pub mod task;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use taskmaster_core::models::parse_timestamp;
use taskmaster_core::{Config, PocketBaseBackend, SnapshotCache, Task, TaskSyncStore};

use crate::output::Output;

pub type Store = TaskSyncStore<PocketBaseBackend>;

/// Build the store for `config`, backed by the snapshot cache when enabled
pub fn open_store(config: &Config) -> Store {
    let backend = PocketBaseBackend::from_config(config);

    if config.cache_enabled {
        match SnapshotCache::open(config) {
            Ok(cache) => return TaskSyncStore::with_cache(backend, cache),
            Err(e) => warn!(
                "Snapshot cache unavailable: {} {}",
                e,
                e.recovery_suggestion().unwrap_or_default()
            ),
        }
    }
    TaskSyncStore::new(backend)
}

/// Fetch the latest snapshot, falling back to the cached one when offline
pub async fn refresh(store: &Store, output: &Output) -> Vec<Task> {
    if let Err(e) = store.fetch_all().await {
        let synced = store
            .snapshot()
            .last_synced()
            .map(|at| format!(" from {}", at.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        output.warning(&format!(
            "Offline ({}). Showing cached tasks{}.",
            e, synced
        ));
        if let Some(hint) = e.recovery_suggestion() {
            output.warning(hint);
        }
    }
    store.tasks()
}

/// Refresh the snapshot after a write so the cache reflects it
pub async fn refresh_after_write(store: &Store) {
    if let Err(e) = store.fetch_all().await {
        warn!("Post-write refresh failed: {}", e);
    }
}

/// Find a task by full id or unique prefix
pub fn resolve_task(tasks: &[Task], id: &str) -> Result<Task> {
    if let Some(task) = tasks.iter().find(|t| t.id == id) {
        return Ok(task.clone());
    }

    let matches: Vec<_> = tasks.iter().filter(|t| t.id.starts_with(id)).collect();

    match matches.len() {
        0 => bail!("No task found matching: {}", id),
        1 => Ok(matches[0].clone()),
        _ => {
            eprintln!("Multiple tasks match '{}':", id);
            for task in &matches {
                eprintln!("  {} - {}", task.id, task.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Parse a due date given on the command line
pub fn parse_due(value: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(value).ok_or_else(|| {
        anyhow!(
            "Invalid date '{}'. Use YYYY-MM-DD or an RFC 3339 timestamp.",
            value
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmaster_core::TaskDraft;

    fn task(id: &str, title: &str) -> Task {
        let draft = TaskDraft::new(title);
        Task {
            id: id.to_string(),
            collection_id: "c".to_string(),
            collection_name: "tasks".to_string(),
            created: String::new(),
            updated: String::new(),
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            priority: draft.priority,
            status: draft.status,
            tags: Vec::new(),
            subtasks: Vec::new(),
            attachments: Vec::new(),
            expand: None,
        }
    }

    #[test]
    fn test_resolve_task_by_prefix() {
        let tasks = vec![task("abc111", "one"), task("abd222", "two")];

        assert_eq!(resolve_task(&tasks, "abc").unwrap().title, "one");
        assert_eq!(resolve_task(&tasks, "abd222").unwrap().title, "two");
        assert!(resolve_task(&tasks, "ab").is_err());
        assert!(resolve_task(&tasks, "zzz").is_err());
    }

    #[test]
    fn test_exact_id_wins_over_prefix() {
        let tasks = vec![task("abc", "exact"), task("abcdef", "longer")];
        assert_eq!(resolve_task(&tasks, "abc").unwrap().title, "exact");
    }

    #[test]
    fn test_parse_due() {
        assert_eq!(
            parse_due("2024-05-10").unwrap().to_rfc3339(),
            "2024-05-10T00:00:00+00:00"
        );
        assert!(parse_due("next week").is_err());
    }
}
