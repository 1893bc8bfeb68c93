//! Snapshot cache
//!
//! Persists the task snapshot from the last successful fetch. Each row
//! keeps the full backend record as JSON plus a few columns for ordering
//! and inspection.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use crate::config::Config;
use crate::models::{format_timestamp, parse_timestamp, Task};

/// SQLite-backed copy of the last fetched snapshot
pub struct SnapshotCache {
    conn: Connection,
}

impl SnapshotCache {
    /// Open or create the cache at the configured location
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::open_path(&config.cache_path())
    }

    /// Open or create the cache at a specific path
    pub fn open_path(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(path)?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(Self { conn })
    }

    /// Open an in-memory cache (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Replace the cached snapshot
    ///
    /// Runs in a single transaction; a failure leaves the previous
    /// snapshot in place.
    pub fn replace_all(&mut self, tasks: &[Task], synced_at: DateTime<Utc>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM tasks", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tasks (id, position, status, due_date, record) VALUES (?, ?, ?, ?, ?)",
            )?;
            for (position, task) in tasks.iter().enumerate() {
                let record = serde_json::to_string(task)?;
                stmt.execute(params![
                    task.id,
                    position as i64,
                    task.status.as_str(),
                    format_timestamp(&task.due_date),
                    record,
                ])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO snapshot_meta (key, value) VALUES ('last_synced', ?)",
            params![format_timestamp(&synced_at)],
        )?;

        tx.commit()?;
        debug!(count = tasks.len(), "snapshot cached");
        Ok(())
    }

    /// Load the cached snapshot in fetch order
    pub fn load(&self) -> StorageResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, record FROM tasks ORDER BY position ASC")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, record) = row?;
            let task = serde_json::from_str(&record).map_err(|e| StorageError::CorruptRecord {
                id,
                details: e.to_string(),
            })?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// When the cached snapshot was fetched, if ever
    pub fn last_synced(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM snapshot_meta WHERE key = 'last_synced'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.as_deref().and_then(parse_timestamp))
    }

    /// Number of cached tasks
    pub fn task_count(&self) -> StorageResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?)
    }

    /// Drop the cached snapshot
    pub fn clear(&mut self) -> StorageResult<()> {
        self.conn
            .execute_batch("DELETE FROM tasks; DELETE FROM snapshot_meta;")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskDraft, TaskStatus};
    use tempfile::TempDir;

    fn task(id: &str, title: &str) -> Task {
        let draft = TaskDraft::new(title);
        Task {
            id: id.to_string(),
            collection_id: String::new(),
            collection_name: String::new(),
            created: "2024-05-01 09:00:00.000Z".to_string(),
            updated: "2024-05-01 09:00:00.000Z".to_string(),
            title: draft.title,
            description: draft.description,
            due_date: parse_timestamp("2024-05-10T12:00:00Z").unwrap(),
            priority: draft.priority,
            status: draft.status,
            tags: Vec::new(),
            subtasks: Vec::new(),
            attachments: Vec::new(),
            expand: None,
        }
    }

    #[test]
    fn test_replace_and_load_keeps_order() {
        let mut cache = SnapshotCache::open_in_memory().unwrap();
        let tasks = vec![task("b", "second"), task("a", "first")];

        cache.replace_all(&tasks, Utc::now()).unwrap();

        let loaded = cache.load().unwrap();
        assert_eq!(loaded, tasks);
        assert_eq!(cache.task_count().unwrap(), 2);
    }

    #[test]
    fn test_replace_drops_previous_snapshot() {
        let mut cache = SnapshotCache::open_in_memory().unwrap();
        cache
            .replace_all(&[task("a", "one"), task("b", "two")], Utc::now())
            .unwrap();

        let mut updated = task("a", "one");
        updated.status = TaskStatus::Completed;
        cache.replace_all(&[updated.clone()], Utc::now()).unwrap();

        assert_eq!(cache.load().unwrap(), vec![updated]);
    }

    #[test]
    fn test_last_synced() {
        let mut cache = SnapshotCache::open_in_memory().unwrap();
        assert!(cache.last_synced().unwrap().is_none());

        let now = Utc::now();
        cache.replace_all(&[], now).unwrap();

        let synced = cache.last_synced().unwrap().unwrap();
        assert_eq!(synced.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tasks.db");

        {
            let mut cache = SnapshotCache::open_path(&path).unwrap();
            cache.replace_all(&[task("a", "kept")], Utc::now()).unwrap();
        }

        let cache = SnapshotCache::open_path(&path).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "kept");
    }

    #[test]
    fn test_corrupt_record_reported() {
        let cache = SnapshotCache::open_in_memory().unwrap();
        cache
            .conn
            .execute(
                "INSERT INTO tasks (id, position, status, due_date, record) VALUES ('x', 0, 'pending', '', '{}')",
                [],
            )
            .unwrap();

        let err = cache.load().unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { .. }));
    }

    #[test]
    fn test_clear() {
        let mut cache = SnapshotCache::open_in_memory().unwrap();
        cache.replace_all(&[task("a", "one")], Utc::now()).unwrap();

        cache.clear().unwrap();
        assert_eq!(cache.task_count().unwrap(), 0);
        assert!(cache.last_synced().unwrap().is_none());
    }
}
