//! Data models for Taskmaster
//!
//! Defines the task record as the backend stores it, the writable subset
//! sent on create/update, and the small value types hanging off a task
//! (tags, subtasks, attachments).
//!
//! Field names follow the backend's JSON (`dueDate`, `collectionId`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    /// Not started
    #[default]
    #[serde(rename = "pending")]
    Pending,
    /// Being worked on
    #[serde(rename = "in-progress")]
    InProgress,
    /// Done
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    /// All statuses in board column order
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Human label used for board column headers
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "todo" => Ok(TaskStatus::Pending),
            "in-progress" | "in_progress" | "inprogress" | "doing" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            other => Err(format!(
                "unknown status '{}' (expected pending, in-progress or completed)",
                other
            )),
        }
    }
}

/// Task priority, stored by the backend as 1..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    #[default]
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Priority {
    /// Single-glyph indicator shown next to a task title
    pub fn indicator(&self) -> &'static str {
        match self {
            Priority::Low => "☆",
            Priority::Medium => "⯨",
            Priority::High => "★",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            other => Err(format!("priority must be 1, 2 or 3 (got {})", other)),
        }
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value as u8
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => other
                .parse::<u8>()
                .map_err(|_| format!("invalid priority '{}'", other))
                .and_then(Priority::try_from),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(name)
    }
}

/// A tag as expanded by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// A checklist item inside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

impl Subtask {
    /// Create an open subtask with a fresh id
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            text: text.into(),
            done: false,
        }
    }
}

/// A file attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Relations expanded by the backend on list queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskExpand {
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A task record as held by the backend
///
/// The backend copy is authoritative. Values of this type held by the
/// client are a cache and are replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Backend-assigned identifier
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection_name: String,
    /// Backend-assigned creation time (raw backend format)
    #[serde(default)]
    pub created: String,
    /// Backend-assigned update time (raw backend format)
    #[serde(default)]
    pub updated: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp")]
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    /// Tag ids
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<TaskExpand>,
}

impl Task {
    /// Creation time, if the backend supplied a parseable one
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created)
    }

    /// Last update time, if the backend supplied a parseable one
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated)
    }

    /// Expanded tag objects (empty when the query did not expand tags)
    pub fn expanded_tags(&self) -> &[Tag] {
        self.expand.as_ref().map(|e| e.tags.as_slice()).unwrap_or(&[])
    }

    /// Display names of the task's tags, falling back to raw ids
    pub fn tag_names(&self) -> Vec<String> {
        let expanded = self.expanded_tags();
        if expanded.is_empty() {
            return self.tags.clone();
        }
        expanded.iter().map(|t| t.name.clone()).collect()
    }

    /// Number of finished subtasks and total subtasks
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.done).count();
        (done, self.subtasks.len())
    }

    /// The writable fields of this record, as sent on a full update
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: self.due_date,
            priority: self.priority,
            status: self.status,
            tags: self.tags.clone(),
            subtasks: self.subtasks.clone(),
            attachments: self.attachments.clone(),
        }
    }
}

/// Client-writable task fields
///
/// Used as the body of create and update requests. Backend-owned fields
/// (`id`, `created`, `updated`, collection info) are never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp")]
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl TaskDraft {
    /// A pending, low-priority draft due now
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date: Utc::now(),
            priority: Priority::Low,
            status: TaskStatus::Pending,
            tags: Vec::new(),
            subtasks: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Add a tag id (ignored if already present)
    pub fn with_tag(mut self, tag_id: impl Into<String>) -> Self {
        let tag_id = tag_id.into();
        if !self.tags.contains(&tag_id) {
            self.tags.push(tag_id);
        }
        self
    }
}

/// Parse a backend timestamp
///
/// Accepts RFC 3339 (`2024-05-01T10:00:00Z`), the backend's space-separated
/// form (`2024-05-01 10:00:00.000Z`) and bare dates (`2024-05-01`, taken as
/// midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = value.replacen(' ', "T", 1);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = normalized.trim_end_matches('Z');
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&dt));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Format a timestamp the way it is sent to the backend
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Serde adapter for due dates
pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

/// The backend sends `null` for empty relation and JSON fields
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Generate a 15-character lowercase alphanumeric id (backend id shape)
pub fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..15].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> serde_json::Value {
        json!({
            "id": "abc123def456ghi",
            "collectionId": "pbc_1",
            "collectionName": "tasks",
            "created": "2024-05-01 09:30:00.123Z",
            "updated": "2024-05-02 10:00:00.000Z",
            "title": "Write report",
            "description": "Quarterly numbers",
            "dueDate": "2024-05-10 17:00:00.000Z",
            "priority": 3,
            "status": "in-progress",
            "tags": ["t1"],
            "subtasks": [{"id": "s1", "text": "Outline", "done": true}],
            "attachments": null,
            "expand": {"tags": [{"id": "t1", "name": "Work", "color": "#ff0000"}]}
        })
    }

    #[test]
    fn test_task_from_backend_json() {
        let task: Task = serde_json::from_value(record()).unwrap();

        assert_eq!(task.id, "abc123def456ghi");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date.to_rfc3339(), "2024-05-10T17:00:00+00:00");
        assert!(task.attachments.is_empty());
        assert_eq!(task.tag_names(), vec!["Work".to_string()]);
        assert_eq!(task.subtask_progress(), (1, 1));
        assert!(task.created_at().is_some());
    }

    #[test]
    fn test_rejects_unknown_status() {
        let mut value = record();
        value["status"] = json!("archived");
        assert!(serde_json::from_value::<Task>(value).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_priority() {
        let mut value = record();
        value["priority"] = json!(4);
        assert!(serde_json::from_value::<Task>(value).is_err());
    }

    #[test]
    fn test_rejects_invalid_due_date() {
        let mut value = record();
        value["dueDate"] = json!("next tuesday");
        assert!(serde_json::from_value::<Task>(value).is_err());
    }

    #[test]
    fn test_draft_serializes_wire_names() {
        let draft = TaskDraft::new("Call Bob")
            .with_status(TaskStatus::InProgress)
            .with_priority(Priority::Medium)
            .with_tag("t1")
            .with_tag("t1");

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["status"], "in-progress");
        assert_eq!(value["priority"], 2);
        assert!(value.get("dueDate").is_some());
        assert_eq!(value["tags"].as_array().unwrap().len(), 1);
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_to_draft_drops_backend_fields() {
        let task: Task = serde_json::from_value(record()).unwrap();
        let value = serde_json::to_value(task.to_draft()).unwrap();

        assert!(value.get("created").is_none());
        assert!(value.get("expand").is_none());
        assert_eq!(value["title"], "Write report");
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00.000Z").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00.5").is_some());
        assert_eq!(
            parse_timestamp("2024-05-01").unwrap().to_rfc3339(),
            "2024-05-01T00:00:00+00:00"
        );
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("garbage").is_none());
    }

    #[test]
    fn test_status_and_priority_parsing() {
        assert_eq!("done".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert_eq!(
            "In_Progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert!("later".parse::<TaskStatus>().is_err());

        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("2".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("0".parse::<Priority>().is_err());
        assert_eq!(Priority::High.indicator(), "★");
    }

    #[test]
    fn test_short_id_shape() {
        let id = short_id();
        assert_eq!(id.len(), 15);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
