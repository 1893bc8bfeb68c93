//! Task command handlers

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};

use taskmaster_core::views::{with_due_date, with_status, TaskFilter};
use taskmaster_core::{Priority, Subtask, TaskDraft, TaskStatus};

use super::{parse_due, refresh, refresh_after_write, resolve_task, Store};
use crate::output::Output;
use crate::prompt::{confirm, prompt_with_default};

/// Field values given on the command line for add/edit
#[derive(Debug, Default)]
pub struct TaskFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub tags: Vec<String>,
}

impl TaskFields {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.tags.is_empty()
    }

    fn apply(self, mut draft: TaskDraft) -> Result<TaskDraft> {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(ref due) = self.due {
            draft.due_date = parse_due(due)?;
        }
        if let Some(priority) = self.priority {
            draft.priority = priority;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        for tag in self.tags {
            draft = draft.with_tag(tag);
        }
        Ok(draft)
    }
}

/// List tasks matching `filter`
pub async fn list(store: &Store, filter: TaskFilter, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    output.print_tasks(&filter.apply(&tasks, Utc::now()));
    Ok(())
}

/// Show a single task
pub async fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    let task = resolve_task(&tasks, &id)?;
    output.print_task(&task);
    Ok(())
}

/// Create a task
pub async fn add(store: &Store, title: String, fields: TaskFields, output: &Output) -> Result<()> {
    let draft = fields.apply(TaskDraft::new(title))?;

    let task = store
        .add_task(&draft)
        .await
        .context("Failed to create task")?;
    refresh_after_write(store).await;

    output.success(&format!("Created task: {}", task.id));
    output.print_task(&task);
    Ok(())
}

/// Edit a task, prompting for each field when none were given
pub async fn edit(store: &Store, id: String, fields: TaskFields, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    let mut task = resolve_task(&tasks, &id)?;

    let fields = if fields.is_empty() && output.should_prompt() {
        prompt_fields(&task)?
    } else {
        fields
    };
    if fields.is_empty() {
        output.message("Nothing to change.");
        return Ok(());
    }

    let draft = fields.apply(task.to_draft())?;
    task.title = draft.title;
    task.description = draft.description;
    task.due_date = draft.due_date;
    task.priority = draft.priority;
    task.status = draft.status;
    task.tags = draft.tags;

    let updated = store
        .update_task(&task)
        .await
        .context("Failed to update task")?;
    refresh_after_write(store).await;

    output.success("Task updated");
    output.print_task(&updated);
    Ok(())
}

fn prompt_fields(task: &taskmaster_core::Task) -> Result<TaskFields> {
    println!("Editing task: {}", task.id);
    println!("Press Enter to keep current value, or type new value.\n");

    let due = task.due_date.format("%Y-%m-%d").to_string();
    let priority = task.priority.to_string();

    let mut fields = TaskFields {
        title: prompt_with_default("Title", &task.title)?,
        description: prompt_with_default("Description", &task.description)?,
        due: prompt_with_default("Due date", &due)?,
        ..TaskFields::default()
    };

    if let Some(value) = prompt_with_default("Priority (low/medium/high)", &priority)? {
        fields.priority = Some(value.parse().map_err(anyhow::Error::msg)?);
    }
    if let Some(value) = prompt_with_default("Status", task.status.as_str())? {
        fields.status = Some(value.parse().map_err(anyhow::Error::msg)?);
    }

    // Keep the time of day when only a date was typed
    if let Some(ref value) = fields.due {
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            let moved = with_due_date(task, date);
            fields.due = Some(moved.due_date.to_rfc3339());
        }
    }

    Ok(fields)
}

/// Move a task to another board column
pub async fn move_to(store: &Store, id: String, status: TaskStatus, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    let task = resolve_task(&tasks, &id)?;

    if task.status == status {
        output.message(&format!("Task is already {}.", status.label()));
        return Ok(());
    }

    store
        .update_task(&with_status(&task, status))
        .await
        .context("Failed to move task")?;
    refresh_after_write(store).await;

    output.success(&format!("Moved '{}' to {}", task.title, status.label()));
    Ok(())
}

/// Move a task to another day, keeping its time of day
pub async fn reschedule(store: &Store, id: String, date: NaiveDate, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    let task = resolve_task(&tasks, &id)?;

    let moved = with_due_date(&task, date);
    store
        .update_task(&moved)
        .await
        .context("Failed to reschedule task")?;
    refresh_after_write(store).await;

    output.success(&format!(
        "Rescheduled '{}' to {}",
        task.title,
        moved.due_date.format("%Y-%m-%d %H:%M")
    ));
    Ok(())
}

/// Append a subtask
pub async fn subtask_add(store: &Store, id: String, text: String, output: &Output) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Subtask text cannot be empty.");
    }

    let tasks = refresh(store, output).await;
    let mut task = resolve_task(&tasks, &id)?;

    let subtask = Subtask::new(text);
    let subtask_id = subtask.id.clone();
    task.subtasks.push(subtask);

    store
        .update_task(&task)
        .await
        .context("Failed to add subtask")?;
    refresh_after_write(store).await;

    output.success(&format!("Added subtask {}", subtask_id));
    Ok(())
}

/// Flip a subtask between done and not done
pub async fn subtask_toggle(
    store: &Store,
    id: String,
    subtask_id: String,
    output: &Output,
) -> Result<()> {
    let tasks = refresh(store, output).await;
    let mut task = resolve_task(&tasks, &id)?;

    let matches: Vec<usize> = task
        .subtasks
        .iter()
        .enumerate()
        .filter(|(_, s)| s.id.starts_with(&subtask_id))
        .map(|(i, _)| i)
        .collect();
    let index = match matches.as_slice() {
        [index] => *index,
        [] => bail!("No subtask found matching: {}", subtask_id),
        _ => bail!("Ambiguous subtask ID. Please provide more characters."),
    };

    let subtask = &mut task.subtasks[index];
    subtask.done = !subtask.done;
    let (text, done) = (subtask.text.clone(), subtask.done);

    store
        .update_task(&task)
        .await
        .context("Failed to update subtask")?;
    refresh_after_write(store).await;

    let state = if done { "done" } else { "not done" };
    output.success(&format!("Marked '{}' as {}", text, state));
    Ok(())
}

/// Delete a task
pub async fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    let task = resolve_task(&tasks, &id)?;

    // Confirm deletion
    if output.should_prompt() {
        println!("Delete task: {} - {}", task.id, task.title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store
        .delete_task(&task.id)
        .await
        .context("Failed to delete task")?;
    refresh_after_write(store).await;

    output.success(&format!("Deleted task: {}", task.id));
    Ok(())
}
