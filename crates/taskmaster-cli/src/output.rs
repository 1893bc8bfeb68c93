//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::{DateTime, Utc};
use taskmaster_core::stats::TaskStats;
use taskmaster_core::views::{due_urgency, Board, DueUrgency, MonthView};
use taskmaster_core::{Task, TaskStatus};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single task with its subtasks
    pub fn print_task(&self, task: &Task) {
        match self.format {
            OutputFormat::Human => {
                let now = Utc::now();
                println!("ID:          {}", task.id);
                println!("Title:       {}", task.title);
                if !task.description.is_empty() {
                    println!("Description: {}", task.description);
                }
                println!("Status:      {}", task.status.label());
                println!("Priority:    {} {}", task.priority.indicator(), task.priority);
                println!(
                    "Due:         {} ({})",
                    task.due_date.format("%Y-%m-%d %H:%M"),
                    urgency_label(task, now)
                );
                let tags = task.tag_names();
                if !tags.is_empty() {
                    println!("Tags:        {}", tags.join(", "));
                }
                if let Some(created) = task.created_at() {
                    println!("Created:     {}", created.format("%Y-%m-%d %H:%M"));
                }
                if let Some(updated) = task.updated_at() {
                    println!("Updated:     {}", updated.format("%Y-%m-%d %H:%M"));
                }

                if !task.subtasks.is_empty() {
                    let (done, total) = task.subtask_progress();
                    println!();
                    println!("── Subtasks ({}/{}) ──", done, total);
                    for subtask in &task.subtasks {
                        let mark = if subtask.done { "x" } else { " " };
                        println!("[{}] {}  {}", mark, short(&subtask.id), subtask.text);
                    }
                }

                if !task.attachments.is_empty() {
                    println!();
                    println!("── Attachments ({}) ──", task.attachments.len());
                    for attachment in &task.attachments {
                        match attachment.name {
                            Some(ref name) => println!("{} <{}>", name, attachment.url),
                            None => println!("{}", attachment.url),
                        }
                    }
                }
            }
            OutputFormat::Json => print_json(task),
            OutputFormat::Quiet => println!("{}", task.id),
        }
    }

    /// Print a list of tasks
    pub fn print_tasks(&self, tasks: &[&Task]) {
        match self.format {
            OutputFormat::Human => {
                if tasks.is_empty() {
                    println!("No tasks found.");
                    return;
                }
                let now = Utc::now();
                for task in tasks {
                    println!("{}", task_line(task, now));
                }
                println!("\n{} task(s)", tasks.len());
            }
            OutputFormat::Json => print_json(&tasks),
            OutputFormat::Quiet => {
                for task in tasks {
                    println!("{}", task.id);
                }
            }
        }
    }

    /// Print the kanban board
    pub fn print_board(&self, board: &Board) {
        match self.format {
            OutputFormat::Human => {
                let now = Utc::now();
                for (status, tasks) in board.columns() {
                    println!("── {} ({}) ──", status.label(), tasks.len());
                    if tasks.is_empty() {
                        println!("  (empty)");
                    }
                    for task in tasks {
                        println!(
                            "  {} {} {}  {}",
                            short(&task.id),
                            task.priority.indicator(),
                            truncate(&task.title, 40),
                            urgency_label(task, now)
                        );
                    }
                    println!();
                }
            }
            OutputFormat::Json => {
                let columns: serde_json::Map<String, serde_json::Value> = board
                    .columns()
                    .map(|(status, tasks)| {
                        let value = serde_json::to_value(tasks).unwrap_or_default();
                        (status.as_str().to_string(), value)
                    })
                    .collect();
                print_json(&columns);
            }
            OutputFormat::Quiet => {
                for (status, tasks) in board.columns() {
                    println!("{} {}", status.as_str(), tasks.len());
                }
            }
        }
    }

    /// Print a month of the calendar with the tasks due on each day
    pub fn print_calendar(&self, month: &MonthView, tasks: &[Task]) {
        let agenda = month.agenda(tasks);
        match self.format {
            OutputFormat::Human => {
                println!("{:^28}", month.title());
                println!(" Su  Mo  Tu  We  Th  Fr  Sa");

                let mut cells: Vec<String> = (0..month.leading_blanks())
                    .map(|_| "    ".to_string())
                    .collect();
                for (day, due) in &agenda {
                    let marker = if due.is_empty() { ' ' } else { '*' };
                    cells.push(format!("{:>3}{}", day.format("%-d"), marker));
                }
                for week in cells.chunks(7) {
                    println!("{}", week.concat());
                }

                let now = Utc::now();
                let busy: Vec<_> = agenda.iter().filter(|(_, due)| !due.is_empty()).collect();
                if !busy.is_empty() {
                    println!();
                }
                for (day, due) in busy {
                    println!("{}", day.format("%a %b %d"));
                    for task in due {
                        println!("  {}", task_line(task, now));
                    }
                }
            }
            OutputFormat::Json => {
                let days: Vec<_> = agenda
                    .iter()
                    .filter(|(_, due)| !due.is_empty())
                    .map(|(day, due)| {
                        serde_json::json!({
                            "date": day.format("%Y-%m-%d").to_string(),
                            "tasks": due,
                        })
                    })
                    .collect();
                print_json(&serde_json::json!({
                    "month": format!("{:04}-{:02}", month.year(), month.month()),
                    "days": days,
                }));
            }
            OutputFormat::Quiet => {
                for (_, due) in &agenda {
                    for task in due {
                        println!("{}", task.id);
                    }
                }
            }
        }
    }

    /// Print productivity statistics
    pub fn print_stats(&self, stats: &TaskStats) {
        match self.format {
            OutputFormat::Human => {
                println!("Task Statistics");
                println!("===============");
                println!();
                println!("  Total:        {}", stats.total);
                println!("  Completed:    {}", stats.completed);
                println!("  In Progress:  {}", stats.in_progress);
                println!("  Pending:      {}", stats.pending);
                println!("  Streak:       {} day(s)", stats.streak);
                println!("  Productivity: {}%", stats.productivity_score);
                println!();
                println!("Completed in the last 7 days:");
                for day in &stats.completed_by_day {
                    println!("  {}  {:>3} {}", day.date, day.count, "█".repeat(day.count));
                }
            }
            OutputFormat::Json => print_json(stats),
            OutputFormat::Quiet => println!("{}", stats.productivity_score),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warning(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON: {}", e),
    }
}

/// One-line summary used by list and calendar views
fn task_line(task: &Task, now: DateTime<Utc>) -> String {
    let (done, total) = task.subtask_progress();
    let progress = if total == 0 {
        String::new()
    } else {
        format!(" [{}/{}]", done, total)
    };
    format!(
        "{} | {} {:<11} | {}{} | due {} ({})",
        short(&task.id),
        task.priority.indicator(),
        task.status.label(),
        truncate(&task.title, 35),
        progress,
        task.due_date.format("%Y-%m-%d"),
        urgency_label(task, now)
    )
}

/// Completed tasks are never flagged as overdue
fn urgency_label(task: &Task, now: DateTime<Utc>) -> &'static str {
    if task.status == TaskStatus::Completed {
        return "done";
    }
    match due_urgency(task.due_date, now) {
        DueUrgency::Overdue => "overdue",
        urgency => urgency.label(),
    }
}

/// First eight characters of an id
fn short(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_format_predicates() {
        let json = Output::new(OutputFormat::Json);
        assert!(json.is_json());
        assert!(!json.is_quiet());

        let quiet = Output::new(OutputFormat::Quiet);
        assert!(quiet.is_quiet());
        assert!(!quiet.is_json());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ééééééééééé", 5), "éé...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short("abc123def456ghi"), "abc123de");
        assert_eq!(short("abc"), "abc");
    }
}
