//! Productivity statistics
//!
//! Computed from a task snapshot. A completed task counts as completed at
//! its `updated` time, since records carry no separate completion stamp.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Task, TaskStatus};

/// Number of days covered by the completion history
pub const HISTORY_DAYS: i64 = 7;

/// Completions on one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    /// Label like "May 10"
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    /// Consecutive days, ending today, with at least one completion
    pub streak: u32,
    /// Completed vs. overdue open tasks, 0 to 100
    pub productivity_score: u32,
    /// Last seven days, oldest first
    pub completed_by_day: Vec<DayCount>,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let completed = count(TaskStatus::Completed);

        let completion_days: Vec<NaiveDate> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .filter_map(|t| t.updated_at())
            .map(|at| at.date_naive())
            .collect();
        let completed_on = |day: NaiveDate| completion_days.iter().filter(|d| **d == day).count();

        let today = now.date_naive();
        let mut streak = 0;
        let mut day = today;
        while completed_on(day) > 0 {
            streak += 1;
            day = match day.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
        }

        let overdue = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed && t.due_date < now)
            .count();
        let denominator = (completed + overdue).max(1);
        let productivity_score = (completed as f64 / denominator as f64 * 100.0).round() as u32;

        let completed_by_day = (0..HISTORY_DAYS)
            .rev()
            .map(|offset| {
                let day = today - Duration::days(offset);
                DayCount {
                    date: day.format("%b %d").to_string(),
                    count: completed_on(day),
                }
            })
            .collect();

        Self {
            total: tasks.len(),
            completed,
            in_progress: count(TaskStatus::InProgress),
            pending: count(TaskStatus::Pending),
            streak,
            productivity_score,
            completed_by_day,
        }
    }

    /// CSV export: a metric table, a blank line, then the daily history
    pub fn to_csv(&self) -> String {
        let mut rows = vec![
            "Metric,Value".to_string(),
            format!("Total Tasks,{}", self.total),
            format!("Completed Tasks,{}", self.completed),
            format!("In Progress Tasks,{}", self.in_progress),
            format!("Pending Tasks,{}", self.pending),
            format!("Current Streak,{}", self.streak),
            format!("Productivity Score,{}%", self.productivity_score),
            String::new(),
            "Date,Completed Tasks".to_string(),
        ];
        rows.extend(
            self.completed_by_day
                .iter()
                .map(|day| format!("{},{}", day.date, day.count)),
        );

        let mut csv = rows.join("\n");
        csv.push('\n');
        csv
    }
}

/// File name for a CSV export made on `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("taskmaster-stats-{}.csv", date.format("%Y-%m-%d"))
}
