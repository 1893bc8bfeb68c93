//! Derived views over a task snapshot
//!
//! Everything here is a pure function of a task slice and a reference
//! time: the kanban board, due-date urgency, list filters and the month
//! calendar. Calendar days are UTC days.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use crate::models::{Task, TaskStatus};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// ==================== Board ====================

/// Kanban grouping of tasks by status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    pub pending: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub completed: Vec<Task>,
}

impl Board {
    /// Group tasks into columns, keeping snapshot order within each column
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut board = Board::default();
        for task in tasks {
            board.column_mut(task.status).push(task.clone());
        }
        board
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Pending => &self.pending,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Completed => &self.completed,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Completed => &mut self.completed,
        }
    }

    /// Columns in display order
    pub fn columns(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        TaskStatus::ALL
            .into_iter()
            .map(move |status| (status, self.column(status)))
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.in_progress.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==================== Due dates ====================

/// How close a due date is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueUrgency {
    Overdue,
    DueSoon,
    Later,
}

impl DueUrgency {
    pub fn label(&self) -> &'static str {
        match self {
            DueUrgency::Overdue => "overdue",
            DueUrgency::DueSoon => "due soon",
            DueUrgency::Later => "later",
        }
    }
}

/// Whole days until `due`, rounded up
pub fn days_until_due(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (due - now).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) != 0 {
        days + 1
    } else {
        days
    }
}

/// Overdue below zero days, due soon up to three days, later beyond
pub fn due_urgency(due: DateTime<Utc>, now: DateTime<Utc>) -> DueUrgency {
    match days_until_due(due, now) {
        d if d < 0 => DueUrgency::Overdue,
        d if d <= 3 => DueUrgency::DueSoon,
        _ => DueUrgency::Later,
    }
}

// ==================== Filters ====================

/// Due-date window for list filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueWindow {
    /// Past due and not completed
    Overdue,
    /// Due on the current calendar day
    Today,
    /// Due within the next seven days
    Week,
}

impl FromStr for DueWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overdue" => Ok(DueWindow::Overdue),
            "today" => Ok(DueWindow::Today),
            "week" => Ok(DueWindow::Week),
            other => Err(format!(
                "unknown due window '{}' (expected overdue, today or week)",
                other
            )),
        }
    }
}

impl fmt::Display for DueWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DueWindow::Overdue => "overdue",
            DueWindow::Today => "today",
            DueWindow::Week => "week",
        };
        write!(f, "{}", name)
    }
}

/// List filter; every populated criterion must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Tag id or expanded tag name (case-insensitive)
    pub tag: Option<String>,
    /// Free text matched against title and description (case-insensitive)
    pub text: Option<String>,
    pub due: Option<DueWindow>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.tag.is_none() && self.text.is_none() && self.due.is_none()
    }

    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }

        if let Some(ref tag) = self.tag {
            let by_id = task.tags.iter().any(|id| id == tag);
            let by_name = task
                .expanded_tags()
                .iter()
                .any(|t| t.name.eq_ignore_ascii_case(tag));
            if !by_id && !by_name {
                return false;
            }
        }

        if let Some(ref text) = self.text {
            let needle = text.to_lowercase();
            if !task.title.to_lowercase().contains(&needle)
                && !task.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        match self.due {
            Some(DueWindow::Overdue) => {
                task.status != TaskStatus::Completed && task.due_date < now
            }
            Some(DueWindow::Today) => task.due_date.date_naive() == now.date_naive(),
            Some(DueWindow::Week) => {
                task.due_date >= now && task.due_date < now + Duration::days(7)
            }
            None => true,
        }
    }

    /// Matching tasks, snapshot order preserved
    pub fn apply<'a>(&self, tasks: &'a [Task], now: DateTime<Utc>) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t, now)).collect()
    }
}

// ==================== Calendar ====================

/// Tasks due on a calendar day
pub fn tasks_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| t.due_date.date_naive() == date)
        .collect()
}

/// One month of the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthView {
    first: NaiveDate,
}

impl MonthView {
    /// Month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    /// Month by number; `None` if out of range
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    /// e.g. "October 2026"
    pub fn title(&self) -> String {
        self.first.format("%B %Y").to_string()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first.pred_opt().unwrap_or(self.first)
    }

    /// Every day of the month in order
    pub fn days(&self) -> Vec<NaiveDate> {
        self.first
            .iter_days()
            .take_while(|d| d.month() == self.first.month())
            .collect()
    }

    /// Empty cells before the first day in a Sunday-first grid
    pub fn leading_blanks(&self) -> u32 {
        self.first.weekday().num_days_from_sunday()
    }

    pub fn next(&self) -> Self {
        Self {
            first: self
                .first
                .checked_add_months(Months::new(1))
                .unwrap_or(self.first),
        }
    }

    pub fn prev(&self) -> Self {
        Self {
            first: self
                .first
                .checked_sub_months(Months::new(1))
                .unwrap_or(self.first),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    /// Days of the month paired with the tasks due on each
    pub fn agenda<'a>(&self, tasks: &'a [Task]) -> Vec<(NaiveDate, Vec<&'a Task>)> {
        self.days()
            .into_iter()
            .map(|day| (day, tasks_on(tasks, day)))
            .collect()
    }
}

impl FromStr for MonthView {
    type Err = String;

    /// Parses `YYYY-MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid month '{}' (expected YYYY-MM)", s);
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthView::new(year, month).ok_or_else(invalid)
    }
}

// ==================== Moves ====================

/// Copy of `task` moved to another board column
pub fn with_status(task: &Task, status: TaskStatus) -> Task {
    Task {
        status,
        ..task.clone()
    }
}

/// Copy of `task` rescheduled to `date`, keeping its time of day
pub fn with_due_date(task: &Task, date: NaiveDate) -> Task {
    let due = date.and_time(task.due_date.time()).and_utc();
    Task {
        due_date: due,
        ..task.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_timestamp, Tag, TaskExpand};

    fn ts(value: &str) -> DateTime<Utc> {
        parse_timestamp(value).unwrap()
    }

    fn task(id: &str, title: &str, status: TaskStatus, due: &str) -> Task {
        Task {
            id: id.to_string(),
            collection_id: "c".to_string(),
            collection_name: "tasks".to_string(),
            created: "2024-05-01 10:00:00.000Z".to_string(),
            updated: "2024-05-01 10:00:00.000Z".to_string(),
            title: title.to_string(),
            description: String::new(),
            due_date: ts(due),
            priority: Default::default(),
            status,
            tags: Vec::new(),
            subtasks: Vec::new(),
            attachments: Vec::new(),
            expand: None,
        }
    }

    #[test]
    fn test_board_groups_and_keeps_order() {
        let tasks = vec![
            task("1", "a", TaskStatus::Pending, "2024-05-10T09:00:00Z"),
            task("2", "b", TaskStatus::Completed, "2024-05-10T09:00:00Z"),
            task("3", "c", TaskStatus::Pending, "2024-05-10T09:00:00Z"),
            task("4", "d", TaskStatus::InProgress, "2024-05-10T09:00:00Z"),
        ];

        let board = Board::from_tasks(&tasks);

        let pending: Vec<_> = board.pending.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(pending, vec!["1", "3"]);
        assert_eq!(board.column(TaskStatus::InProgress)[0].id, "4");
        assert_eq!(board.column(TaskStatus::Completed)[0].id, "2");
        assert_eq!(board.len(), 4);

        let order: Vec<_> = board.columns().map(|(s, _)| s).collect();
        assert_eq!(order, TaskStatus::ALL.to_vec());
    }

    #[test]
    fn test_days_until_due_rounds_up() {
        let now = ts("2024-05-10T12:00:00Z");

        assert_eq!(days_until_due(ts("2024-05-10T12:00:00Z"), now), 0);
        assert_eq!(days_until_due(ts("2024-05-10T13:00:00Z"), now), 1);
        assert_eq!(days_until_due(ts("2024-05-12T12:00:00Z"), now), 2);
        assert_eq!(days_until_due(ts("2024-05-10T11:00:00Z"), now), 0);
        assert_eq!(days_until_due(ts("2024-05-09T11:00:00Z"), now), -1);
    }

    #[test]
    fn test_due_urgency_bands() {
        let now = ts("2024-05-10T12:00:00Z");

        assert_eq!(due_urgency(ts("2024-05-08T12:00:00Z"), now), DueUrgency::Overdue);
        assert_eq!(due_urgency(ts("2024-05-10T18:00:00Z"), now), DueUrgency::DueSoon);
        assert_eq!(due_urgency(ts("2024-05-13T12:00:00Z"), now), DueUrgency::DueSoon);
        assert_eq!(due_urgency(ts("2024-05-13T13:00:00Z"), now), DueUrgency::Later);
    }

    #[test]
    fn test_filter_status_and_text() {
        let now = ts("2024-05-10T12:00:00Z");
        let mut report = task("1", "Write Report", TaskStatus::Pending, "2024-05-11T00:00:00Z");
        report.description = "quarterly numbers".to_string();
        let tasks = vec![
            report,
            task("2", "Groceries", TaskStatus::Pending, "2024-05-11T00:00:00Z"),
            task("3", "report bug", TaskStatus::Completed, "2024-05-11T00:00:00Z"),
        ];

        let filter = TaskFilter {
            text: Some("REPORT".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&tasks, now).len(), 2);

        let filter = TaskFilter {
            text: Some("report".to_string()),
            status: Some(TaskStatus::Pending),
            ..Default::default()
        };
        let matched = filter.apply(&tasks, now);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "1");

        let filter = TaskFilter {
            text: Some("Quarterly".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&tasks, now)[0].id, "1");
    }

    #[test]
    fn test_filter_tag_by_id_or_name() {
        let now = ts("2024-05-10T12:00:00Z");
        let mut tagged = task("1", "a", TaskStatus::Pending, "2024-05-11T00:00:00Z");
        tagged.tags = vec!["t1".to_string()];
        tagged.expand = Some(TaskExpand {
            tags: vec![Tag {
                id: "t1".to_string(),
                name: "Work".to_string(),
                color: "#00f".to_string(),
            }],
        });
        let tasks = vec![tagged, task("2", "b", TaskStatus::Pending, "2024-05-11T00:00:00Z")];

        for tag in ["t1", "work"] {
            let filter = TaskFilter {
                tag: Some(tag.to_string()),
                ..Default::default()
            };
            let matched = filter.apply(&tasks, now);
            assert_eq!(matched.len(), 1, "tag {}", tag);
            assert_eq!(matched[0].id, "1");
        }
    }

    #[test]
    fn test_filter_due_windows() {
        let now = ts("2024-05-10T12:00:00Z");
        let tasks = vec![
            task("late", "a", TaskStatus::Pending, "2024-05-09T12:00:00Z"),
            task("done", "b", TaskStatus::Completed, "2024-05-09T12:00:00Z"),
            task("today", "c", TaskStatus::Pending, "2024-05-10T20:00:00Z"),
            task("week", "d", TaskStatus::Pending, "2024-05-15T12:00:00Z"),
            task("far", "e", TaskStatus::Pending, "2024-06-15T12:00:00Z"),
        ];

        let ids = |window: DueWindow| -> Vec<String> {
            TaskFilter {
                due: Some(window),
                ..Default::default()
            }
            .apply(&tasks, now)
            .iter()
            .map(|t| t.id.clone())
            .collect()
        };

        assert_eq!(ids(DueWindow::Overdue), vec!["late"]);
        assert_eq!(ids(DueWindow::Today), vec!["today"]);
        assert_eq!(ids(DueWindow::Week), vec!["today", "week"]);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let now = ts("2024-05-10T12:00:00Z");
        let tasks = vec![task("1", "a", TaskStatus::Completed, "2020-01-01T00:00:00Z")];

        assert!(TaskFilter::default().is_empty());
        assert_eq!(TaskFilter::default().apply(&tasks, now).len(), 1);
    }

    #[test]
    fn test_due_window_parse() {
        assert_eq!("Today".parse::<DueWindow>().unwrap(), DueWindow::Today);
        assert!("tomorrow".parse::<DueWindow>().is_err());
    }

    #[test]
    fn test_tasks_on_day() {
        let tasks = vec![
            task("1", "a", TaskStatus::Pending, "2024-05-10T00:00:00Z"),
            task("2", "b", TaskStatus::Pending, "2024-05-10T23:59:00Z"),
            task("3", "c", TaskStatus::Pending, "2024-05-11T00:00:00Z"),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        let ids: Vec<_> = tasks_on(&tasks, day).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_month_view_navigation() {
        let view = MonthView::containing(NaiveDate::from_ymd_opt(2024, 12, 17).unwrap());
        assert_eq!(view.title(), "December 2024");
        assert_eq!(view.days().len(), 31);

        let next = view.next();
        assert_eq!((next.year(), next.month()), (2025, 1));
        assert_eq!(next.prev(), view);

        let feb = MonthView::new(2024, 2).unwrap();
        assert_eq!(feb.days().len(), 29);
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        // 2024-02-01 was a Thursday
        assert_eq!(feb.leading_blanks(), 4);
    }

    #[test]
    fn test_month_view_parse_and_agenda() {
        let view: MonthView = "2024-05".parse().unwrap();
        assert!("2024-13".parse::<MonthView>().is_err());
        assert!("May".parse::<MonthView>().is_err());

        let tasks = vec![
            task("1", "a", TaskStatus::Pending, "2024-05-10T09:00:00Z"),
            task("2", "b", TaskStatus::Pending, "2024-06-10T09:00:00Z"),
        ];
        let agenda = view.agenda(&tasks);
        assert_eq!(agenda.len(), 31);
        assert_eq!(agenda[9].1.len(), 1);
        assert_eq!(agenda.iter().map(|(_, t)| t.len()).sum::<usize>(), 1);
        assert!(view.contains(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()));
    }

    #[test]
    fn test_moves_produce_updated_copies() {
        let original = task("1", "a", TaskStatus::Pending, "2024-05-10T09:30:00Z");

        let moved = with_status(&original, TaskStatus::InProgress);
        assert_eq!(moved.status, TaskStatus::InProgress);
        assert_eq!(original.status, TaskStatus::Pending);

        let rescheduled = with_due_date(&original, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(rescheduled.due_date, ts("2024-06-01T09:30:00Z"));
        assert_eq!(rescheduled.id, original.id);
    }
}
