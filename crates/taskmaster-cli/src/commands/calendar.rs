//! Calendar command handler

use anyhow::Result;
use chrono::Utc;

use taskmaster_core::MonthView;

use super::{refresh, Store};
use crate::output::Output;

/// Show a month with the tasks due on each day (current month by default)
pub async fn show(store: &Store, month: Option<MonthView>, output: &Output) -> Result<()> {
    let month = month.unwrap_or_else(|| MonthView::containing(Utc::now().date_naive()));
    let tasks = refresh(store, output).await;
    output.print_calendar(&month, &tasks);
    Ok(())
}
