//! Stats command handler

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use taskmaster_core::stats::export_file_name;
use taskmaster_core::TaskStats;

use super::{refresh, Store};
use crate::output::Output;

/// Show productivity statistics, optionally exporting them as CSV
pub async fn show(store: &Store, export: Option<PathBuf>, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    let now = Utc::now();
    let stats = TaskStats::compute(&tasks, now);

    if let Some(dir) = export {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create export directory: {:?}", dir))?;
        let path = dir.join(export_file_name(now.date_naive()));
        std::fs::write(&path, stats.to_csv())
            .with_context(|| format!("Failed to write {:?}", path))?;
        output.success(&format!("Exported stats to {}", path.display()));
        return Ok(());
    }

    output.print_stats(&stats);
    Ok(())
}
