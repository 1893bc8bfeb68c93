//! Board command handler

use anyhow::Result;

use taskmaster_core::Board;

use super::{refresh, Store};
use crate::output::Output;

/// Show tasks grouped into status columns
pub async fn show(store: &Store, output: &Output) -> Result<()> {
    let tasks = refresh(store, output).await;
    output.print_board(&Board::from_tasks(&tasks));
    Ok(())
}
