//! Sync command handlers

use anyhow::Result;
use chrono::Local;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use taskmaster_core::{spawn_probe, Board, Config, Subscription, SyncState};

use super::Store;
use crate::output::Output;

/// Refetch the whole task list ("Sync Now")
pub async fn sync(store: &Store, output: &Output) -> Result<()> {
    output.message("Syncing tasks...");

    match store.sync_tasks().await {
        Ok(count) => {
            output.success(&format!("Sync complete - {} task(s)", count));
            Ok(())
        }
        Err(e) => {
            output.message(&format!("Sync failed: {}", e));
            if let Some(hint) = e.recovery_suggestion() {
                output.warning(hint);
            }
            Err(e.into())
        }
    }
}

/// Keep the board on screen, re-rendering on every applied snapshot
///
/// Runs until Ctrl-C. Whenever the change feed is down while the backend
/// is reachable, the subscription is re-opened right away and then retried
/// every probe interval until it sticks.
pub async fn watch(store: &Store, config: &Config, output: &Output) -> Result<()> {
    let mut updates = store.watch();
    let mut subscription = store.start().await;
    if subscription.is_none() {
        output.warning("Live updates unavailable; will retry when the backend is reachable.");
    }

    let (probe, signals) = spawn_probe(store.backend().clone(), config.probe_interval());
    let connectivity = store.watch_connectivity(signals);

    let mut retry = tokio::time::interval_at(
        Instant::now() + config.probe_interval(),
        config.probe_interval(),
    );
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    output.message("Watching for changes (Ctrl-C to stop)...");
    let mut shown = store.snapshot();
    render(&shown, output);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();

                let reconnected = shown.is_offline() && !state.is_offline();
                let dropped = shown.is_live() && !state.is_live();
                if (reconnected || dropped) && needs_resubscribe(&state, subscription.as_ref()) {
                    subscription = resubscribe(store).await;
                }

                if state.generation() != shown.generation()
                    || state.is_offline() != shown.is_offline()
                    || state.is_live() != shown.is_live()
                {
                    render(&state, output);
                }
                shown = state;
            }
            _ = retry.tick() => {
                if needs_resubscribe(&store.snapshot(), subscription.as_ref()) {
                    subscription = resubscribe(store).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        }
    }

    drop(subscription);
    probe.shutdown().await;
    connectivity.abort();
    store.shutdown();
    output.message("Stopped watching.");
    Ok(())
}

/// Whether the feed is down while the backend is believed reachable
fn needs_resubscribe(state: &SyncState, subscription: Option<&Subscription>) -> bool {
    !state.is_offline() && !subscription.is_some_and(Subscription::is_active)
}

async fn resubscribe(store: &Store) -> Option<Subscription> {
    info!("change feed down, resubscribing");
    store.start().await
}

fn render(state: &SyncState, output: &Output) {
    // The board is already self-describing in JSON mode
    if !output.is_json() {
        output.message(&header(state, &Local::now().format("%H:%M:%S").to_string()));
    }
    output.print_board(&Board::from_tasks(state.tasks()));
}

fn header(state: &SyncState, time: &str) -> String {
    let mut header = format!("── {} ── {} task(s)", time, state.tasks().len());
    if state.is_offline() {
        header.push_str(" (offline, showing last snapshot)");
    } else if !state.is_live() {
        header.push_str(" (live updates paused)");
    }
    header
}
