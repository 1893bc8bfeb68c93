//! Backend reachability monitoring
//!
//! A background probe calls [`TaskBackend::health`] on a fixed interval and
//! reports transitions between online and offline. The store consumes the
//! signals through [`TaskSyncStore::watch_connectivity`].
//!
//! [`TaskSyncStore::watch_connectivity`]: crate::store::TaskSyncStore::watch_connectivity

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::TaskBackend;

/// Network reachability as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => write!(f, "online"),
            Connectivity::Offline => write!(f, "offline"),
        }
    }
}

/// Turns raw health readings into transition signals
#[derive(Debug, Default)]
pub struct ConnectivityProbe {
    last: Option<Connectivity>,
}

impl ConnectivityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading; returns it only if it differs from the previous one
    ///
    /// The first reading is always reported.
    pub fn observe(&mut self, reading: Connectivity) -> Option<Connectivity> {
        if self.last == Some(reading) {
            return None;
        }
        self.last = Some(reading);
        Some(reading)
    }

    /// Last reading seen
    pub fn current(&self) -> Option<Connectivity> {
        self.last
    }

    /// Take a reading from `backend`
    pub async fn check<B: TaskBackend>(backend: &B) -> Connectivity {
        match backend.health().await {
            Ok(()) => Connectivity::Online,
            Err(e) => {
                debug!("health check failed: {}", e);
                Connectivity::Offline
            }
        }
    }
}

/// Handle for a running probe
///
/// Dropping the handle stops the probe.
pub struct ProbeHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ProbeHandle {
    /// Stop the probe and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Spawn a background probe polling `backend` every `interval`
///
/// Returns the handle and the receiver of connectivity transitions.
pub fn spawn_probe<B>(backend: B, interval: Duration) -> (ProbeHandle, mpsc::Receiver<Connectivity>)
where
    B: TaskBackend + Clone,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let (signal_tx, signal_rx) = mpsc::channel(16);

    let task = tokio::spawn(probe_task(backend, interval, shutdown_rx, signal_tx));

    (ProbeHandle { shutdown_tx, task }, signal_rx)
}

async fn probe_task<B: TaskBackend>(
    backend: B,
    interval: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
    signal_tx: mpsc::Sender<Connectivity>,
) {
    let mut probe = ConnectivityProbe::new();

    loop {
        let reading = ConnectivityProbe::check(&backend).await;
        if let Some(change) = probe.observe(reading) {
            info!(connectivity = %change, "backend reachability changed");
            if signal_tx.send(change).await.is_err() {
                break;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.recv() => break,
        }
    }
    debug!("connectivity probe stopped");
}
