//! Periodic driver of a [`StartupMonitor`].

use std::sync::Arc;
use std::time::Duration;

use common::Revision;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::MonitorError;
use crate::fs::FileSystem;
use crate::layout::TargetLayout;
use crate::monitor::{StartupMonitor, TickOutcome, read_active_revision};

/// Sync the monitor every probe interval until it reaches a terminal outcome
/// or `token` is cancelled.
///
/// Syncs never overlap: each one runs on the blocking pool and the next tick
/// is only awaited once it returned. Errors are logged and retried on the next
/// tick. Returns the last outcome, `None` when cancelled before any terminal
/// outcome. A zero probe interval is rejected before the first sync.
pub async fn run(
    monitor: StartupMonitor,
    token: CancellationToken,
) -> Result<Option<TickOutcome>, MonitorError> {
    info!(
        "Starting the startup monitor for revision {} with Interval = {:?}, Timeout = {:?}",
        monitor.revision(),
        monitor.probe_interval(),
        monitor.timeout()
    );

    if monitor.probe_interval().is_zero() {
        return Err(MonitorError::ZeroProbeInterval);
    }
    let mut ticker = interval(monitor.probe_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut monitor = monitor;

    let outcome = loop {
        tokio::select! {
            _ = token.cancelled() => break None,
            _ = ticker.tick() => {}
        }

        let (returned, res) = tokio::task::spawn_blocking(move || {
            let res = monitor.tick();
            (monitor, res)
        })
        .await?;
        monitor = returned;

        match res {
            Ok(outcome) if outcome.is_terminal() => break Some(outcome),
            Ok(_) => {}
            Err(e) => error!("{e}"),
        }
    };

    info!("Shutting down the startup monitor");
    Ok(outcome)
}

/// Determine the revision to watch from the active manifest, retrying every
/// `retry` until it can be read or `token` is cancelled.
pub async fn pin_revision(
    fs: Arc<dyn FileSystem>,
    layout: TargetLayout,
    retry: Duration,
    token: CancellationToken,
) -> Result<Option<Revision>, MonitorError> {
    loop {
        let fs = fs.clone();
        let layout = layout.clone();
        let res =
            tokio::task::spawn_blocking(move || read_active_revision(fs.as_ref(), &layout)).await?;
        match res {
            Ok(revision) => {
                info!("Watching revision {revision} found in the active manifest");
                return Ok(Some(revision));
            }
            Err(e) => warn!("Couldn't determine the revision to watch: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(retry) => {},
            _ = token.cancelled() => return Ok(None),
        }
    }
}
