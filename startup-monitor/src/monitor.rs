use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{PodManifest, Revision};
use tracing::info;

use crate::error::MonitorError;
use crate::fallback::{FallbackOutcome, fallback_to_previous_revision, promote_and_retire};
use crate::fs::{FileSystem, remove_if_exists};
use crate::layout::TargetLayout;

/// Reports whether the watched target is healthy.
///
/// Called on every sync, it must only read state that is maintained
/// elsewhere and return immediately.
pub type HealthCheck = Arc<dyn Fn() -> bool + Send + Sync>;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// What a single sync decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The active manifest belongs to another revision, nothing was done.
    RevisionMismatch {
        watching: Revision,
        observed: Revision,
    },
    /// Still within the grace period.
    Waiting,
    /// The target is healthy, it became the last known good revision and the
    /// monitor removed its marker.
    Retired,
    /// The last known good revision was republished and the monitor removed
    /// its marker.
    FellBack,
    /// Timed out but there is nothing to fall back to.
    NoFallbackCandidate,
    /// A fallback already happened, the monitor does not act anymore.
    Finished,
}

impl TickOutcome {
    /// Whether the host should stop scheduling syncs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TickOutcome::Retired | TickOutcome::FellBack | TickOutcome::Finished
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Watching,
    /// The active manifest was restored; the marker may still need removing.
    FellBack { marker_removed: bool },
}

/// Watches the startup of one static pod revision.
///
/// If the target becomes healthy its revision is recorded as the last known
/// good one. If it does not within `timeout`, counted from the first sync
/// that observed the watched revision, the last known good manifest is put
/// back in place of the active one.
pub struct StartupMonitor {
    fs: Box<dyn FileSystem>,
    layout: TargetLayout,
    /// revision at which the monitor was started
    revision: Revision,
    timeout: Duration,
    /// mind that every sync does some I/O
    probe_interval: Duration,
    is_target_healthy: HealthCheck,
    monitor_timestamp: Option<Instant>,
    phase: Phase,
}

impl StartupMonitor {
    pub fn new(
        fs: Box<dyn FileSystem>,
        layout: TargetLayout,
        revision: Revision,
        is_target_healthy: HealthCheck,
    ) -> Self {
        StartupMonitor {
            fs,
            layout,
            revision,
            timeout: DEFAULT_FALLBACK_TIMEOUT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            is_target_healthy,
            monitor_timestamp: None,
            phase: Phase::Watching,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn probe_interval(&self) -> Duration {
        self.probe_interval
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// Run one sync against the current wall clock.
    pub fn tick(&mut self) -> Result<TickOutcome, MonitorError> {
        self.tick_at(Instant::now())
    }

    /// Run one sync as if the current time were `now`.
    ///
    /// Errors leave the state untouched apart from the start timestamp; the
    /// next sync starts over from reading the active manifest.
    pub fn tick_at(&mut self, now: Instant) -> Result<TickOutcome, MonitorError> {
        // TODO: take the installer's exclusive lock for the whole sync once it
        // exists, otherwise a new revision written by the installer can be
        // overwritten by a concurrent fall back.
        match self.phase {
            Phase::Watching => {}
            Phase::FellBack {
                marker_removed: true,
            } => return Ok(TickOutcome::Finished),
            Phase::FellBack {
                marker_removed: false,
            } => return self.remove_marker_after_fallback(),
        }

        // Refuse to act on a manifest of another revision, this instance may be
        // stale after an upgrade or a downgrade.
        let observed = read_active_revision(self.fs.as_ref(), &self.layout)?;
        if observed != self.revision {
            info!(
                "Stopping further processing because the monitor is watching revision {} and the current target's revision is {}",
                self.revision, observed
            );
            return Ok(TickOutcome::RevisionMismatch {
                watching: self.revision,
                observed,
            });
        }

        let started = *self.monitor_timestamp.get_or_insert(now);

        if (self.is_target_healthy)() {
            info!("Observed a healthy target, creating last known good revision");
            promote_and_retire(self.fs.as_ref(), &self.layout, self.revision)?;
            return Ok(TickOutcome::Retired);
        }

        // A timeout too large to represent never expires.
        let expired = started
            .checked_add(self.timeout)
            .is_some_and(|deadline| now > deadline);
        if expired {
            info!(
                "Timed out while waiting for the target to become healthy, starting a fall back procedure"
            );
            let outcome =
                fallback_to_previous_revision(self.fs.as_ref(), &self.layout, self.revision)?;
            return match outcome {
                FallbackOutcome::Restored { .. } => {
                    // The watched revision may be the restored one, never fall
                    // back twice.
                    self.phase = Phase::FellBack {
                        marker_removed: false,
                    };
                    self.remove_marker_after_fallback()
                }
                FallbackOutcome::NoCandidate => Ok(TickOutcome::NoFallbackCandidate),
            };
        }

        Ok(TickOutcome::Waiting)
    }

    fn remove_marker_after_fallback(&mut self) -> Result<TickOutcome, MonitorError> {
        let marker = self.layout.self_marker();
        if remove_if_exists(self.fs.as_ref(), &marker)? {
            info!("Removed the startup monitor marker {}", marker.display());
        }
        self.phase = Phase::FellBack {
            marker_removed: true,
        };
        Ok(TickOutcome::FellBack)
    }
}

/// Read the active manifest of the target and return its revision.
///
/// The installer may be rewriting the file at the same time, a failure here is
/// expected to be retried.
pub fn read_active_revision(
    fs: &dyn FileSystem,
    layout: &TargetLayout,
) -> Result<Revision, MonitorError> {
    let path = layout.active_manifest();
    let raw = fs.read_file(&path).map_err(|e| MonitorError::io(&path, e))?;
    PodManifest::from_slice(&raw)
        .and_then(|pod| pod.revision())
        .map_err(|e| MonitorError::manifest(&path, e))
}
