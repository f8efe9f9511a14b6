//! Health predicate backed by a readiness file.
//!
//! The file is polled by a background task and the last observation is kept
//! in an atomic, so the [`HealthCheck`] handed to the monitor never does I/O.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::monitor::HealthCheck;

pub struct ReadinessFile {
    path: PathBuf,
    ready: Arc<AtomicBool>,
}

impl ReadinessFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ReadinessFile {
            path: path.into(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn health_check(&self) -> HealthCheck {
        let ready = self.ready.clone();
        Arc::new(move || ready.load(Ordering::Acquire))
    }

    /// Poll the file every `interval` until `token` is cancelled.
    pub fn spawn(self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let exists = tokio::fs::try_exists(&self.path).await.unwrap_or(false);
                let was = self.ready.swap(exists, Ordering::AcqRel);
                if exists != was {
                    info!("Readiness file {:?} present: {exists}", self.path);
                } else {
                    debug!("Readiness file {:?} present: {exists}", self.path);
                }
            }
        })
    }
}

/// A target that is never reported healthy; only the fall back can happen.
pub fn never_healthy() -> HealthCheck {
    Arc::new(|| false)
}
