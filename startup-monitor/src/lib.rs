pub mod config;
pub mod error;
pub mod fallback;
pub mod fs;
pub mod health;
pub mod layout;
pub mod monitor;
pub mod revision;
pub mod runner;
pub mod signal;

// re-export selected public API
pub use error::MonitorError;
pub use fallback::{FallbackOutcome, fallback_to_previous_revision, promote_and_retire};
pub use fs::{FileSystem, HostFs};
pub use layout::TargetLayout;
pub use monitor::{HealthCheck, StartupMonitor, TickOutcome};
pub use revision::find_previous_revision;
