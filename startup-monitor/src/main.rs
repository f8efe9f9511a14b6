use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use startup_monitor::config::{Cli, MonitorConfig, init_logging};
use startup_monitor::health::{ReadinessFile, never_healthy};
use startup_monitor::{HostFs, StartupMonitor, runner, signal};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    let cfg = MonitorConfig::load(&cli)?;
    debug!("{cfg:?}");

    let shutdown = signal::shutdown_token();
    let layout = cfg.layout();
    let fs = Arc::new(HostFs);

    let revision = match cfg.revision {
        Some(revision) => revision,
        None => match runner::pin_revision(
            fs.clone(),
            layout.clone(),
            cfg.probe_interval,
            shutdown.clone(),
        )
        .await
        .context("failed to determine the revision to watch")?
        {
            Some(revision) => revision,
            None => {
                info!("Shut down before a revision to watch was found");
                return Ok(());
            }
        },
    };

    let health = match &cfg.ready_file {
        Some(path) => {
            let readiness = ReadinessFile::new(path);
            let check = readiness.health_check();
            readiness.spawn(cfg.probe_interval, shutdown.child_token());
            check
        }
        None => never_healthy(),
    };

    let monitor = StartupMonitor::new(Box::new(fs), layout, revision, health)
        .with_timeout(cfg.fallback_timeout)
        .with_probe_interval(cfg.probe_interval);

    let outcome = runner::run(monitor, shutdown.clone())
        .await
        .context("startup monitor failed")?;
    if let Some(outcome) = outcome {
        info!("Startup monitor finished: {outcome:?}");
    }
    shutdown.cancel();
    Ok(())
}
