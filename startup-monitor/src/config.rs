use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use common::Revision;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::layout::TargetLayout;
use crate::monitor::{DEFAULT_FALLBACK_TIMEOUT, DEFAULT_PROBE_INTERVAL};

pub const DEFAULT_TARGET: &str = "kube-apiserver";
pub const DEFAULT_MANIFESTS_DIR: &str = "/etc/kubernetes/manifests";
pub const DEFAULT_RESOURCES_DIR: &str = "/etc/kubernetes/static-pod-resources";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "startup-monitor",
    version,
    about = "Monitors the provided static pod revision and if it proves unhealthy rolls back to the previous revision."
)]
pub struct Cli {
    /// YAML file with defaults for the options below, flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Name of the static pod to watch
    #[arg(long)]
    pub target: Option<String>,

    /// Directory holding the root manifests
    #[arg(long, value_name = "DIR")]
    pub manifests_dir: Option<PathBuf>,

    /// Directory holding the revisioned manifests
    #[arg(long, value_name = "DIR")]
    pub resources_dir: Option<PathBuf>,

    /// Revision to watch, read from the active manifest when omitted
    #[arg(long)]
    pub revision: Option<Revision>,

    /// Maximum time to wait for the target to become healthy (default: 2m)
    #[arg(long = "fallback-timeout-duration", value_parser = parse_duration)]
    pub fallback_timeout: Option<Duration>,

    /// How often the target's health is assessed (default: 1s)
    #[arg(long, value_parser = parse_duration)]
    pub probe_interval: Option<Duration>,

    /// The target is considered healthy while this file exists
    #[arg(long, value_name = "PATH")]
    pub ready_file: Option<PathBuf>,

    /// Default log filter, RUST_LOG overrides it
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// On disk form of the configuration, every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub target: Option<String>,
    pub manifests_dir: Option<PathBuf>,
    pub resources_dir: Option<PathBuf>,
    pub revision: Option<Revision>,
    pub fallback_timeout_duration: Option<String>,
    pub probe_interval: Option<String>,
    pub ready_file: Option<PathBuf>,
}

/// Validated settings the monitor is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub target: String,
    pub manifests_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub revision: Option<Revision>,
    pub fallback_timeout: Duration,
    pub probe_interval: Duration,
    pub ready_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            target: DEFAULT_TARGET.to_string(),
            manifests_dir: PathBuf::from(DEFAULT_MANIFESTS_DIR),
            resources_dir: PathBuf::from(DEFAULT_RESOURCES_DIR),
            revision: None,
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            ready_file: None,
        }
    }
}

impl MonitorConfig {
    /// Merge defaults, the optional config file and the flags, then validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = MonitorConfig::default();
        if let Some(path) = &cli.config {
            cfg.apply_file(load_file_config(path)?)?;
        }
        cfg.apply_cli(cli);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<()> {
        if let Some(target) = file.target {
            self.target = target;
        }
        if let Some(dir) = file.manifests_dir {
            self.manifests_dir = dir;
        }
        if let Some(dir) = file.resources_dir {
            self.resources_dir = dir;
        }
        if file.revision.is_some() {
            self.revision = file.revision;
        }
        if let Some(timeout) = file.fallback_timeout_duration {
            self.fallback_timeout = parse_duration(&timeout)
                .map_err(|e| anyhow!("invalid fallback-timeout-duration: {e}"))?;
        }
        if let Some(interval) = file.probe_interval {
            self.probe_interval =
                parse_duration(&interval).map_err(|e| anyhow!("invalid probe-interval: {e}"))?;
        }
        if file.ready_file.is_some() {
            self.ready_file = file.ready_file;
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(target) = &cli.target {
            self.target = target.clone();
        }
        if let Some(dir) = &cli.manifests_dir {
            self.manifests_dir = dir.clone();
        }
        if let Some(dir) = &cli.resources_dir {
            self.resources_dir = dir.clone();
        }
        if cli.revision.is_some() {
            self.revision = cli.revision;
        }
        if let Some(timeout) = cli.fallback_timeout {
            self.fallback_timeout = timeout;
        }
        if let Some(interval) = cli.probe_interval {
            self.probe_interval = interval;
        }
        if cli.ready_file.is_some() {
            self.ready_file = cli.ready_file.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fallback_timeout.is_zero() {
            bail!("--fallback-timeout-duration cannot be 0");
        }
        if self.probe_interval.is_zero() {
            bail!("--probe-interval cannot be 0");
        }
        if self.target.is_empty() {
            bail!("--target cannot be empty");
        }
        Ok(())
    }

    pub fn layout(&self) -> TargetLayout {
        TargetLayout::new(
            self.target.clone(),
            self.manifests_dir.clone(),
            self.resources_dir.clone(),
        )
    }
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let cfg: FileConfig = serde_yaml::from_str(&content).context("Failed to parse YAML config")?;
    Ok(cfg)
}

/// Parse `250ms`, `30s`, `2m`, `1h` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {s:?}"))?;
    let secs = match unit {
        "ms" => return Ok(Duration::from_millis(n)),
        "" | "s" => Some(n),
        "m" => n.checked_mul(60),
        "h" => n.checked_mul(60 * 60),
        _ => return Err(format!("invalid duration unit in {s:?}")),
    };
    secs.map(Duration::from_secs)
        .ok_or_else(|| format!("duration {s:?} out of range"))
}

/// Install the global tracing subscriber.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {level:?}"))?;
    let res = match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };
    res.map_err(|e| anyhow!("failed to install the log subscriber: {e}"))
}
