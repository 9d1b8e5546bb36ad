use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::{models::RecordLabels, watch::LogFileFilter};

pub const DEFAULT_PORT: u16 = 9009;
pub const DEFAULT_INACTIVITY_SECONDS: u64 = 60;
pub const DEFAULT_MONITOR_INTERVAL_SECONDS: f64 = 0.25;
pub const MAX_INACTIVITY_SECONDS: u64 = 7 * 24 * 60 * 60;
pub const MAX_MONITOR_INTERVAL_SECONDS: f64 = 60.0 * 60.0;

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Live performance-measurement harness", long_about = None)]
pub struct CliArgs {
    /// JSON settings file; flags given here override it.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory to save test results.
    #[arg(long)]
    pub outdir: Option<PathBuf>,
    #[arg(long)]
    pub host: Option<String>,
    /// Port for the control channel.
    #[arg(long)]
    pub port: Option<u16>,
    /// Seconds without file activity before a session closes.
    #[arg(long)]
    pub inactivity_seconds: Option<u64>,
    /// Interval for system resource sampling.
    #[arg(long)]
    pub monitor_interval_seconds: Option<f64>,
    /// File extensions treated as logs, e.g. `--extensions log,txt`.
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,
    #[arg(long)]
    pub condition: Option<String>,
    #[arg(long)]
    pub test: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    /// Also watch each tracked file through its own watcher.
    #[arg(long)]
    pub watch_file_directly: bool,
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    pub outdir: PathBuf,
    pub host: String,
    pub port: u16,
    pub inactivity_seconds: u64,
    pub monitor_interval_seconds: f64,
    pub log_extensions: Vec<String>,
    pub condition: String,
    pub test: String,
    pub notes: String,
    pub watch_file_directly: bool,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("results"),
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            inactivity_seconds: DEFAULT_INACTIVITY_SECONDS,
            monitor_interval_seconds: DEFAULT_MONITOR_INTERVAL_SECONDS,
            log_extensions: vec!["log".into(), "txt".into()],
            condition: "live_monitoring".into(),
            test: "log_file_activity".into(),
            notes: String::new(),
            watch_file_directly: false,
        }
    }
}

impl HarnessSettings {
    /// Defaults, then the settings file if given, then command-line flags.
    pub fn resolve(cli: &CliArgs) -> Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(outdir) = &cli.outdir {
            self.outdir = outdir.clone();
        }
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(seconds) = cli.inactivity_seconds {
            self.inactivity_seconds = seconds;
        }
        if let Some(seconds) = cli.monitor_interval_seconds {
            self.monitor_interval_seconds = seconds;
        }
        if let Some(extensions) = &cli.extensions {
            self.log_extensions = extensions.clone();
        }
        if let Some(condition) = &cli.condition {
            self.condition = condition.clone();
        }
        if let Some(test) = &cli.test {
            self.test = test.clone();
        }
        if let Some(notes) = &cli.notes {
            self.notes = notes.clone();
        }
        if cli.watch_file_directly {
            self.watch_file_directly = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_INACTIVITY_SECONDS).contains(&self.inactivity_seconds) {
            bail!(
                "inactivity_seconds must be between 1 and {MAX_INACTIVITY_SECONDS}, got {}",
                self.inactivity_seconds
            );
        }
        let interval = self.monitor_interval_seconds;
        if !(interval > 0.0 && interval <= MAX_MONITOR_INTERVAL_SECONDS) {
            bail!(
                "monitor_interval_seconds must be in (0, {MAX_MONITOR_INTERVAL_SECONDS}], got {interval}"
            );
        }
        if LogFileFilter::new(&self.log_extensions).extensions().is_empty() {
            bail!("at least one log file extension is required");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            inactivity: Duration::from_secs(self.inactivity_seconds),
            sample_interval: Duration::from_secs_f64(self.monitor_interval_seconds),
            filter: LogFileFilter::new(&self.log_extensions),
            labels: RecordLabels {
                condition: self.condition.clone(),
                test: self.test.clone(),
                notes: self.notes.clone(),
            },
            watch_file_directly: self.watch_file_directly,
        }
    }
}

/// Runtime view shared by every session.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub inactivity: Duration,
    pub sample_interval: Duration,
    pub filter: LogFileFilter,
    pub labels: RecordLabels,
    pub watch_file_directly: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        HarnessSettings::default().monitor_settings()
    }
}
