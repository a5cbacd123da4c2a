//! Companion Terminal - a voice and text client for a companion assistant

mod api;
mod app;
mod assistant;
mod config;
mod error;
mod ui;
mod voice;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "companion-terminal")]
#[command(about = "A voice and text client for a companion assistant")]
#[command(version)]
struct Args {
    /// Backend base URL
    #[arg(short, long, env = "COMPANION_API_URL", default_value = api::DEFAULT_API_URL)]
    api_url: String,

    /// Seconds between caregiver alert checks
    #[arg(long, env = "COMPANION_ALERT_INTERVAL", default_value_t = 60)]
    alert_interval: u64,

    /// Milliseconds before an error status returns to idle
    #[arg(long, env = "COMPANION_STATUS_RESET_MS", default_value_t = 2000)]
    status_reset: u64,

    /// Request timeout in seconds
    #[arg(long, env = "COMPANION_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Log file (the terminal is taken by the UI)
    #[arg(long, env = "COMPANION_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            api_url: self.api_url,
            alert_interval: Duration::from_secs(self.alert_interval.max(1)),
            status_reset_delay: Duration::from_millis(self.status_reset),
            request_timeout: Duration::from_secs(self.timeout.max(1)),
            log_file: self.log_file.unwrap_or_else(config::default_log_file),
            debug: self.debug,
        }
    }
}

fn init_logging(config: &Config) -> Result<()> {
    if let Some(dir) = config.log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("opening log file {}", config.log_file.display()))?;

    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::sync::Mutex::new(file)).with_ansi(false))
        .with(filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config();
    init_logging(&config)?;

    let mut app = app::App::new(&config)?;
    app.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Args::parse_from(["companion-terminal"]).into_config();
        assert_eq!(config.api_url, "http://localhost:5000/api");
        assert_eq!(config.alert_interval, Duration::from_secs(60));
        assert_eq!(config.status_reset_delay, Duration::from_millis(2000));
        assert!(!config.debug);
    }

    #[test]
    fn test_overrides() {
        let config = Args::parse_from([
            "companion-terminal",
            "--api-url",
            "http://10.0.0.2:5000/api",
            "--alert-interval",
            "0",
            "--log-file",
            "/tmp/companion.log",
            "--debug",
        ])
        .into_config();
        assert_eq!(config.api_url, "http://10.0.0.2:5000/api");
        assert_eq!(config.alert_interval, Duration::from_secs(1));
        assert_eq!(config.log_file, PathBuf::from("/tmp/companion.log"));
        assert!(config.debug);
    }
}
