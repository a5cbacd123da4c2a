//! Runtime configuration collected from the command line and environment

use std::path::PathBuf;
use std::time::Duration;

/// Settings the app is started with
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, e.g. `http://localhost:5000/api`
    pub api_url: String,
    pub alert_interval: Duration,
    pub status_reset_delay: Duration,
    pub request_timeout: Duration,
    pub log_file: PathBuf,
    pub debug: bool,
}

/// `companion-terminal.log` under the platform data dir, or the cwd
pub fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("companion-terminal"))
        .unwrap_or_default()
        .join("companion-terminal.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_file_name() {
        let path = default_log_file();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("companion-terminal.log")
        );
    }
}
