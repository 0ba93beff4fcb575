//! Studio configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use aplus_session::StoreConfig;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding session documents and artifact blobs
    pub session_dir: PathBuf,
    /// Idle time after which a session expires
    pub session_timeout_hours: u64,
    /// Upper bound on live sessions
    pub max_concurrent_sessions: usize,
    /// Period of the background expiry sweep; 0 disables it
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            session_dir: data_dir.join("aplus_sessions"),
            session_timeout_hours: 24,
            max_concurrent_sessions: 100,
            sweep_interval_secs: default_sweep_interval(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("APlusStudio"))
            .unwrap_or_else(|| PathBuf::from(".aplus"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_hours.saturating_mul(3600))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Validated settings for the session store
    pub fn store_config(&self) -> Result<StoreConfig> {
        StoreConfig::new(
            self.session_dir.clone(),
            self.session_timeout(),
            self.max_concurrent_sessions,
        )
        .map_err(|e| CoreError::Config(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

fn default_sweep_interval() -> u64 {
    300
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/data"));
        assert_eq!(config.session_dir, PathBuf::from("/data/aplus_sessions"));
        assert_eq!(config.session_timeout(), Duration::from_secs(24 * 3600));
        assert_eq!(config.max_concurrent_sessions, 100);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new(dir.path().to_path_buf());
        config.max_concurrent_sessions = 7;
        config.sweep_interval_secs = 0;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.sweep_interval(), None);
    }

    #[test]
    fn test_sweep_interval_defaults_when_missing() {
        let json = r#"{
            "session_dir": "/tmp/s",
            "session_timeout_hours": 2,
            "max_concurrent_sessions": 5
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.sweep_interval_secs, 300);
    }

    #[test]
    fn test_store_config_validates() {
        let mut config = Config::new(PathBuf::from("/data"));
        let store = config.store_config().unwrap();
        assert_eq!(store.max_concurrent_sessions(), 100);

        config.max_concurrent_sessions = 0;
        assert!(matches!(config.store_config(), Err(CoreError::Config(_))));

        config.max_concurrent_sessions = 1;
        config.session_timeout_hours = 0;
        assert!(matches!(config.store_config(), Err(CoreError::Config(_))));
    }
}
