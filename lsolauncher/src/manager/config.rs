//! Configuration for installs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConfigFile, InstallRootPreference, DEFAULT_DOWNLOAD_TIMEOUT_SECS};

/// Default interval between progress samples.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for the installer pipelines and the orchestrator.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory holding per-task scratch directories.
    pub temp_dir: PathBuf,

    /// Hard limit for a single download.
    pub download_timeout: Duration,

    /// How often download progress is sampled.
    pub progress_interval: Duration,

    /// Minimum free space, in bytes, for automatic drive selection.
    pub min_free_space: u64,

    /// How install directories are chosen.
    pub install_root: InstallRootPreference,

    /// Download URL overrides keyed by lowercase component code.
    pub download_urls: HashMap<String, String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("lsolauncher"),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            min_free_space: crate::config::DEFAULT_MIN_FREE_SPACE_MB * 1024 * 1024,
            install_root: InstallRootPreference::Auto,
            download_urls: HashMap::new(),
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration taken from the launcher settings file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let mut manager = Self::default()
            .with_download_timeout(Duration::from_secs(config.downloads.timeout_secs))
            .with_min_free_space(config.launcher.min_free_space_mb * 1024 * 1024)
            .with_install_root(config.launcher.install_root.clone());
        if let Some(temp) = &config.launcher.temp_dir {
            manager = manager.with_temp_dir(temp.clone());
        }
        for (code, url) in &config.downloads.urls {
            manager = manager.with_download_url(code, url.clone());
        }
        manager
    }

    pub fn with_temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = path;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_min_free_space(mut self, bytes: u64) -> Self {
        self.min_free_space = bytes;
        self
    }

    pub fn with_install_root(mut self, preference: InstallRootPreference) -> Self {
        self.install_root = preference;
        self
    }

    /// Override the download URL of one component.
    pub fn with_download_url(mut self, code: &str, url: impl Into<String>) -> Self {
        self.download_urls
            .insert(code.to_ascii_lowercase(), url.into());
        self
    }

    /// Scratch directory of one task.
    pub fn scratch_dir(&self, task_id: &str) -> PathBuf {
        self.temp_dir.join(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.download_timeout, Duration::from_secs(300));
        assert_eq!(config.progress_interval, Duration::from_millis(250));
        assert_eq!(config.install_root, InstallRootPreference::Auto);
        assert!(config.download_urls.is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ManagerConfig::new()
            .with_temp_dir(PathBuf::from("/tmp/lso"))
            .with_download_timeout(Duration::from_secs(5))
            .with_min_free_space(10)
            .with_download_url("LSO", "https://mirror.example/lso.zip");

        assert_eq!(config.scratch_dir("task-1"), PathBuf::from("/tmp/lso/task-1"));
        assert_eq!(config.download_timeout, Duration::from_secs(5));
        assert_eq!(config.min_free_space, 10);
        assert_eq!(
            config.download_urls.get("lso").map(String::as_str),
            Some("https://mirror.example/lso.zip")
        );
    }

    #[test]
    fn test_from_config_file() {
        let mut file = ConfigFile::default();
        file.downloads.timeout_secs = 42;
        file.launcher.min_free_space_mb = 1;
        file.launcher.install_root = InstallRootPreference::Fixed(PathBuf::from("/games"));
        file.downloads
            .urls
            .insert("tso".to_string(), "https://mirror.example/tso.zip".to_string());

        let config = ManagerConfig::from_config_file(&file);
        assert_eq!(config.download_timeout, Duration::from_secs(42));
        assert_eq!(config.min_free_space, 1024 * 1024);
        assert_eq!(
            config.install_root,
            InstallRootPreference::Fixed(PathBuf::from("/games"))
        );
        assert!(config.download_urls.contains_key("tso"));
    }
}
