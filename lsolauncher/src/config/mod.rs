//! Persistent launcher settings.
//!
//! The settings file is an INI file at `<config dir>/lsolauncher/launcher.ini`
//! (overridable with the `LSOLAUNCHER_CONFIG` environment variable). It holds
//! the launcher and game options and the backup registry of confirmed
//! install paths.

mod file;
mod game;
mod keys;

pub use file::{
    ConfigFile, DownloadSettings, GameSettings, InstallRootPreference, LauncherSettings,
    LocalRegistry, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_MIN_FREE_SPACE_MB,
};
pub use game::{
    GameLanguage, GraphicsMode, RefreshBounds, DEFAULT_REFRESH_RATE, MAX_REFRESH_RATE,
    MIN_REFRESH_RATE,
};
pub use keys::ConfigKey;

pub(crate) use file::{read_ini, update_ini};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable that overrides the settings file location.
pub const CONFIG_ENV: &str = "LSOLAUNCHER_CONFIG";

/// Result type for settings operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors reading or writing settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to write settings to {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Path of the settings file.
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    config_dir().join("launcher.ini")
}

/// Per-user configuration directory of the launcher.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lsolauncher")
}

/// Per-user data directory of the launcher (logs, default install roots).
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lsolauncher")
}

/// Directory for session log files.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}
