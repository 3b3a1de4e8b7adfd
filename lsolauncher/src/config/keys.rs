//! Settings addressable from the command line as `section.key`.

use std::str::FromStr;

use super::file::ConfigFile;
use super::ConfigError;

/// Component codes whose download URL can be overridden.
const URL_CODES: &[&str] = &["tso", "lso", "rms", "simitone", "openal", "net", "macextras"];

/// A settings key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKey {
    LauncherInstallRoot,
    LauncherMinFreeSpace,
    LauncherTempDir,
    GameGraphicsMode,
    GameLanguage,
    GameRefreshRate,
    DownloadsTimeout,
    /// Download URL override for a component code.
    DownloadUrl(String),
}

impl ConfigKey {
    /// Every key, in listing order.
    pub fn all() -> Vec<ConfigKey> {
        let mut keys = vec![
            Self::LauncherInstallRoot,
            Self::LauncherMinFreeSpace,
            Self::LauncherTempDir,
            Self::GameGraphicsMode,
            Self::GameLanguage,
            Self::GameRefreshRate,
            Self::DownloadsTimeout,
        ];
        keys.extend(URL_CODES.iter().map(|c| Self::DownloadUrl(c.to_string())));
        keys
    }

    pub fn section(&self) -> &'static str {
        match self {
            Self::LauncherInstallRoot | Self::LauncherMinFreeSpace | Self::LauncherTempDir => {
                "launcher"
            }
            Self::GameGraphicsMode | Self::GameLanguage | Self::GameRefreshRate => "game",
            Self::DownloadsTimeout | Self::DownloadUrl(_) => "downloads",
        }
    }

    pub fn key_name(&self) -> String {
        match self {
            Self::LauncherInstallRoot => "install_root".to_string(),
            Self::LauncherMinFreeSpace => "min_free_space_mb".to_string(),
            Self::LauncherTempDir => "temp_dir".to_string(),
            Self::GameGraphicsMode => "graphics_mode".to_string(),
            Self::GameLanguage => "language".to_string(),
            Self::GameRefreshRate => "refresh_rate".to_string(),
            Self::DownloadsTimeout => "timeout".to_string(),
            Self::DownloadUrl(code) => code.clone(),
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::LauncherInstallRoot => config.launcher.install_root.to_string(),
            Self::LauncherMinFreeSpace => config.launcher.min_free_space_mb.to_string(),
            Self::LauncherTempDir => config
                .launcher
                .temp_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            Self::GameGraphicsMode => config.game.graphics_mode.to_string(),
            Self::GameLanguage => config.game.language.to_string(),
            Self::GameRefreshRate => config.game.refresh_rate().to_string(),
            Self::DownloadsTimeout => config.downloads.timeout_secs.to_string(),
            Self::DownloadUrl(code) => config.downloads.urls.get(code).cloned().unwrap_or_default(),
        }
    }

    /// Parse and store a value. Returns the value as stored, which differs
    /// from the input when it was normalized or clamped.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<String, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        };
        let value = value.trim();

        match self {
            Self::LauncherInstallRoot => {
                config.launcher.install_root = value.parse().map_err(invalid)?;
            }
            Self::LauncherMinFreeSpace => {
                config.launcher.min_free_space_mb =
                    value.parse().map_err(|_| invalid("expected a size in MB".to_string()))?;
            }
            Self::LauncherTempDir => {
                config.launcher.temp_dir = (!value.is_empty()).then(|| value.into());
            }
            Self::GameGraphicsMode => {
                config.game.graphics_mode = value.parse().map_err(invalid)?;
            }
            Self::GameLanguage => {
                config.game.language = value.parse().map_err(invalid)?;
            }
            Self::GameRefreshRate => {
                let rate: u32 = value
                    .parse()
                    .map_err(|_| invalid("expected a whole number of Hz".to_string()))?;
                config.game.set_refresh_rate(rate);
            }
            Self::DownloadsTimeout => {
                let secs: u64 = value
                    .parse()
                    .map_err(|_| invalid("expected a number of seconds".to_string()))?;
                if secs == 0 {
                    return Err(invalid("timeout must be positive".to_string()));
                }
                config.downloads.timeout_secs = secs;
            }
            Self::DownloadUrl(code) => {
                if value.is_empty() {
                    config.downloads.urls.remove(code);
                } else if value.starts_with("http://") || value.starts_with("https://") {
                    config.downloads.urls.insert(code.clone(), value.to_string());
                } else {
                    return Err(invalid("expected an http(s) URL".to_string()));
                }
            }
        }

        Ok(self.get(config))
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let key = match lower.as_str() {
            "launcher.install_root" => Self::LauncherInstallRoot,
            "launcher.min_free_space_mb" => Self::LauncherMinFreeSpace,
            "launcher.temp_dir" => Self::LauncherTempDir,
            "game.graphics_mode" => Self::GameGraphicsMode,
            "game.language" => Self::GameLanguage,
            "game.refresh_rate" => Self::GameRefreshRate,
            "downloads.timeout" => Self::DownloadsTimeout,
            other => match other.strip_prefix("downloads.") {
                Some(code) if URL_CODES.contains(&code) => Self::DownloadUrl(code.to_string()),
                _ => return Err(ConfigError::UnknownKey(s.to_string())),
            },
        };
        Ok(key)
    }
}
