//! The launcher settings file.
//!
//! Settings live in a single INI file. Each writer touches only its own
//! keys and leaves everything else in the file alone, so the settings
//! commands and the backup registry can share one file.
//!
//! ```ini
//! [Launcher]
//! InstallRoot = auto
//! MinFreeSpaceMB = 2048
//!
//! [Game]
//! GraphicsMode = ogl
//! Language = English
//! RefreshRate = 60
//!
//! [Downloads]
//! Timeout = 300
//! lso = https://mirror.example/lso.zip
//!
//! [LocalRegistry]
//! LSO = /home/user/Games/LegacySO
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use ini::Ini;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::game::{GameLanguage, GraphicsMode, RefreshBounds, DEFAULT_REFRESH_RATE};
use super::{config_file_path, ConfigError, ConfigResult};

pub(crate) const SECTION_LAUNCHER: &str = "Launcher";
pub(crate) const SECTION_GAME: &str = "Game";
pub(crate) const SECTION_DOWNLOADS: &str = "Downloads";
pub(crate) const SECTION_LOCAL_REGISTRY: &str = "LocalRegistry";

/// Default minimum free space for automatic drive selection, in MB.
pub const DEFAULT_MIN_FREE_SPACE_MB: u64 = 2048;

/// Default limit on the duration of one download, in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Where new installs go when no directory is given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstallRootPreference {
    /// Pick the drive with the most free space, prompting if none qualifies.
    #[default]
    Auto,
    /// Always prompt.
    Ask,
    /// Always install beneath this directory.
    Fixed(PathBuf),
}

impl fmt::Display for InstallRootPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Ask => f.write_str("ask"),
            Self::Fixed(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for InstallRootPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" => Err("install root must be 'auto', 'ask' or a directory".to_string()),
            "auto" => Ok(Self::Auto),
            "ask" => Ok(Self::Ask),
            _ => Ok(Self::Fixed(PathBuf::from(s))),
        }
    }
}

/// `[Launcher]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherSettings {
    pub install_root: InstallRootPreference,
    pub min_free_space_mb: u64,
    /// Root for scratch directories; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            install_root: InstallRootPreference::Auto,
            min_free_space_mb: DEFAULT_MIN_FREE_SPACE_MB,
            temp_dir: None,
        }
    }
}

/// `[Game]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    pub graphics_mode: GraphicsMode,
    pub language: GameLanguage,
    refresh_rate: u32,
    pub refresh_bounds: RefreshBounds,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            graphics_mode: GraphicsMode::default(),
            language: GameLanguage::default(),
            refresh_rate: DEFAULT_REFRESH_RATE,
            refresh_bounds: RefreshBounds::default(),
        }
    }
}

impl GameSettings {
    pub fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }

    /// Store a refresh rate, clamped into the configured bounds.
    ///
    /// Returns the value actually stored.
    pub fn set_refresh_rate(&mut self, rate: u32) -> u32 {
        self.refresh_rate = self.refresh_bounds.clamp(rate);
        self.refresh_rate
    }
}

/// `[Downloads]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub timeout_secs: u64,
    /// Download URL overrides keyed by lowercase component code.
    pub urls: BTreeMap<String, String>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            urls: BTreeMap::new(),
        }
    }
}

/// Parsed launcher settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub launcher: LauncherSettings,
    pub game: GameSettings,
    pub downloads: DownloadSettings,
}

impl ConfigFile {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let ini = read_ini(path)?;
        Ok(Self::from_ini(&ini))
    }

    /// Save to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, keeping sections this type does not own.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        update_ini(path, |ini| self.write_into(ini))
    }

    fn from_ini(ini: &Ini) -> Self {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(SECTION_LAUNCHER)) {
            if let Some(value) = section.get("InstallRoot") {
                match value.parse() {
                    Ok(pref) => config.launcher.install_root = pref,
                    Err(e) => warn!(error = %e, "Ignoring invalid InstallRoot"),
                }
            }
            if let Some(mb) = section.get("MinFreeSpaceMB").and_then(|v| v.trim().parse().ok()) {
                config.launcher.min_free_space_mb = mb;
            }
            config.launcher.temp_dir = section
                .get("TempDir")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from);
        }

        if let Some(section) = ini.section(Some(SECTION_GAME)) {
            if let Some(mode) = section.get("GraphicsMode").and_then(|v| v.parse().ok()) {
                config.game.graphics_mode = mode;
            }
            if let Some(lang) = section.get("Language").and_then(|v| v.parse().ok()) {
                config.game.language = lang;
            }
            if let Some(rate) = section.get("RefreshRate").and_then(|v| v.trim().parse().ok()) {
                config.game.set_refresh_rate(rate);
            }
        }

        if let Some(section) = ini.section(Some(SECTION_DOWNLOADS)) {
            for (key, value) in section.iter() {
                if key.eq_ignore_ascii_case("Timeout") {
                    if let Ok(secs) = value.trim().parse() {
                        config.downloads.timeout_secs = secs;
                    }
                } else if !value.trim().is_empty() {
                    config
                        .downloads
                        .urls
                        .insert(key.to_ascii_lowercase(), value.trim().to_string());
                }
            }
        }

        config
    }

    fn write_into(&self, ini: &mut Ini) {
        ini.with_section(Some(SECTION_LAUNCHER))
            .set("InstallRoot", self.launcher.install_root.to_string())
            .set("MinFreeSpaceMB", self.launcher.min_free_space_mb.to_string());
        match &self.launcher.temp_dir {
            Some(dir) => {
                ini.with_section(Some(SECTION_LAUNCHER))
                    .set("TempDir", dir.to_string_lossy());
            }
            None => {
                ini.delete_from(Some(SECTION_LAUNCHER), "TempDir");
            }
        }

        ini.with_section(Some(SECTION_GAME))
            .set("GraphicsMode", self.game.graphics_mode.as_str())
            .set("Language", self.game.language.name())
            .set("RefreshRate", self.game.refresh_rate().to_string());

        let stale: Vec<String> = ini
            .section(Some(SECTION_DOWNLOADS))
            .map(|s| {
                s.iter()
                    .map(|(k, _)| k.to_string())
                    .filter(|k| !k.eq_ignore_ascii_case("Timeout"))
                    .collect()
            })
            .unwrap_or_default();
        for key in stale {
            ini.delete_from(Some(SECTION_DOWNLOADS), &key);
        }
        ini.with_section(Some(SECTION_DOWNLOADS))
            .set("Timeout", self.downloads.timeout_secs.to_string());
        for (code, url) in &self.downloads.urls {
            ini.with_section(Some(SECTION_DOWNLOADS)).set(code, url);
        }
    }
}

/// The backup registry: confirmed install paths kept in the settings file.
///
/// Written whenever a path is confirmed so discovery still works when the
/// platform store is unreadable.
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    path: PathBuf,
}

impl LocalRegistry {
    /// Registry stored in the settings file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry stored in the default settings file.
    pub fn default_location() -> Self {
        Self::new(config_file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded path for a component code, if any.
    pub fn get(&self, code: &str) -> Option<PathBuf> {
        self.entries().remove(&code.to_ascii_lowercase())
    }

    /// All recorded paths keyed by lowercase code. Unreadable files yield
    /// an empty map.
    pub fn entries(&self) -> BTreeMap<String, PathBuf> {
        if !self.path.exists() {
            return BTreeMap::new();
        }
        match read_ini(&self.path) {
            Ok(ini) => ini
                .section(Some(SECTION_LOCAL_REGISTRY))
                .map(|section| {
                    section
                        .iter()
                        .filter(|(_, v)| !v.trim().is_empty())
                        .map(|(k, v)| (k.to_ascii_lowercase(), PathBuf::from(v.trim())))
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Backup registry unreadable");
                BTreeMap::new()
            }
        }
    }

    /// Record `dir` for `code`, replacing any earlier entry.
    pub fn set(&self, code: &str, dir: &Path) -> ConfigResult<()> {
        update_ini(&self.path, |ini| {
            remove_key_ignoring_case(ini, code);
            ini.with_section(Some(SECTION_LOCAL_REGISTRY))
                .set(code, dir.to_string_lossy());
        })
    }

    /// Forget the entry for `code`.
    pub fn remove(&self, code: &str) -> ConfigResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        update_ini(&self.path, |ini| remove_key_ignoring_case(ini, code))
    }
}

fn remove_key_ignoring_case(ini: &mut Ini, code: &str) {
    let existing: Vec<String> = ini
        .section(Some(SECTION_LOCAL_REGISTRY))
        .map(|s| {
            s.iter()
                .map(|(k, _)| k.to_string())
                .filter(|k| k.eq_ignore_ascii_case(code))
                .collect()
        })
        .unwrap_or_default();
    for key in existing {
        ini.delete_from(Some(SECTION_LOCAL_REGISTRY), &key);
    }
}

pub(crate) fn read_ini(path: &Path) -> ConfigResult<Ini> {
    Ini::load_from_file(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Lock guarding read-modify-write cycles on one file within this process.
fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let key = path
        .parent()
        .and_then(|p| fs::canonicalize(p).ok())
        .zip(path.file_name())
        .map(|(dir, name)| dir.join(name))
        .unwrap_or_else(|| path.to_path_buf());
    let mut locks = LOCKS.get_or_init(|| Mutex::new(HashMap::new())).lock();
    Arc::clone(locks.entry(key).or_default())
}

/// Read `path` (or start empty), apply `edit` and write the result back.
///
/// Edits of the same file are serialized, so concurrent writers each see
/// the others' keys.
pub(crate) fn update_ini<F>(path: &Path, edit: F) -> ConfigResult<()>
where
    F: FnOnce(&mut Ini),
{
    ensure_parent(path)?;
    let lock = file_lock(path);
    let _held = lock.lock();

    let mut ini = if path.exists() {
        read_ini(path)?
    } else {
        Ini::new()
    };
    edit(&mut ini);
    write_ini(&ini, path)
}

/// Write `ini` to a sibling temp file and rename it over `path`, so readers
/// see either the old or the new contents.
fn write_ini(ini: &Ini, path: &Path) -> ConfigResult<()> {
    ensure_parent(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "settings".to_string());
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let written = ini.write_to_file(&temp).and_then(|()| fs::rename(&temp, path));
    written.map_err(|e| {
        let _ = fs::remove_file(&temp);
        ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

fn ensure_parent(path: &Path) -> ConfigResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}
