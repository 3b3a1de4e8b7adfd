//! Platform configuration stores.
//!
//! On Windows the store is the system registry, queried through `reg.exe`.
//! Elsewhere it is a small INI file next to the launcher settings. In both
//! cases a missing entry or an unreadable store reads as `None`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::component::{Component, StoreValue};
use crate::config::{read_ini, update_ini, ConfigError};

/// Section of the file store holding install directories.
const FILE_STORE_SECTION: &str = "InstallDir";

/// Errors writing a configuration store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration store unavailable: {0}")]
    Unavailable(String),

    #[error("'{command}' failed: {reason}")]
    Command { command: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A value read from a configuration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Directory(PathBuf),
    Number(u64),
}

/// Key-value store recording where components are installed.
pub trait ConfigStore: Send + Sync {
    /// Store name for logs.
    fn name(&self) -> &'static str;

    /// Read the record for `component`. `None` when absent or unreadable.
    fn read(&self, component: &Component) -> Option<StoredValue>;

    /// Record `dir` as the install directory of `component`.
    fn write(&self, component: &Component, dir: &Path) -> Result<(), StoreError>;
}

/// The Windows registry, accessed through `reg.exe`.
#[derive(Debug, Clone, Default)]
pub struct RegistryStore {
    program: Option<PathBuf>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `reg` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn command(&self) -> Command {
        match &self.program {
            Some(program) => Command::new(program),
            None => Command::new("reg"),
        }
    }

    /// Query one value. `None` when the key or value is missing or the
    /// command cannot run.
    pub fn query(&self, key: &str, value: &str) -> Option<String> {
        let output = self
            .command()
            .args(["QUERY", key, "/v", value])
            .output()
            .map_err(|e| debug!(error = %e, "reg.exe unavailable"))
            .ok()?;
        if !output.status.success() {
            debug!(key, value, "Registry value not present");
            return None;
        }
        parse_reg_query(&String::from_utf8_lossy(&output.stdout))
    }
}

impl ConfigStore for RegistryStore {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn read(&self, component: &Component) -> Option<StoredValue> {
        let key = component.store_key()?;
        let raw = self.query(&key.key, key.value_name())?;
        match &key.value {
            StoreValue::Directory(_) => Some(StoredValue::Directory(PathBuf::from(raw))),
            StoreValue::AtLeast { .. } => parse_number(&raw).map(StoredValue::Number),
        }
    }

    fn write(&self, component: &Component, dir: &Path) -> Result<(), StoreError> {
        let Some(key) = component.store_key() else {
            return Ok(());
        };
        let StoreValue::Directory(value) = &key.value else {
            return Ok(());
        };

        let dir = dir.to_string_lossy();
        let output = self
            .command()
            .args([
                "ADD",
                key.key.as_str(),
                "/v",
                value.as_str(),
                "/t",
                "REG_SZ",
                "/d",
                &*dir,
                "/f",
            ])
            .output()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(StoreError::Command {
                command: format!("reg ADD {}", key.key),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// INI-file store keyed by component code.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/registry.ini`.
    pub fn default_location() -> Self {
        Self::new(crate::config::config_dir().join("registry.ini"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn read(&self, component: &Component) -> Option<StoredValue> {
        if !self.path.exists() {
            return None;
        }
        let ini = read_ini(&self.path)
            .map_err(|e| warn!(error = %e, "Configuration store unreadable"))
            .ok()?;
        ini.section(Some(FILE_STORE_SECTION))?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(component.code()))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| StoredValue::Directory(PathBuf::from(v)))
    }

    fn write(&self, component: &Component, dir: &Path) -> Result<(), StoreError> {
        update_ini(&self.path, |ini| {
            ini.with_section(Some(FILE_STORE_SECTION))
                .set(component.code(), dir.to_string_lossy());
        })?;
        Ok(())
    }
}

/// The configuration store of the host platform.
pub fn platform_store() -> Box<dyn ConfigStore> {
    if cfg!(windows) {
        Box::new(RegistryStore::new())
    } else {
        Box::new(FileStore::default_location())
    }
}

/// Extract the data column of `reg QUERY` output.
///
/// ```text
/// HKEY_LOCAL_MACHINE\SOFTWARE\Rhys Simpson\LegacySO
///     InstallDir    REG_SZ    C:\Program Files\LegacySO Game\LegacySO
/// ```
pub fn parse_reg_query(output: &str) -> Option<String> {
    static DATA: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DATA
        .get_or_init(|| Regex::new(r"REG_[A-Z_]+\s+(.*)$").ok())
        .as_ref()?;

    output
        .lines()
        .filter_map(|line| re.captures(line.trim_end()))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|v| !v.is_empty())
}

/// Parse a decimal or `0x` hex registry number.
fn parse_number(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_reg_sz() {
        let output = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\Rhys Simpson\\LegacySO\r\n    InstallDir    REG_SZ    C:\\Program Files\\LegacySO Game\\LegacySO\r\n\r\n";
        assert_eq!(
            parse_reg_query(output).as_deref(),
            Some("C:\\Program Files\\LegacySO Game\\LegacySO")
        );
    }

    #[test]
    fn test_parse_reg_dword() {
        let output = "HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\NET Framework Setup\\NDP\\v4\\Full\n    Release    REG_DWORD    0x60bff\n";
        let raw = parse_reg_query(output).unwrap();
        assert_eq!(parse_number(&raw), Some(0x60bff));
    }

    #[test]
    fn test_parse_reg_nothing() {
        assert!(parse_reg_query("ERROR: The system was unable to find the specified registry key or value.").is_none());
    }

    #[test]
    fn test_parse_number_decimal() {
        assert_eq!(parse_number(" 393295 "), Some(393295));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("registry.ini"));
        let lso = Component::new("LSO", "LegacySO");

        assert!(store.read(&lso).is_none());
        store.write(&lso, Path::new("/games/LegacySO")).unwrap();
        assert_eq!(
            store.read(&lso),
            Some(StoredValue::Directory(PathBuf::from("/games/LegacySO")))
        );
    }

    #[test]
    fn test_file_store_concurrent_writes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("registry.ini");

        let handles: Vec<_> = ["TSO", "LSO", "RMS", "Simitone", "OpenAL", "SDL"]
            .into_iter()
            .map(|code| {
                let store = FileStore::new(&path);
                std::thread::spawn(move || {
                    let component = Component::new(code, code);
                    store
                        .write(&component, &Path::new("/games").join(code))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = FileStore::new(&path);
        for code in ["TSO", "LSO", "RMS", "Simitone", "OpenAL", "SDL"] {
            assert_eq!(
                store.read(&Component::new(code, code)),
                Some(StoredValue::Directory(Path::new("/games").join(code)))
            );
        }
    }

    #[test]
    fn test_registry_store_without_key_reads_nothing() {
        let store = RegistryStore::with_program("/definitely/not/reg");
        let lso = Component::new("LSO", "LegacySO");
        assert!(store.read(&lso).is_none());
        assert!(store.write(&lso, Path::new("/x")).is_ok());
    }
}
