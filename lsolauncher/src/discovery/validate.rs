//! On-disk validation of install roots.

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};

use crate::component::Component;

/// Find the first defining executable of `component` under `root`.
///
/// Executables are tried in declaration order; each may be a glob pattern
/// and is matched without regard to case.
pub fn find_executable(component: &Component, root: &Path) -> Option<PathBuf> {
    if !root.is_dir() {
        return None;
    }

    for executable in component.executables() {
        let exact = root.join(executable);
        if exact.exists() {
            return Some(exact);
        }

        let Some(root_str) = root.to_str() else {
            continue;
        };
        let pattern = format!(
            "{}/{}",
            Pattern::escape(root_str.trim_end_matches(|c: char| c == '/' || c == '\\')),
            executable
        );
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        if let Ok(paths) = glob_with(&pattern, options) {
            if let Some(found) = paths.filter_map(Result::ok).next() {
                return Some(found);
            }
        }
    }

    None
}

/// Whether `root` holds a usable installation of `component`.
pub fn validate_installation(component: &Component, root: &Path) -> bool {
    find_executable(component, root).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_exact_executable() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("FreeSO.exe"), b"MZ").unwrap();
        let lso = Component::new("LSO", "LegacySO").with_executables(["LegacySO.exe", "FreeSO.exe"]);

        assert_eq!(
            find_executable(&lso, temp.path()),
            Some(temp.path().join("FreeSO.exe"))
        );
    }

    #[test]
    fn test_nested_executable() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("TSOClient")).unwrap();
        fs::write(temp.path().join("TSOClient/TSOClient.exe"), b"MZ").unwrap();
        let tso = Component::new("TSO", "The Sims Online")
            .with_executables(["TSOClient/TSOClient.exe"]);

        assert!(validate_installation(&tso, temp.path()));
    }

    #[test]
    fn test_case_insensitive_match() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("legacyso.EXE"), b"MZ").unwrap();
        let lso = Component::new("LSO", "LegacySO").with_executables(["LegacySO.exe"]);

        assert!(validate_installation(&lso, temp.path()));
    }

    #[test]
    fn test_glob_marker() {
        let temp = TempDir::new().unwrap();
        let rms = Component::new("RMS", "Remesh Package").with_executables(["remeshes-*.json"]);
        assert!(!validate_installation(&rms, temp.path()));

        fs::write(temp.path().join("remeshes-7.json"), b"{}").unwrap();
        assert!(validate_installation(&rms, temp.path()));
    }

    #[test]
    fn test_missing_root() {
        let lso = Component::new("LSO", "LegacySO").with_executables(["LegacySO.exe"]);
        assert!(!validate_installation(&lso, Path::new("/no/such/root")));
    }

    #[test]
    fn test_root_with_glob_characters() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("Games [old]");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("simitone.exe"), b"MZ").unwrap();
        let simitone = Component::new("Simitone", "Simitone").with_executables(["Simitone.exe"]);

        assert!(validate_installation(&simitone, &root));
    }
}
