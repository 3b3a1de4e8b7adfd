//! Install path normalization.
//!
//! Paths come from the registry, the settings file, fallback lists and user
//! input, and are joined in several places. Before a path is stored it is
//! normalized lexically:
//!
//! - backslashes become the platform separator
//! - `.` segments are dropped and `..` segments collapsed
//! - for a component path, consecutive segments naming the component that
//!   differ only in case are merged (`Games/LegacySO/legacyso` becomes
//!   `Games/LegacySO`)
//! - a trailing executable path of the component is removed
//!
//! Nothing here touches the filesystem.

use std::ffi::OsStr;
use std::path::{Component as PathPart, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::component::Component;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Normalize separators and `.`/`..` segments.
pub fn normalize_path(path: &Path) -> PathBuf {
    let unified = unify_separators(path);
    let mut out = PathBuf::new();

    for part in unified.components() {
        match part {
            PathPart::Prefix(_) | PathPart::RootDir => out.push(part.as_os_str()),
            PathPart::CurDir => {}
            PathPart::ParentDir => {
                if out.components().next_back().is_some_and(is_normal) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            PathPart::Normal(name) => out.push(name),
        }
    }

    out
}

/// Normalize a path recorded for `component`: merge repeated segments
/// naming the component and drop a trailing executable path, so the result
/// is the install root.
pub fn normalize_install_path(component: &Component, path: &Path) -> PathBuf {
    let normalized = collapse_repeats(&normalize_path(path), &component_names(component));
    let parts: Vec<String> = normalized
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    for executable in component.executables() {
        let patterns: Vec<&str> = executable.split('/').filter(|s| !s.is_empty()).collect();
        if patterns.is_empty() || patterns.len() >= parts.len() {
            continue;
        }
        let tail = &parts[parts.len() - patterns.len()..];
        let matches = patterns.iter().zip(tail).all(|(pattern, part)| {
            Pattern::new(pattern)
                .map(|p| p.matches_with(part, MATCH_OPTIONS))
                .unwrap_or_else(|_| pattern.eq_ignore_ascii_case(part))
        });
        if matches {
            return normalized
                .components()
                .take(parts.len() - patterns.len())
                .collect();
        }
    }

    normalized
}

fn component_names(component: &Component) -> [&str; 3] {
    [component.install_dir_name(), component.name(), component.code()]
}

/// Drop a segment that repeats the previous one, ignoring case, when it is
/// one of `names`.
fn collapse_repeats(path: &Path, names: &[&str]) -> PathBuf {
    let mut out = PathBuf::new();
    let mut previous: Option<&OsStr> = None;

    for part in path.components() {
        if let PathPart::Normal(name) = part {
            let text = name.to_string_lossy();
            let repeat = previous.is_some_and(|p| p.to_string_lossy().eq_ignore_ascii_case(&text))
                && names.iter().any(|n| n.eq_ignore_ascii_case(&text));
            previous = Some(name);
            if repeat {
                continue;
            }
        } else {
            previous = None;
        }
        out.push(part.as_os_str());
    }

    out
}

fn is_normal(part: PathPart<'_>) -> bool {
    matches!(part, PathPart::Normal(_))
}

#[cfg(windows)]
fn unify_separators(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('/', "\\"))
}

#[cfg(not(windows))]
fn unify_separators(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) if s.contains('\\') => PathBuf::from(s.replace('\\', "/")),
        _ => path.to_path_buf(),
    }
}
