//! Drive scanning for existing installations.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::normalize::normalize_install_path;
use super::validate::find_executable;
use crate::component::Component;
use crate::drives::Drive;

/// Directory names under which games are commonly installed.
pub const COMMON_INSTALL_DIRS: &[&str] = &[
    "LegacySO Game",
    "FreeSO",
    "The Sims Online",
    "TSO",
    "Maxis",
    "EA Games",
    "Electronic Arts",
    "Simitone",
    "Games",
    "Program Files",
    "Program Files (x86)",
    "GameComponents",
];

/// A candidate installation found on disk, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredInstallation {
    /// Install root.
    pub path: PathBuf,
    /// Executable that matched.
    pub executable: PathBuf,
    /// Id of the drive the installation lives on.
    pub drive: String,
    /// File name of the matched executable.
    pub matched: String,
}

/// Scan `drives` for installations of `component`.
///
/// All drives are probed for the common install roots first, in
/// enumeration order; the shallow scan of each drive's top-level
/// directories runs last. Unreadable drives and directories are skipped.
/// Results are unique by path.
pub fn find_installations(component: &Component, drives: &[Drive]) -> Vec<DiscoveredInstallation> {
    let readable: Vec<&Drive> = drives
        .iter()
        .filter(|drive| match fs::read_dir(&drive.root) {
            Ok(_) => true,
            Err(e) => {
                debug!(drive = %drive.id, error = %e, "Skipping inaccessible drive");
                false
            }
        })
        .collect();

    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for drive in &readable {
        for candidate in common_candidates(component, &drive.root) {
            probe(component, drive, &candidate, &mut seen, &mut found);
        }
    }

    for drive in &readable {
        for candidate in root_level_candidates(component, &drive.root) {
            probe(component, drive, &candidate, &mut seen, &mut found);
        }
    }

    debug!(
        component = component.code(),
        drives = readable.len(),
        found = found.len(),
        "Scan finished"
    );
    found
}

fn probe(
    component: &Component,
    drive: &Drive,
    candidate: &Path,
    seen: &mut HashSet<PathBuf>,
    found: &mut Vec<DiscoveredInstallation>,
) {
    let path = normalize_install_path(component, candidate);
    if seen.contains(&path) {
        return;
    }
    if let Some(executable) = find_executable(component, &path) {
        seen.insert(path.clone());
        let matched = executable
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        debug!(path = %path.display(), matched = %matched, "Found candidate installation");
        found.push(DiscoveredInstallation {
            path,
            executable,
            drive: drive.id.clone(),
            matched,
        });
    }
}

/// Directory names tried beneath each candidate root.
fn names_for(component: &Component) -> Vec<&str> {
    let mut names = vec![component.code(), component.install_dir_name()];
    names.extend(component.scan_names().iter().map(String::as_str));
    names.dedup();
    names
}

fn common_candidates(component: &Component, root: &Path) -> Vec<PathBuf> {
    let names = names_for(component);
    let mut candidates = Vec::new();

    for common in COMMON_INSTALL_DIRS {
        let base = root.join(common);
        if !base.is_dir() {
            continue;
        }
        candidates.push(base.clone());
        candidates.extend(names.iter().map(|name| base.join(name)));
    }

    candidates
}

fn root_level_candidates(component: &Component, root: &Path) -> Vec<PathBuf> {
    let names = names_for(component);
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    dirs.sort();

    let mut candidates = Vec::new();
    for dir in dirs {
        candidates.push(dir.clone());
        candidates.extend(names.iter().map(|name| dir.join(name)));
    }
    candidates
}
