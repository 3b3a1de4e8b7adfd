//! Which components are installed, and where.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::component::{Catalog, Component};
use crate::discovery::{normalize_install_path, Discovery};

/// Install roots keyed by lowercase component code.
///
/// Written only by [`InstalledState::refresh`] and
/// [`InstalledState::mark_installed`]. A refresh replaces the whole map at
/// once, so readers never see a half-updated state.
///
/// Paths marked in this process stay pinned until a refresh that started
/// after the mark finds the component through discovery. A slow refresh
/// therefore never erases an install that finished while it ran.
#[derive(Debug, Default)]
pub struct InstalledState {
    inner: RwLock<Inner>,
    refreshing: Mutex<()>,
}

#[derive(Debug, Default)]
struct Inner {
    paths: HashMap<String, PathBuf>,
    /// Bumped by every mark.
    generation: u64,
    /// Marked paths with the generation they were marked at.
    pinned: HashMap<String, (u64, PathBuf)>,
}

impl InstalledState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<PathBuf> {
        self.inner.read().paths.get(&code.to_ascii_lowercase()).cloned()
    }

    pub fn is_installed(&self, code: &str) -> bool {
        self.inner
            .read()
            .paths
            .contains_key(&code.to_ascii_lowercase())
    }

    /// Copy of the current map.
    pub fn snapshot(&self) -> HashMap<String, PathBuf> {
        self.inner.read().paths.clone()
    }

    /// Record a validated install root.
    pub fn mark_installed(&self, component: &Component, path: &Path) {
        let key = component.code().to_ascii_lowercase();
        let path = normalize_install_path(component, path);
        let mut inner = self.inner.write();
        inner.generation += 1;
        let generation = inner.generation;
        inner.pinned.insert(key.clone(), (generation, path.clone()));
        inner.paths.insert(key, path);
    }

    /// Rebuild from discovery and swap the map in one step. Confirmed paths
    /// are saved to the backup registry. Refreshes run one at a time.
    /// Blocking.
    pub fn refresh(&self, discovery: &Discovery, catalog: &Catalog) {
        let _running = self.refreshing.lock();
        let started = self.inner.read().generation;

        let mut resolved = discovery.resolve_all(catalog);
        for component in catalog.iter() {
            if let Some(path) = resolved.get(&component.code().to_ascii_lowercase()) {
                discovery.remember(component, path);
            }
        }

        let mut inner = self.inner.write();
        inner.pinned.retain(|code, (generation, path)| {
            if *generation <= started && resolved.contains_key(code) {
                return false;
            }
            if *generation > started || !resolved.contains_key(code) {
                resolved.insert(code.clone(), path.clone());
            }
            true
        });
        debug!(
            installed = resolved.len(),
            pinned = inner.pinned.len(),
            "Installed state refreshed"
        );
        inner.paths = resolved;
    }
}
