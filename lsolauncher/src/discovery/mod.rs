//! Installation discovery.
//!
//! There is no single source of truth for whether a component is installed.
//! [`Discovery`] runs an ordered chain of [`Resolver`]s and takes the first
//! validated path:
//!
//! ```text
//! config store ──> fallback paths ──> backup registry ──> parent dir ──> drive scan
//!   (registry /       (hard-coded)      ([LocalRegistry])   (drop-ins)    (all drives)
//!    registry.ini)
//! ```
//!
//! Every resolver validates before answering: a recorded path whose
//! executable is gone falls through to the next resolver. "Not installed" is
//! `None`, never an error.

mod normalize;
mod resolvers;
mod scan;
mod store;
mod validate;

pub use normalize::{normalize_install_path, normalize_path};
pub use resolvers::{
    ConfigStoreResolver, FallbackPathResolver, LocalRegistryResolver, ParentResolver,
    ResolveContext, Resolver, ScanResolver,
};
pub use scan::{find_installations, DiscoveredInstallation, COMMON_INSTALL_DIRS};
pub use store::{
    parse_reg_query, platform_store, ConfigStore, FileStore, RegistryStore, StoreError,
    StoredValue,
};
pub use validate::{find_executable, validate_installation};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::component::{Catalog, Component};
use crate::config::LocalRegistry;
use crate::drives::DriveSource;

/// Resolves where components are installed.
pub struct Discovery {
    resolvers: Vec<Box<dyn Resolver>>,
    store: Arc<dyn ConfigStore>,
    local: LocalRegistry,
    drives: Arc<dyn DriveSource>,
}

impl Discovery {
    /// The standard resolver chain over the given store, backup registry
    /// and drives.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        local: LocalRegistry,
        drives: Arc<dyn DriveSource>,
    ) -> Self {
        let resolvers: Vec<Box<dyn Resolver>> = vec![
            Box::new(ConfigStoreResolver::new(Arc::clone(&store))),
            Box::new(FallbackPathResolver),
            Box::new(LocalRegistryResolver::new(local.clone())),
            Box::new(ParentResolver),
            Box::new(ScanResolver::new(Arc::clone(&drives))),
        ];
        Self {
            resolvers,
            store,
            local,
            drives,
        }
    }

    /// Replace the resolver chain.
    pub fn with_resolvers(mut self, resolvers: Vec<Box<dyn Resolver>>) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Names of the resolvers in chain order.
    pub fn resolver_names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    pub fn local_registry(&self) -> &LocalRegistry {
        &self.local
    }

    /// Resolve one component. `installed` holds paths already known for
    /// other components (drop-ins look inside their parent).
    pub fn resolve(
        &self,
        component: &Component,
        installed: &HashMap<String, PathBuf>,
    ) -> Option<PathBuf> {
        let ctx = ResolveContext { installed };
        for resolver in &self.resolvers {
            if let Some(path) = resolver.resolve(component, &ctx) {
                debug!(
                    component = component.code(),
                    resolver = resolver.name(),
                    path = %path.display(),
                    "Resolved installation"
                );
                return Some(path);
            }
        }
        debug!(component = component.code(), "Not installed");
        None
    }

    /// Resolve every component of `catalog`, parents before drop-ins.
    /// Keys are lowercase codes.
    pub fn resolve_all(&self, catalog: &Catalog) -> HashMap<String, PathBuf> {
        let mut installed = HashMap::new();
        for component in catalog.install_order() {
            if let Some(path) = self.resolve(component, &installed) {
                installed.insert(component.code().to_ascii_lowercase(), path);
            }
        }
        installed
    }

    /// Scan all drives for `component` and keep the hits that validate.
    pub fn scan(&self, component: &Component) -> Vec<DiscoveredInstallation> {
        let drives = self.drives.list_drives();
        find_installations(component, &drives)
            .into_iter()
            .filter(|hit| validate_installation(component, &hit.path))
            .collect()
    }

    /// Record a confirmed install directory in the configuration store and
    /// the backup registry. Failures are logged; the backup registry is
    /// written even when the store is read-only.
    pub fn record(&self, component: &Component, dir: &Path) {
        if let Err(e) = self.store.write(component, dir) {
            warn!(
                component = component.code(),
                store = self.store.name(),
                error = %e,
                "Could not update configuration store"
            );
        }
        self.remember(component, dir);
    }

    /// Record a confirmed install directory in the backup registry only.
    pub fn remember(&self, component: &Component, dir: &Path) {
        if self.local.get(component.code()).as_deref() == Some(dir) {
            return;
        }
        match self.local.set(component.code(), dir) {
            Ok(()) => info!(
                component = component.code(),
                path = %dir.display(),
                "Saved install path to backup registry"
            ),
            Err(e) => warn!(component = component.code(), error = %e, "Backup registry write failed"),
        }
    }
}
