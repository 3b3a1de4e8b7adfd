//! Resolver strategies, tried in order until one returns a path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::normalize::normalize_install_path;
use super::scan::find_installations;
use super::store::{ConfigStore, StoredValue};
use super::validate::validate_installation;
use crate::component::{Component, PipelineShape, StoreValue};
use crate::config::LocalRegistry;
use crate::drives::DriveSource;

/// What resolvers may consult besides the filesystem.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Paths already resolved in this pass, keyed by lowercase code.
    pub installed: &'a HashMap<String, PathBuf>,
}

/// One way of locating an installation.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// A validated, normalized install root, or `None`.
    fn resolve(&self, component: &Component, ctx: &ResolveContext<'_>) -> Option<PathBuf>;
}

/// Accept `path` if it validates, after normalization.
fn accept(component: &Component, path: PathBuf) -> Option<PathBuf> {
    let path = normalize_install_path(component, &path);
    if validate_installation(component, &path) {
        Some(path)
    } else {
        debug!(
            component = component.code(),
            path = %path.display(),
            "Recorded path does not validate"
        );
        None
    }
}

fn first_valid_fallback(component: &Component) -> Option<PathBuf> {
    component
        .fallback_paths()
        .iter()
        .find_map(|p| accept(component, p.clone()))
}

/// Reads the platform configuration store.
pub struct ConfigStoreResolver {
    store: Arc<dyn ConfigStore>,
}

impl ConfigStoreResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }
}

impl Resolver for ConfigStoreResolver {
    fn name(&self) -> &'static str {
        "config-store"
    }

    fn resolve(&self, component: &Component, _ctx: &ResolveContext<'_>) -> Option<PathBuf> {
        match self.store.read(component)? {
            StoredValue::Directory(dir) => accept(component, dir),
            StoredValue::Number(value) => {
                let min = match component.store_key().map(|k| &k.value) {
                    Some(StoreValue::AtLeast { min, .. }) => *min,
                    _ => return None,
                };
                if value < min {
                    debug!(component = component.code(), value, min, "Stored version too old");
                    return None;
                }
                first_valid_fallback(component)
            }
        }
    }
}

/// Tries the component's hard-coded fallback paths in order.
#[derive(Debug, Default)]
pub struct FallbackPathResolver;

impl Resolver for FallbackPathResolver {
    fn name(&self) -> &'static str {
        "fallback-paths"
    }

    fn resolve(&self, component: &Component, _ctx: &ResolveContext<'_>) -> Option<PathBuf> {
        first_valid_fallback(component)
    }
}

/// Reads the backup registry in the settings file.
pub struct LocalRegistryResolver {
    registry: LocalRegistry,
}

impl LocalRegistryResolver {
    pub fn new(registry: LocalRegistry) -> Self {
        Self { registry }
    }
}

impl Resolver for LocalRegistryResolver {
    fn name(&self) -> &'static str {
        "local-registry"
    }

    fn resolve(&self, component: &Component, _ctx: &ResolveContext<'_>) -> Option<PathBuf> {
        let path = self.registry.get(component.code())?;
        accept(component, path)
    }
}

/// Looks inside the parent of a drop-in component.
#[derive(Debug, Default)]
pub struct ParentResolver;

impl Resolver for ParentResolver {
    fn name(&self) -> &'static str {
        "parent"
    }

    fn resolve(&self, component: &Component, ctx: &ResolveContext<'_>) -> Option<PathBuf> {
        let PipelineShape::SimpleDrop {
            parent,
            subdir,
            also_into,
        } = component.shape()
        else {
            return None;
        };

        std::iter::once(parent)
            .chain(also_into)
            .filter_map(|code| ctx.installed.get(&code.to_ascii_lowercase()))
            .find_map(|root| accept(component, root.join(subdir)))
    }
}

/// Scans every drive.
pub struct ScanResolver {
    drives: Arc<dyn DriveSource>,
}

impl ScanResolver {
    pub fn new(drives: Arc<dyn DriveSource>) -> Self {
        Self { drives }
    }
}

impl Resolver for ScanResolver {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn resolve(&self, component: &Component, _ctx: &ResolveContext<'_>) -> Option<PathBuf> {
        // Drop-ins live inside their parent and are never scanned for.
        if matches!(component.shape(), PipelineShape::SimpleDrop { .. }) {
            return None;
        }
        let drives = self.drives.list_drives();
        find_installations(component, &drives)
            .into_iter()
            .find_map(|hit| accept(component, hit.path))
    }
}
