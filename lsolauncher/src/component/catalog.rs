//! The set of components known to the launcher.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use thiserror::Error;

use super::{ArchiveLayout, Component, PipelineShape, StoreKey};

/// Download locations of the published components.
const TSO_URL: &str = "https://api.legacyso.org/tso";
const LSO_URL: &str = "https://lso-builds.vennbot-lso.workers.dev/";
const RMS_URL: &str = "https://lso-meshes.vennbot-lso.workers.dev/";
const OPENAL_URL: &str = "https://openal.org/downloads/oalinst.exe";
const NET_URL: &str = "https://download.microsoft.com/download/C/3/A/C3A5200B-D33C-47E9-9D70-2F7C65DAAD94/NDP46-KB3045557-x86-x64-AllOS-ENU.exe";
const MAC_EXTRAS_URL: &str = "https://api.legacyso.org/MacExtras";

/// Minimum `Release` value of the .NET Framework 4.6 setup key.
const NET_MIN_RELEASE: u64 = 393_295;

/// Errors in a catalog declaration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("component '{0}' is declared twice")]
    Duplicate(String),

    #[error("component '{component}' depends on unknown component '{dependency}'")]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    #[error("dependency cycle through component '{0}'")]
    Cycle(String),
}

/// Immutable, ordered collection of components.
///
/// Declaration order is kept; [`Catalog::install_order`] derives a
/// dependency-first order from it.
#[derive(Debug, Clone)]
pub struct Catalog {
    components: Vec<Component>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, checking dependency references and cycles.
    pub fn new(components: Vec<Component>) -> Result<Self, CatalogError> {
        let mut index = HashMap::new();
        for (i, component) in components.iter().enumerate() {
            if index
                .insert(component.code().to_ascii_lowercase(), i)
                .is_some()
            {
                return Err(CatalogError::Duplicate(component.code().to_string()));
            }
        }

        let catalog = Self { components, index };
        for component in &catalog.components {
            for dependency in component.dependencies() {
                if catalog.get(dependency).is_none() {
                    return Err(CatalogError::UnknownDependency {
                        component: component.code().to_string(),
                        dependency: dependency.clone(),
                    });
                }
            }
            if let PipelineShape::SimpleDrop {
                parent, also_into, ..
            } = component.shape()
            {
                for code in std::iter::once(parent).chain(also_into) {
                    if catalog.get(code).is_none() {
                        return Err(CatalogError::UnknownDependency {
                            component: component.code().to_string(),
                            dependency: code.clone(),
                        });
                    }
                }
            }
        }
        catalog.install_order_checked()?;
        Ok(catalog)
    }

    /// The components published for the host platform.
    ///
    /// `data_dir` is the launcher's per-user data directory; fallback
    /// locations outside Windows live beneath it.
    pub fn standard(data_dir: &Path) -> Self {
        let components = standard_components(data_dir);
        let index = components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.code().to_ascii_lowercase(), i))
            .collect();
        Self { components, index }
    }

    /// Look up a component by code, ignoring case.
    pub fn get(&self, code: &str) -> Option<&Component> {
        self.index
            .get(&code.to_ascii_lowercase())
            .map(|&i| &self.components[i])
    }

    /// All components in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Replace download URLs for the given codes.
    pub fn with_download_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for component in &mut self.components {
            if let Some(url) = overrides.get(&component.code().to_ascii_lowercase()) {
                let url = url.trim();
                if !url.is_empty() {
                    component.set_download_url(Some(url.to_string()));
                }
            }
        }
        self
    }

    /// Components ordered so that every dependency precedes its dependents.
    ///
    /// Drop-in components follow their parent. Ties keep declaration order.
    pub fn install_order(&self) -> Vec<&Component> {
        self.install_order_checked().unwrap_or_else(|_| self.iter().collect())
    }

    /// `code` with everything it needs and the drop-ins that go into it,
    /// in install order. Empty for an unknown code.
    pub fn install_set(&self, code: &str) -> Vec<&Component> {
        let Some(root) = self.get(code) else {
            return Vec::new();
        };

        let mut wanted: HashSet<String> = HashSet::new();
        let mut stack = vec![root.code().to_ascii_lowercase()];
        while let Some(next) = stack.pop() {
            if !wanted.insert(next.clone()) {
                continue;
            }
            if let Some(component) = self.get(&next) {
                stack.extend(component.dependencies().iter().map(|d| d.to_ascii_lowercase()));
            }
        }
        for component in &self.components {
            if let PipelineShape::SimpleDrop { parent, .. } = component.shape() {
                if parent.eq_ignore_ascii_case(root.code()) {
                    wanted.insert(component.code().to_ascii_lowercase());
                }
            }
        }

        self.install_order()
            .into_iter()
            .filter(|c| wanted.contains(&c.code().to_ascii_lowercase()))
            .collect()
    }

    fn install_order_checked(&self) -> Result<Vec<&Component>, CatalogError> {
        let mut ordered = Vec::with_capacity(self.components.len());
        let mut done: HashSet<usize> = HashSet::new();
        let mut visiting: HashSet<usize> = HashSet::new();

        for i in 0..self.components.len() {
            self.visit(i, &mut done, &mut visiting, &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit<'a>(
        &'a self,
        i: usize,
        done: &mut HashSet<usize>,
        visiting: &mut HashSet<usize>,
        ordered: &mut Vec<&'a Component>,
    ) -> Result<(), CatalogError> {
        if done.contains(&i) {
            return Ok(());
        }
        let component = &self.components[i];
        if !visiting.insert(i) {
            return Err(CatalogError::Cycle(component.code().to_string()));
        }

        let mut before: Vec<&String> = component.dependencies().iter().collect();
        if let PipelineShape::SimpleDrop { parent, .. } = component.shape() {
            before.push(parent);
        }
        for code in before {
            if let Some(&j) = self.index.get(&code.to_ascii_lowercase()) {
                self.visit(j, done, visiting, ordered)?;
            }
        }

        visiting.remove(&i);
        done.insert(i);
        ordered.push(component);
        Ok(())
    }
}

fn standard_components(data_dir: &Path) -> Vec<Component> {
    let windows = cfg!(windows);
    let macos = cfg!(target_os = "macos");
    let game_components = data_dir.join("GameComponents");
    let documents = dirs::document_dir().or_else(|| dirs::home_dir().map(|h| h.join("Documents")));

    let mut components = Vec::new();

    let mut tso = Component::new("TSO", "The Sims Online")
        .with_network(true)
        .with_executables([
            "TSOClient/TSOClient.exe",
            "TSOClient/TSO.exe",
            "TSOClient/TSO Client.exe",
        ])
        .with_layout(ArchiveLayout::nested("The Sims Online"))
        .with_download_url(TSO_URL)
        .with_scan_names(["The Sims Online", "TSO", "Maxis/The Sims Online"]);
    if windows {
        tso = tso
            .with_store_key(StoreKey::install_dir("HKLM\\SOFTWARE\\Maxis\\The Sims Online"))
            .with_fallback_paths([
                "C:/Program Files/Maxis/The Sims Online",
                "C:/Program Files/The Sims Online",
                "C:/Program Files/LegacySO Game/The Sims Online",
            ]);
    } else {
        let mut fallbacks = vec![game_components.join("The Sims Online")];
        fallbacks.extend(documents.iter().map(|d| d.join("The Sims Online")));
        tso = tso.with_fallback_paths(fallbacks);
    }
    components.push(tso);

    if windows {
        components.push(
            Component::new("OpenAL", "OpenAL")
                .with_shape(PipelineShape::BareExecutable {
                    silent_args: vec!["/SILENT".to_string()],
                })
                .with_executables(["OpenAL32.dll", "soft_oal.dll"])
                .with_download_url(OPENAL_URL)
                .with_store_key(StoreKey::at_least("HKLM\\SOFTWARE\\OpenAL", "RefCount", 1))
                .with_fallback_paths([
                    "C:/Windows/System32",
                    "C:/Windows/SysWOW64",
                    "C:/Program Files (x86)/OpenAL",
                ]),
        );
        components.push(
            Component::new("NET", ".NET Framework")
                .with_shape(PipelineShape::BareExecutable {
                    silent_args: vec!["/q".to_string(), "/norestart".to_string()],
                })
                .with_executables(["clr.dll"])
                .with_download_url(NET_URL)
                .with_store_key(StoreKey::at_least(
                    "HKLM\\SOFTWARE\\Microsoft\\NET Framework Setup\\NDP\\v4\\Full",
                    "Release",
                    NET_MIN_RELEASE,
                ))
                .with_fallback_paths([
                    "C:/Windows/Microsoft.NET/Framework64/v4.0.30319",
                    "C:/Windows/Microsoft.NET/Framework/v4.0.30319",
                ]),
        );
    } else {
        // Runtimes come from the system package manager outside Windows.
        components.push(
            Component::new("Mono", "Mono Runtime")
                .with_network(true)
                .with_shape(PipelineShape::BareExecutable {
                    silent_args: Vec::new(),
                })
                .with_executables(if macos {
                    ["Versions/Current/Commands/mono"]
                } else {
                    ["mono"]
                })
                .with_fallback_paths(if macos {
                    ["/Library/Frameworks/Mono.framework"]
                } else {
                    ["/usr/bin"]
                }),
        );
        components.push(
            Component::new("SDL", "SDL2")
                .with_network(true)
                .with_shape(PipelineShape::BareExecutable {
                    silent_args: Vec::new(),
                })
                .with_executables(if macos {
                    ["SDL2"]
                } else {
                    ["libSDL2-2.0.so.0"]
                })
                .with_fallback_paths(if macos {
                    vec!["/Library/Frameworks/SDL2.framework"]
                } else {
                    vec!["/usr/lib/x86_64-linux-gnu", "/usr/lib64", "/usr/lib"]
                }),
        );
    }

    let runtimes: Vec<&str> = if windows {
        vec!["OpenAL"]
    } else {
        vec!["Mono", "SDL"]
    };

    let mut lso = Component::new("LSO", "LegacySO")
        .with_dependencies(std::iter::once("TSO").chain(runtimes.iter().copied()))
        .with_network(true)
        .with_executables(["LegacySO.exe", "FreeSO.exe"])
        .with_layout(ArchiveLayout::nested("LegacySO Client"))
        .with_download_url(LSO_URL)
        .with_scan_names(["LegacySO", "LegacySO Game/LegacySO", "FreeSO"])
        .with_install_dir_name("LegacySO");
    if windows {
        lso = lso
            .with_store_key(StoreKey::install_dir("HKLM\\SOFTWARE\\Rhys Simpson\\LegacySO"))
            .with_fallback_paths([
                "C:/Program Files/LegacySO Game/LegacySO",
                "C:/Program Files/LegacySO/LegacySOClient",
            ]);
    } else {
        let mut fallbacks = vec![game_components.join("LegacySO")];
        fallbacks.extend(documents.iter().map(|d| d.join("LegacySO")));
        lso = lso.with_fallback_paths(fallbacks);
    }
    components.push(lso);

    let mut simitone = Component::new("Simitone", "Simitone for Windows")
        .with_dependencies(if windows { Vec::new() } else { runtimes.clone() })
        .with_network(true)
        .with_executables(["Simitone.Windows.exe", "Simitone.exe"])
        .with_scan_names(["Simitone"])
        .with_install_dir_name("Simitone");
    if windows {
        simitone = simitone
            .with_store_key(StoreKey::install_dir("HKLM\\SOFTWARE\\Rhys Simpson\\Simitone"))
            .with_fallback_paths(["C:/Program Files/Simitone"]);
    } else {
        simitone = simitone.with_fallback_paths([game_components.join("Simitone")]);
    }
    components.push(simitone);

    components.push(
        Component::new("RMS", "Remesh Package")
            .with_dependencies(["LSO"])
            .with_network(true)
            .with_shape(PipelineShape::SimpleDrop {
                parent: "LSO".to_string(),
                subdir: "Content/MeshReplace".into(),
                also_into: vec!["Simitone".to_string()],
            })
            .with_executables(["remeshes-*.json"])
            .with_layout(ArchiveLayout::nested("FreeSO Remesh Package/MeshReplace"))
            .with_download_url(RMS_URL),
    );

    if macos {
        components.push(
            Component::new("MacExtras", "FreeSO MacExtras")
                .with_dependencies(["LSO"])
                .with_network(true)
                .with_shape(PipelineShape::SimpleDrop {
                    parent: "LSO".to_string(),
                    subdir: "".into(),
                    also_into: Vec::new(),
                })
                .with_executables(["*.dylib"])
                .with_download_url(MAC_EXTRAS_URL),
        );
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(components: &[&Component]) -> Vec<String> {
        components.iter().map(|c| c.code().to_string()).collect()
    }

    #[test]
    fn test_standard_catalog_is_consistent() {
        let catalog = Catalog::standard(Path::new("/data"));
        let rebuilt = Catalog::new(catalog.iter().cloned().collect());
        assert!(rebuilt.is_ok(), "{:?}", rebuilt.err());
    }

    #[test]
    fn test_lookup_ignores_case() {
        let catalog = Catalog::standard(Path::new("/data"));
        assert_eq!(catalog.get("lso").map(|c| c.name()), Some("LegacySO"));
        assert_eq!(catalog.get("rms").map(|c| c.code()), Some("RMS"));
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn test_install_order_puts_dependencies_first() {
        let catalog = Catalog::new(vec![
            Component::new("A", "Alpha").with_dependencies(["B"]),
            Component::new("B", "Beta").with_dependencies(["C"]),
            Component::new("C", "Gamma"),
        ])
        .unwrap();
        assert_eq!(codes(&catalog.install_order()), ["C", "B", "A"]);
    }

    #[test]
    fn test_drop_in_follows_parent() {
        let catalog = Catalog::new(vec![
            Component::new("Pack", "Pack").with_shape(PipelineShape::SimpleDrop {
                parent: "Game".to_string(),
                subdir: "Content".into(),
                also_into: Vec::new(),
            }),
            Component::new("Game", "Game"),
        ])
        .unwrap();
        assert_eq!(codes(&catalog.install_order()), ["Game", "Pack"]);
    }

    #[test]
    fn test_install_set() {
        let catalog = Catalog::new(vec![
            Component::new("Base", "Base"),
            Component::new("Runtime", "Runtime"),
            Component::new("Game", "Game").with_dependencies(["Base", "Runtime"]),
            Component::new("Other", "Other").with_dependencies(["Runtime"]),
            Component::new("Pack", "Pack")
                .with_dependencies(["Game"])
                .with_shape(PipelineShape::SimpleDrop {
                    parent: "Game".to_string(),
                    subdir: "Content".into(),
                    also_into: vec!["Other".to_string()],
                }),
        ])
        .unwrap();

        assert_eq!(
            codes(&catalog.install_set("game")),
            ["Base", "Runtime", "Game", "Pack"]
        );
        assert_eq!(codes(&catalog.install_set("Other")), ["Runtime", "Other"]);
        assert!(catalog.install_set("missing").is_empty());
    }

    #[test]
    fn test_standard_full_install_leaves_out_simitone() {
        let catalog = Catalog::standard(Path::new("/data"));
        let set = codes(&catalog.install_set("LSO"));
        assert_eq!(set.first().map(String::as_str), Some("TSO"));
        assert!(set.contains(&"RMS".to_string()));
        assert!(!set.contains(&"Simitone".to_string()));
    }

    #[test]
    fn test_rejects_unknown_dependency() {
        let err = Catalog::new(vec![Component::new("A", "Alpha").with_dependencies(["Z"])])
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownDependency {
                component: "A".to_string(),
                dependency: "Z".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_cycle() {
        let err = Catalog::new(vec![
            Component::new("A", "Alpha").with_dependencies(["B"]),
            Component::new("B", "Beta").with_dependencies(["A"]),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::Cycle(_)));
    }

    #[test]
    fn test_rejects_duplicate() {
        let err = Catalog::new(vec![Component::new("A", "Alpha"), Component::new("a", "Alpha")])
            .unwrap_err();
        assert_eq!(err, CatalogError::Duplicate("a".to_string()));
    }

    #[test]
    fn test_download_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert("lso".to_string(), "https://mirror.test/lso.zip".to_string());
        let catalog = Catalog::standard(Path::new("/data")).with_download_overrides(&overrides);
        assert_eq!(
            catalog.get("LSO").and_then(|c| c.download_url()),
            Some("https://mirror.test/lso.zip")
        );
    }
}
