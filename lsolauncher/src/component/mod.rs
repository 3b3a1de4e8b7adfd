//! Component declarations.
//!
//! A [`Component`] describes one installable piece of the game setup: the
//! client, the base game files it reads, the runtimes it needs and the
//! content packs dropped into it. Components are immutable once the
//! [`Catalog`] is built.
//!
//! # Shapes
//!
//! Every component is installed by the same pipeline. The [`PipelineShape`]
//! decides which stages run and where the files land:
//!
//! ```text
//! DirectoryChosen   Download -> Extract -> Move -> Permissions   (user/auto directory)
//! SimpleDrop        Download -> Extract -> Move -> Permissions   (parent dir + subdir)
//! BareExecutable    Download -> run installer silently            (no move)
//! ```

mod catalog;

pub use catalog::{Catalog, CatalogError};

use std::fmt;
use std::path::{Path, PathBuf};

/// How a component gets onto disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineShape {
    /// Extracted into a directory chosen by the user or picked automatically.
    DirectoryChosen,

    /// Dropped into a fixed subdirectory of an installed parent component.
    SimpleDrop {
        /// Code of the parent component.
        parent: String,
        /// Subdirectory of the parent's install root.
        subdir: PathBuf,
        /// Further parents that receive a copy when they are installed.
        also_into: Vec<String>,
    },

    /// A third-party installer binary run with silent flags.
    BareExecutable {
        /// Arguments passed to the installer during full installs.
        silent_args: Vec<String>,
    },
}

impl PipelineShape {
    /// Short name used in logs and status output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DirectoryChosen => "directory",
            Self::SimpleDrop { .. } => "drop-in",
            Self::BareExecutable { .. } => "installer",
        }
    }

    /// Whether the shape copies files into an install root.
    pub fn moves_files(&self) -> bool {
        !matches!(self, Self::BareExecutable { .. })
    }

    /// Whether an explicit install directory has any effect.
    pub fn takes_target_dir(&self) -> bool {
        matches!(self, Self::DirectoryChosen)
    }
}

/// Which value of a configuration store key signals an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    /// The value holds the install directory.
    Directory(String),

    /// The value is numeric and must be at least `min`; the install root is
    /// then taken from the component's fallback paths.
    AtLeast { name: String, min: u64 },
}

/// Location of a component's record in the platform configuration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKey {
    /// Key path, e.g. `HKLM\SOFTWARE\Maxis\The Sims Online`.
    pub key: String,
    /// Value read from the key.
    pub value: StoreValue,
}

impl StoreKey {
    /// A key whose `InstallDir` value holds the install directory.
    pub fn install_dir(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: StoreValue::Directory("InstallDir".to_string()),
        }
    }

    /// A key whose numeric `name` value must reach `min`.
    pub fn at_least(key: impl Into<String>, name: impl Into<String>, min: u64) -> Self {
        Self {
            key: key.into(),
            value: StoreValue::AtLeast {
                name: name.into(),
                min,
            },
        }
    }

    /// Name of the value read from the key.
    pub fn value_name(&self) -> &str {
        match &self.value {
            StoreValue::Directory(name) => name,
            StoreValue::AtLeast { name, .. } => name,
        }
    }
}

/// Canonical layout of a component's download archive.
///
/// `root` is the directory inside the extracted tree whose contents become
/// the install root. An empty path means the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub root: PathBuf,
}

impl ArchiveLayout {
    /// Files sit at the top of the archive.
    pub fn flat() -> Self {
        Self::default()
    }

    /// Files sit under `root` inside the archive.
    pub fn nested(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory inside `extracted` that holds the install root.
    pub fn source_in(&self, extracted: &Path) -> PathBuf {
        if self.root.as_os_str().is_empty() {
            extracted.to_path_buf()
        } else {
            extracted.join(&self.root)
        }
    }
}

/// An installable component.
#[derive(Debug, Clone)]
pub struct Component {
    code: String,
    name: String,
    dependencies: Vec<String>,
    requires_network: bool,
    shape: PipelineShape,
    executables: Vec<String>,
    layout: ArchiveLayout,
    download_url: Option<String>,
    store_key: Option<StoreKey>,
    fallback_paths: Vec<PathBuf>,
    scan_names: Vec<String>,
    install_dir_name: String,
}

impl Component {
    /// Create a directory-chosen component with no dependencies.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: code.into(),
            install_dir_name: name.clone(),
            name,
            dependencies: Vec::new(),
            requires_network: false,
            shape: PipelineShape::DirectoryChosen,
            executables: Vec::new(),
            layout: ArchiveLayout::flat(),
            download_url: None,
            store_key: None,
            fallback_paths: Vec::new(),
            scan_names: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_network(mut self, required: bool) -> Self {
        self.requires_network = required;
        self
    }

    pub fn with_shape(mut self, shape: PipelineShape) -> Self {
        self.shape = shape;
        self
    }

    /// Set the files that define an installation, relative to the install
    /// root. The first entry is the one launched; glob patterns are allowed.
    pub fn with_executables<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executables = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_layout(mut self, layout: ArchiveLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn with_store_key(mut self, key: StoreKey) -> Self {
        self.store_key = Some(key);
        self
    }

    pub fn with_fallback_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.fallback_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Directory names probed for this component during a drive scan.
    pub fn with_scan_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scan_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Name of the directory created under a chosen install root.
    pub fn with_install_dir_name(mut self, name: impl Into<String>) -> Self {
        self.install_dir_name = name.into();
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn requires_network(&self) -> bool {
        self.requires_network
    }

    pub fn shape(&self) -> &PipelineShape {
        &self.shape
    }

    pub fn executables(&self) -> &[String] {
        &self.executables
    }

    /// The executable started by the launch controller.
    pub fn primary_executable(&self) -> Option<&str> {
        self.executables.first().map(String::as_str)
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    pub fn store_key(&self) -> Option<&StoreKey> {
        self.store_key.as_ref()
    }

    pub fn fallback_paths(&self) -> &[PathBuf] {
        &self.fallback_paths
    }

    pub fn scan_names(&self) -> &[String] {
        &self.scan_names
    }

    pub fn install_dir_name(&self) -> &str {
        &self.install_dir_name
    }

    /// Replace the download URL, used for per-user overrides.
    pub(crate) fn set_download_url(&mut self, url: Option<String>) {
        self.download_url = url;
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
