//! Dependency and task orchestration.
//!
//! The [`Orchestrator`] owns the [`InstalledState`] and decides whether and
//! where a component may be installed:
//!
//! ```text
//! install(code)
//!   ├─ unknown / not installable ─────────────> Err
//!   ├─ needs network, probe offline ──────────> Err(NoInternet)
//!   ├─ dependency missing ────────────────────> Err(MissingDependency)
//!   ├─ claim task (one per component) ────────> Err(AlreadyInstalling)
//!   ├─ choose target (dir / preference / prompt)
//!   ├─ Pipeline::run ──> InstallEvent broadcast
//!   └─ release task, refresh InstalledState    (always)
//! ```
//!
//! Different components may install at the same time.

mod probe;
mod state;
mod types;

pub use probe::{DirectoryPrompt, DnsProbe, NetworkProbe, NoPrompt, PROBE_HOSTS};
pub use state::InstalledState;
pub use types::{BatchReport, InstallEvent, InstallOptions, InstallOutcome, InstallTask, TaskId};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::component::{Catalog, Component, PipelineShape};
use crate::config::InstallRootPreference;
use crate::discovery::{
    normalize_install_path, normalize_path, validate_installation, DiscoveredInstallation,
    Discovery,
};
use crate::drives::{best_drive, Drive, DriveSource, SystemDrives};
use crate::manager::{
    InstallError, InstallRequest, InstallResult, Pipeline, PipelineProgress, ProgressCallback,
};

/// Capacity of the event channel. Slow subscribers miss old events.
const EVENT_CAPACITY: usize = 256;

/// Folder created on the chosen drive for automatic installs on Windows.
pub const AUTO_ROOT_DIR: &str = "LegacySO Game";

type ActiveTasks = Arc<Mutex<HashSet<String>>>;

/// Sequences installs and keeps the installed state.
pub struct Orchestrator {
    catalog: Arc<Catalog>,
    discovery: Arc<Discovery>,
    pipeline: Arc<Pipeline>,
    state: Arc<InstalledState>,
    active: ActiveTasks,
    events: broadcast::Sender<InstallEvent>,
    probe: Arc<dyn NetworkProbe>,
    prompt: Arc<dyn DirectoryPrompt>,
    drives: Arc<dyn DriveSource>,
    components_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(catalog: Catalog, discovery: Discovery, pipeline: Pipeline) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            catalog: Arc::new(catalog),
            discovery: Arc::new(discovery),
            pipeline: Arc::new(pipeline),
            state: Arc::new(InstalledState::new()),
            active: Arc::new(Mutex::new(HashSet::new())),
            events,
            probe: Arc::new(DnsProbe::new()),
            prompt: Arc::new(NoPrompt),
            drives: Arc::new(SystemDrives),
            components_dir: crate::config::data_dir().join("GameComponents"),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn NetworkProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn DirectoryPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_drives(mut self, drives: Arc<dyn DriveSource>) -> Self {
        self.drives = drives;
        self
    }

    /// Base directory of automatic installs outside Windows.
    pub fn with_components_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.components_dir = dir.into();
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn installed(&self) -> &InstalledState {
        &self.state
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Receive install events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<InstallEvent> {
        self.events.subscribe()
    }

    pub fn is_installing(&self, code: &str) -> bool {
        self.active.lock().contains(&code.to_ascii_lowercase())
    }

    /// Rebuild the installed state on the blocking pool.
    pub async fn refresh(&self) {
        let state = Arc::clone(&self.state);
        let discovery = Arc::clone(&self.discovery);
        let catalog = Arc::clone(&self.catalog);
        if let Err(e) =
            tokio::task::spawn_blocking(move || state.refresh(&discovery, &catalog)).await
        {
            warn!(error = %e, "Installed state refresh did not finish");
        }
    }

    /// Scan all drives for one component, or for every component that
    /// lives in its own directory.
    pub async fn scan(
        &self,
        code: Option<&str>,
    ) -> InstallResult<Vec<(String, DiscoveredInstallation)>> {
        let components: Vec<Component> = match code {
            Some(code) => vec![self.component(code)?.clone()],
            None => self
                .catalog
                .iter()
                .filter(|c| matches!(c.shape(), PipelineShape::DirectoryChosen))
                .cloned()
                .collect(),
        };

        let discovery = Arc::clone(&self.discovery);
        let found = tokio::task::spawn_blocking(move || {
            components
                .iter()
                .flat_map(|c| {
                    discovery
                        .scan(c)
                        .into_iter()
                        .map(|hit| (c.code().to_string(), hit))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Scan did not finish");
            Vec::new()
        });
        Ok(found)
    }

    /// Install one component.
    pub async fn install(
        &self,
        code: &str,
        options: InstallOptions,
    ) -> InstallResult<InstallOutcome> {
        let component = self.component(code)?.clone();

        if let Some(path) = &options.override_path {
            return self.override_install(&component, path).await;
        }

        let url = component
            .download_url()
            .map(str::to_string)
            .ok_or_else(|| InstallError::NotInstallable {
                name: component.name().to_string(),
                reason: match component.shape() {
                    PipelineShape::BareExecutable { .. } => {
                        "install it with the system package manager".to_string()
                    }
                    _ => "no download location is configured".to_string(),
                },
            })?;

        if component.requires_network() && !self.probe.is_online().await {
            return Err(InstallError::NoInternet {
                name: component.name().to_string(),
            });
        }

        let missing = self.missing_dependencies(&component);
        if !missing.is_empty() {
            return Err(InstallError::MissingDependency {
                name: component.name().to_string(),
                missing,
            });
        }

        let task = InstallTask::new(component.code(), options);
        let guard = self.claim(&component)?;
        info!(component = component.code(), task = %task.id, "Install started");

        let result = self.run_task(&component, &task, url).await;

        drop(guard);
        self.refresh().await;

        match result {
            Ok(InstallOutcome::Installed(_)) => {
                let path = self.state.get(component.code());
                info!(
                    component = component.code(),
                    path = ?path,
                    elapsed_ms = task.elapsed_ms(),
                    "Install finished"
                );
                let _ = self.events.send(InstallEvent::Done {
                    task_id: task.id.clone(),
                    component: component.code().to_string(),
                    path: path.clone(),
                });
                Ok(InstallOutcome::Installed(path))
            }
            Ok(other) => Ok(other),
            Err(e) => {
                if !e.is_informational() {
                    let _ = self.events.send(InstallEvent::Failed {
                        task_id: task.id.clone(),
                        component: component.code().to_string(),
                        class: e.class(),
                        message: e.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    /// Install a component with everything it needs, in dependency order.
    ///
    /// Components already installed are skipped. A failure does not stop the
    /// batch; a cancelled directory choice does.
    pub async fn install_batch(
        &self,
        code: &str,
        dir: Option<PathBuf>,
    ) -> InstallResult<BatchReport> {
        self.component(code)?;
        let steps: Vec<(String, bool)> = self
            .catalog
            .install_set(code)
            .into_iter()
            .map(|c| (c.code().to_string(), c.shape().takes_target_dir()))
            .collect();

        let mut report = BatchReport::default();
        for (code, takes_dir) in steps {
            if self.state.is_installed(&code) {
                debug!(component = %code, "Already installed, skipping");
                report.skipped.push(code);
                continue;
            }

            let mut options = InstallOptions::full();
            options.target_dir = dir.clone().filter(|_| takes_dir);
            match self.install(&code, options).await {
                Ok(InstallOutcome::Cancelled) => {
                    warn!(component = %code, "Directory choice cancelled, stopping batch");
                    report.cancelled = true;
                    break;
                }
                Ok(_) => report.installed.push(code),
                Err(e) if e.is_informational() => report.skipped.push(code),
                Err(e) => {
                    warn!(component = %code, error = %e, "Batch step failed");
                    report.failed.push((code, e));
                }
            }
        }
        Ok(report)
    }

    fn component(&self, code: &str) -> InstallResult<&Component> {
        self.catalog
            .get(code)
            .ok_or_else(|| InstallError::UnknownComponent(code.to_string()))
    }

    /// Display names of dependencies not currently installed.
    fn missing_dependencies(&self, component: &Component) -> Vec<String> {
        component
            .dependencies()
            .iter()
            .filter(|code| !self.state.is_installed(code))
            .map(|code| {
                self.catalog
                    .get(code)
                    .map(|c| c.name().to_string())
                    .unwrap_or_else(|| code.clone())
            })
            .collect()
    }

    fn claim(&self, component: &Component) -> InstallResult<ActiveGuard> {
        let key = component.code().to_ascii_lowercase();
        if !self.active.lock().insert(key.clone()) {
            return Err(InstallError::AlreadyInstalling {
                name: component.name().to_string(),
            });
        }
        Ok(ActiveGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    async fn run_task(
        &self,
        component: &Component,
        task: &InstallTask,
        url: String,
    ) -> InstallResult<InstallOutcome> {
        if let Some(dir) = &task.options.target_dir {
            if !component.shape().takes_target_dir() {
                warn!(
                    component = component.code(),
                    shape = component.shape().name(),
                    dir = %dir.display(),
                    "Install directory ignored for this component"
                );
            }
        }

        let targets = match component.shape() {
            PipelineShape::DirectoryChosen => {
                let Some(target) = self.choose_target(component, &task.options).await else {
                    info!(component = component.code(), "No install directory chosen");
                    return Ok(InstallOutcome::Cancelled);
                };
                let standalone = !task.options.full_install && task.options.target_dir.is_none();
                if standalone && validate_installation(component, &target) {
                    return Err(InstallError::AlreadyInstalled {
                        name: component.name().to_string(),
                        path: target,
                    });
                }
                vec![target]
            }
            PipelineShape::SimpleDrop {
                parent,
                subdir,
                also_into,
            } => {
                let targets: Vec<PathBuf> = std::iter::once(parent)
                    .chain(also_into)
                    .filter_map(|code| self.state.get(code))
                    .map(|root| normalize_path(&root.join(subdir)))
                    .collect();
                if targets.is_empty() {
                    return Err(InstallError::MissingDependency {
                        name: component.name().to_string(),
                        missing: vec![self
                            .catalog
                            .get(parent)
                            .map(|c| c.name().to_string())
                            .unwrap_or_else(|| parent.clone())],
                    });
                }
                targets
            }
            PipelineShape::BareExecutable { .. } => Vec::new(),
        };

        let error_target = targets
            .first()
            .cloned()
            .unwrap_or_else(|| self.pipeline.config().scratch_dir(task.id.as_str()));
        let request = InstallRequest {
            task_id: task.id.to_string(),
            component: component.clone(),
            url,
            targets,
            full_install: task.options.full_install,
        };

        let outcome = self
            .pipeline
            .run(&request, self.progress_callback(task, component))
            .await
            .map_err(|source| InstallError::Pipeline {
                name: component.name().to_string(),
                target: error_target,
                source,
            })?;

        if let Some(primary) = outcome.targets.first() {
            self.record(component, primary).await;
            self.state.mark_installed(component, primary);
        }
        Ok(InstallOutcome::Installed(outcome.targets.first().cloned()))
    }

    async fn override_install(
        &self,
        component: &Component,
        path: &Path,
    ) -> InstallResult<InstallOutcome> {
        if self.is_installing(component.code()) {
            return Err(InstallError::AlreadyInstalling {
                name: component.name().to_string(),
            });
        }

        let root = normalize_install_path(component, path);
        if !validate_installation(component, &root) {
            return Err(InstallError::InvalidOverride {
                name: component.name().to_string(),
                path: root,
            });
        }

        self.record(component, &root).await;
        self.state.mark_installed(component, &root);
        self.refresh().await;
        info!(component = component.code(), path = %root.display(), "Install location overridden");
        Ok(InstallOutcome::Overridden(root))
    }

    /// Write a confirmed path to the configuration store and backup
    /// registry.
    async fn record(&self, component: &Component, dir: &Path) {
        let discovery = Arc::clone(&self.discovery);
        let (component, dir) = (component.clone(), dir.to_path_buf());
        if let Err(e) = tokio::task::spawn_blocking(move || discovery.record(&component, &dir)).await {
            warn!(error = %e, "Recording install path did not finish");
        }
    }

    async fn choose_target(
        &self,
        component: &Component,
        options: &InstallOptions,
    ) -> Option<PathBuf> {
        let base = match &options.target_dir {
            Some(dir) => dir.clone(),
            None => match &self.pipeline.config().install_root {
                InstallRootPreference::Fixed(dir) => dir.clone(),
                InstallRootPreference::Ask => self.ask(component, None).await?,
                InstallRootPreference::Auto => {
                    let source = Arc::clone(&self.drives);
                    let drives = tokio::task::spawn_blocking(move || source.list_drives())
                        .await
                        .unwrap_or_default();
                    let min_free = self.pipeline.config().min_free_space;
                    match auto_base(&drives, min_free, &self.components_dir, cfg!(windows)) {
                        Some(dir) => dir,
                        None => self.ask(component, None).await?,
                    }
                }
            },
        };
        Some(install_target(component, &base))
    }

    async fn ask(&self, component: &Component, suggested: Option<PathBuf>) -> Option<PathBuf> {
        let prompt = Arc::clone(&self.prompt);
        let component = component.clone();
        tokio::task::spawn_blocking(move || prompt.choose_directory(&component, suggested.as_deref()))
            .await
            .ok()
            .flatten()
    }

    fn progress_callback(&self, task: &InstallTask, component: &Component) -> ProgressCallback {
        let events = self.events.clone();
        let task_id = task.id.clone();
        let code = component.code().to_string();

        Arc::new(move |p: PipelineProgress| {
            let _ = events.send(InstallEvent::Progress {
                task_id: task_id.clone(),
                component: code.clone(),
                stage: p.stage,
                percent: p.percent,
                message: p.message,
            });
        })
    }
}

/// Removes the active-task marker when the install settles, including on
/// panic.
struct ActiveGuard {
    active: ActiveTasks,
    key: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}

/// Base directory for an automatic install: on Windows the drive with the
/// most free space, elsewhere the per-user components directory.
fn auto_base(
    drives: &[Drive],
    min_free: u64,
    components_dir: &Path,
    windows: bool,
) -> Option<PathBuf> {
    if windows {
        best_drive(drives, min_free).map(|drive| drive.root.join(AUTO_ROOT_DIR))
    } else {
        Some(components_dir.to_path_buf())
    }
}

/// The component's own folder beneath `base`, unless `base` already is it.
fn install_target(component: &Component, base: &Path) -> PathBuf {
    let base = normalize_path(base);
    let already_named = base
        .file_name()
        .map(|name| {
            name.to_string_lossy()
                .eq_ignore_ascii_case(component.install_dir_name())
        })
        .unwrap_or(false);
    if already_named {
        base
    } else {
        normalize_install_path(component, &base.join(component.install_dir_name()))
    }
}
