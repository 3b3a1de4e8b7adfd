//! The component installer pipeline.
//!
//! One [`Pipeline::run`] serves every [`PipelineShape`]; the shape decides
//! which stages run:
//!
//! ```text
//! Idle ─> Downloading ─> Extracting ─> Moving ─> SettingPermissions ─> Done
//!   │          │              │           │               │
//!   └──────────┴──────────────┴───────────┴───────────────┴─────────> Failed
//!
//! BareExecutable: Idle ─> Downloading (then runs the installer) ─> Done
//! ```
//!
//! Stages only move forward. All work happens in a scratch directory named
//! after the task, which is removed whatever the outcome.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::ManagerConfig;
use super::download::{HttpDownloader, ProgressCounters, ProgressSampler};
use super::error::{PipelineError, PipelineResult};
use super::extractor::ZipExtractor;
use super::privileged::{platform_copier, CopyMode, PrivilegedCopy};
use super::traits::{ArchiveExtractor, Downloader};
use crate::component::{Component, PipelineShape};
use crate::discovery::{find_executable, validate_installation};
use crate::drives::format_size;

/// Stage of a running install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Downloading,
    Extracting,
    Moving,
    SettingPermissions,
    Done,
    Failed,
}

impl Stage {
    fn order(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Downloading => 1,
            Self::Extracting => 2,
            Self::Moving => 3,
            Self::SettingPermissions => 4,
            Self::Done => 5,
            Self::Failed => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Moving => "moving",
            Self::SettingPermissions => "setting permissions",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Forward-only stage state machine.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: Stage,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: Stage::Idle,
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    /// Move to `next`. Skipping stages is allowed, going back or leaving a
    /// terminal stage is not. Any live stage may fail.
    pub fn advance(&mut self, next: Stage) -> PipelineResult<()> {
        let allowed = !self.current.is_terminal()
            && (next == Stage::Failed || next.order() > self.current.order());
        if !allowed {
            return Err(PipelineError::InvalidTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }
        self.current = next;
        Ok(())
    }
}

/// A progress report from a running pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineProgress {
    pub stage: Stage,
    /// Percentage of the current stage, `0.0..=100.0`.
    pub percent: f64,
    pub message: String,
}

/// Receives progress reports. Called from the runtime and blocking threads.
pub type ProgressCallback = Arc<dyn Fn(PipelineProgress) + Send + Sync>;

/// What to install and where.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Names the scratch directory.
    pub task_id: String,
    pub component: Component,
    pub url: String,
    /// Install roots receiving the files. Empty for installers.
    pub targets: Vec<PathBuf>,
    /// Run installers with their silent flags.
    pub full_install: bool,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Install roots written.
    pub targets: Vec<PathBuf>,
    pub downloaded_bytes: u64,
    /// Files extracted from the archive.
    pub files: usize,
}

/// Per-task scratch directory, removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create an empty scratch directory at `path`, clearing leftovers.
    pub fn create(path: PathBuf) -> PipelineResult<Self> {
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        }
        fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now, reporting failure.
    pub fn cleanup(mut self) -> io::Result<()> {
        self.removed = true;
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.removed && self.path.exists() {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Installs one component per run.
pub struct Pipeline {
    config: ManagerConfig,
    downloader: Arc<dyn Downloader>,
    extractor: Arc<dyn ArchiveExtractor>,
    copier: Arc<dyn PrivilegedCopy>,
}

impl Pipeline {
    /// A pipeline with the HTTP downloader, ZIP extractor and the host's
    /// copier.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            downloader: Arc::new(HttpDownloader::with_timeout(config.download_timeout)),
            extractor: Arc::new(ZipExtractor::new()),
            copier: platform_copier(&config.temp_dir),
            config,
        }
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_copier(mut self, copier: Arc<dyn PrivilegedCopy>) -> Self {
        self.copier = copier;
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Run every stage of `request`, reporting through `progress`.
    ///
    /// The scratch directory is gone when this returns, on success and on
    /// failure.
    pub async fn run(
        &self,
        request: &InstallRequest,
        progress: ProgressCallback,
    ) -> PipelineResult<PipelineOutcome> {
        let mut tracker = StageTracker::new();
        let scratch = ScratchDir::create(self.config.scratch_dir(&request.task_id))?;

        let result = self.run_stages(request, &scratch, &mut tracker, &progress).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.cleanup() {
            warn!(path = %scratch_path.display(), error = %e, "Failed to remove scratch directory");
        }

        match &result {
            Ok(outcome) => {
                tracker.advance(Stage::Done)?;
                info!(
                    component = request.component.code(),
                    task = %request.task_id,
                    bytes = outcome.downloaded_bytes,
                    files = outcome.files,
                    "Install pipeline finished"
                );
                progress(PipelineProgress {
                    stage: Stage::Done,
                    percent: 100.0,
                    message: format!("{} installed", request.component.name()),
                });
            }
            Err(e) => {
                let failed_in = tracker.current();
                let _ = tracker.advance(Stage::Failed);
                warn!(
                    component = request.component.code(),
                    task = %request.task_id,
                    stage = %failed_in,
                    error = %e,
                    "Install pipeline failed"
                );
            }
        }
        result
    }

    async fn run_stages(
        &self,
        request: &InstallRequest,
        scratch: &ScratchDir,
        tracker: &mut StageTracker,
        progress: &ProgressCallback,
    ) -> PipelineResult<PipelineOutcome> {
        let component = &request.component;
        let report = |stage: Stage, percent: f64, message: String| {
            progress(PipelineProgress {
                stage,
                percent,
                message,
            })
        };

        // Downloading
        tracker.advance(Stage::Downloading)?;
        info!(component = component.code(), url = %request.url, "Downloading");
        report(Stage::Downloading, 0.0, format!("Downloading {}", component.name()));
        let payload = scratch.path().join(payload_file_name(component.shape(), &request.url));
        let downloaded_bytes = self.download(&request.url, &payload, progress).await?;

        if let PipelineShape::BareExecutable { silent_args } = component.shape() {
            let args = if request.full_install {
                silent_args.clone()
            } else {
                Vec::new()
            };
            report(
                Stage::Downloading,
                100.0,
                format!("Running {} installer", component.name()),
            );
            let installer = payload.clone();
            blocking(&payload, move || run_installer(&installer, &args)).await?;
            return Ok(PipelineOutcome {
                targets: Vec::new(),
                downloaded_bytes,
                files: 0,
            });
        }

        let extractor = Arc::clone(&self.extractor);
        let archive = payload.clone();
        blocking(&payload, move || extractor.verify(&archive)).await?;

        // Extracting
        tracker.advance(Stage::Extracting)?;
        report(Stage::Extracting, 0.0, format!("Extracting {}", component.name()));
        let extracted = scratch.path().join("extracted");
        let files = {
            let extractor = Arc::clone(&self.extractor);
            let (archive, dest) = (payload.clone(), extracted.clone());
            blocking(&payload, move || extractor.extract(&archive, &dest)).await?
        };
        let source = component.layout().source_in(&extracted);
        if !validate_installation(component, &source) {
            return Err(PipelineError::corrupt(
                &payload,
                format!(
                    "expected {} under '{}'",
                    component.executables().join(" or "),
                    component.layout().root.display()
                ),
            ));
        }
        report(Stage::Extracting, 100.0, format!("{} files extracted", files));

        // Moving
        tracker.advance(Stage::Moving)?;
        let mode = match component.shape() {
            PipelineShape::SimpleDrop { .. } => CopyMode::Merge,
            _ => CopyMode::Replace,
        };
        let total = request.targets.len().max(1) as f64;
        for (i, target) in request.targets.iter().enumerate() {
            report(
                Stage::Moving,
                i as f64 / total * 100.0,
                format!("Copying files to {}", target.display()),
            );
            let copier = Arc::clone(&self.copier);
            let (from, to) = (source.clone(), target.clone());
            blocking(target, move || copier.copy(&from, &to, mode)).await?;
            debug!(target = %target.display(), copier = self.copier.name(), "Files moved");
        }

        // SettingPermissions
        tracker.advance(Stage::SettingPermissions)?;
        for target in &request.targets {
            report(
                Stage::SettingPermissions,
                0.0,
                format!("Setting permissions on {}", target.display()),
            );
            let executables: Vec<PathBuf> = find_executable(component, target).into_iter().collect();
            if executables.is_empty() {
                return Err(PipelineError::io(
                    target,
                    io::Error::new(io::ErrorKind::NotFound, "installed files are incomplete"),
                ));
            }
            let copier = Arc::clone(&self.copier);
            let dest = target.clone();
            blocking(target, move || copier.grant_access(&dest, &executables)).await?;
        }

        Ok(PipelineOutcome {
            targets: request.targets.clone(),
            downloaded_bytes,
            files,
        })
    }

    /// Download on a blocking thread, sampling progress and enforcing the
    /// time limit. A partial file never survives a failure.
    async fn download(&self, url: &str, dest: &Path, progress: &ProgressCallback) -> PipelineResult<u64> {
        let counters = Arc::new(ProgressCounters::new());
        let sampler = {
            let progress = Arc::clone(progress);
            ProgressSampler::start(
                Arc::clone(&counters),
                self.config.progress_interval,
                Box::new(move |sample: &ProgressCounters| {
                    progress(PipelineProgress {
                        stage: Stage::Downloading,
                        percent: sample.fraction().map_or(0.0, |f| f * 100.0),
                        message: format!("{} downloaded", format_size(sample.received())),
                    });
                }),
            )
        };

        let mut handle = {
            let downloader = Arc::clone(&self.downloader);
            let counters = Arc::clone(&counters);
            let (url, dest) = (url.to_string(), dest.to_path_buf());
            tokio::task::spawn_blocking(move || downloader.download(&url, &dest, &counters))
        };

        let result = match tokio::time::timeout(self.config.download_timeout, &mut handle).await {
            Ok(joined) => joined.map_err(|e| join_error(dest, e)).and_then(|r| r),
            Err(_) => {
                counters.request_stop();
                let _ = handle.await;
                Err(PipelineError::DownloadTimeout {
                    url: url.to_string(),
                    timeout_secs: self.config.download_timeout.as_secs(),
                })
            }
        };
        sampler.stop().await;

        if result.is_err() && dest.exists() {
            let _ = fs::remove_file(dest);
        }
        result
    }
}

fn join_error(path: &Path, e: tokio::task::JoinError) -> PipelineError {
    PipelineError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, e.to_string()),
    }
}

/// Run blocking `work` on the blocking pool.
async fn blocking<T, F>(path: &Path, work: F) -> PipelineResult<T>
where
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| join_error(path, e))?
}

/// Scratch file name for a downloaded payload.
fn payload_file_name(shape: &PipelineShape, url: &str) -> String {
    if shape.moves_files() {
        return "payload.zip".to_string();
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if name.contains('.') => name.to_string(),
        _ => "installer.exe".to_string(),
    }
}

/// Run a downloaded installer and wait for it.
fn run_installer(installer: &Path, args: &[String]) -> PipelineResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(installer, fs::Permissions::from_mode(0o755))
            .map_err(|e| PipelineError::io(installer, e))?;
    }

    info!(installer = %installer.display(), ?args, "Running installer");
    let status = match Command::new(installer).args(args).status() {
        Ok(status) => status,
        #[cfg(windows)]
        Err(e) if e.raw_os_error() == Some(ERROR_ELEVATION_REQUIRED) => {
            return run_installer_elevated(installer, args);
        }
        Err(e) => {
            return Err(PipelineError::InstallerFailed {
                program: installer.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    if !status.success() {
        return Err(PipelineError::InstallerFailed {
            program: installer.to_path_buf(),
            reason: match status.code() {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            },
        });
    }
    Ok(())
}

#[cfg(windows)]
const ERROR_ELEVATION_REQUIRED: i32 = 740;

#[cfg(windows)]
fn run_installer_elevated(installer: &Path, args: &[String]) -> PipelineResult<()> {
    let quote = |s: &str| format!("'{}'", s.replace('\'', "''"));
    let mut command = format!(
        "$p = Start-Process -FilePath {} -Verb RunAs -Wait -PassThru",
        quote(&installer.display().to_string())
    );
    if !args.is_empty() {
        let list: Vec<String> = args.iter().map(|a| quote(a)).collect();
        command.push_str(&format!(" -ArgumentList {}", list.join(",")));
    }
    command.push_str("; exit $p.ExitCode");

    let status = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &command])
        .status()
        .map_err(|e| PipelineError::InstallerFailed {
            program: installer.to_path_buf(),
            reason: e.to_string(),
        })?;
    if !status.success() {
        return Err(PipelineError::PermissionDenied {
            path: installer.to_path_buf(),
            reason: "elevated installer did not complete".to_string(),
        });
    }
    Ok(())
}
