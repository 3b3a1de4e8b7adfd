//! Orchestrator types.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};

use crate::manager::{ErrorClass, InstallError, Stage};

/// Options for one `install` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Part of a batch install: installers run silently and an existing
    /// installation is replaced without asking.
    pub full_install: bool,
    /// Only record this existing installation, copying nothing.
    pub override_path: Option<PathBuf>,
    /// Install beneath this directory instead of choosing one.
    pub target_dir: Option<PathBuf>,
}

impl InstallOptions {
    pub fn standalone() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            full_install: true,
            ..Self::default()
        }
    }

    pub fn with_target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }
}

/// How an `install` call ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Files were installed. The path is the component's install root as
    /// discovered afterwards; runtimes installed by a vendor installer may
    /// not be found in a known place.
    Installed(Option<PathBuf>),
    /// An existing installation was recorded.
    Overridden(PathBuf),
    /// The directory prompt was dismissed; nothing happened.
    Cancelled,
}

/// Identifier of one install task, unique within the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// `<code>-<timestamp>-<counter>`.
    pub fn next(code: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "{}-{}-{}",
            code.to_ascii_lowercase(),
            Local::now().format("%Y%m%d%H%M%S"),
            n
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An install in flight.
#[derive(Debug, Clone)]
pub struct InstallTask {
    pub id: TaskId,
    pub options: InstallOptions,
    pub started: DateTime<Local>,
}

impl InstallTask {
    pub fn new(code: &str, options: InstallOptions) -> Self {
        Self {
            id: TaskId::next(code),
            options,
            started: Local::now(),
        }
    }

    /// Milliseconds since the task started.
    pub fn elapsed_ms(&self) -> i64 {
        (Local::now() - self.started).num_milliseconds()
    }
}

/// Broadcast to every subscriber while installs run.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallEvent {
    Progress {
        task_id: TaskId,
        component: String,
        stage: Stage,
        percent: f64,
        message: String,
    },
    Done {
        task_id: TaskId,
        component: String,
        path: Option<PathBuf>,
    },
    Failed {
        task_id: TaskId,
        component: String,
        class: ErrorClass,
        message: String,
    },
}

impl InstallEvent {
    pub fn component(&self) -> &str {
        match self {
            Self::Progress { component, .. }
            | Self::Done { component, .. }
            | Self::Failed { component, .. } => component,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Progress { task_id, .. }
            | Self::Done { task_id, .. }
            | Self::Failed { task_id, .. } => task_id,
        }
    }
}

/// Result of a batch install.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Codes installed by this batch.
    pub installed: Vec<String>,
    /// Codes already present.
    pub skipped: Vec<String>,
    /// Codes that failed, with the reason.
    pub failed: Vec<(String, InstallError)>,
    /// The batch stopped because a directory choice was cancelled.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Class of the first failure.
    pub fn first_failure_class(&self) -> Option<ErrorClass> {
        self.failed.first().map(|(_, e)| e.class())
    }
}
