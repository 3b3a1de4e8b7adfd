//! Error types for installs.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for orchestrated installs.
pub type InstallResult<T> = Result<T, InstallError>;

/// Coarse classification of a failure, shared by events and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Network,
    Permission,
    Validation,
    MissingDependency,
    AlreadyInstalling,
    AlreadyInstalled,
    General,
}

impl ErrorClass {
    /// Process exit code for the class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Network => 10,
            Self::Permission => 11,
            Self::Validation => 12,
            Self::MissingDependency => 13,
            Self::AlreadyInstalling => 14,
            Self::AlreadyInstalled => 15,
            Self::General => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::MissingDependency => "missing-dependency",
            Self::AlreadyInstalling => "already-installing",
            Self::AlreadyInstalled => "already-installed",
            Self::General => "error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while a pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure while downloading.
    #[error("download of {url} failed: {reason}")]
    NetworkFailure { url: String, reason: String },

    /// The download did not finish within the time limit.
    #[error("download of {url} timed out after {timeout_secs}s")]
    DownloadTimeout { url: String, timeout_secs: u64 },

    /// The payload is not a usable archive, or lacks the expected files.
    #[error("corrupt archive {}: {reason}", path.display())]
    ArchiveCorrupt { path: PathBuf, reason: String },

    /// Copying or granting access was refused.
    #[error("permission denied for {}: {reason}", path.display())]
    PermissionDenied { path: PathBuf, reason: String },

    /// A downloaded third-party installer exited unsuccessfully.
    #[error("installer {} failed: {reason}", program.display())]
    InstallerFailed { program: PathBuf, reason: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// A stage was entered out of order.
    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl PipelineError {
    /// Wrap an I/O error, treating access errors as permission failures.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path,
                reason: source.to_string(),
            }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArchiveCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NetworkFailure { .. } | Self::DownloadTimeout { .. } => ErrorClass::Network,
            Self::ArchiveCorrupt { .. } => ErrorClass::Validation,
            Self::PermissionDenied { .. } => ErrorClass::Permission,
            Self::InstallerFailed { .. } | Self::Io { .. } | Self::InvalidTransition { .. } => {
                ErrorClass::General
            }
        }
    }
}

/// Errors returned by the orchestrator.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    #[error("{name} cannot be installed by the launcher: {reason}")]
    NotInstallable { name: String, reason: String },

    #[error("{name} needs an internet connection to install")]
    NoInternet { name: String },

    #[error("{name} is already being installed")]
    AlreadyInstalling { name: String },

    #[error("{name} requires {} to be installed first", missing.join(", "))]
    MissingDependency { name: String, missing: Vec<String> },

    #[error("{name} is already installed at {}", path.display())]
    AlreadyInstalled { name: String, path: PathBuf },

    #[error("{name} was not found at {}", path.display())]
    InvalidOverride { name: String, path: PathBuf },

    #[error("installing {name} to {} failed: {source}", target.display())]
    Pipeline {
        name: String,
        target: PathBuf,
        #[source]
        source: PipelineError,
    },

    #[error("install task for {name} stopped unexpectedly")]
    TaskAborted { name: String },
}

impl InstallError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownComponent(_) | Self::NotInstallable { .. } | Self::InvalidOverride { .. } => {
                ErrorClass::Validation
            }
            Self::NoInternet { .. } => ErrorClass::Network,
            Self::AlreadyInstalling { .. } => ErrorClass::AlreadyInstalling,
            Self::MissingDependency { .. } => ErrorClass::MissingDependency,
            Self::AlreadyInstalled { .. } => ErrorClass::AlreadyInstalled,
            Self::Pipeline { source, .. } => source.class(),
            Self::TaskAborted { .. } => ErrorClass::General,
        }
    }

    /// Informational outcomes that do not indicate a problem.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::AlreadyInstalled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let classes = [
            ErrorClass::Network,
            ErrorClass::Permission,
            ErrorClass::Validation,
            ErrorClass::MissingDependency,
            ErrorClass::AlreadyInstalling,
            ErrorClass::AlreadyInstalled,
            ErrorClass::General,
        ];
        let mut codes: Vec<i32> = classes.iter().map(|c| c.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), classes.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_missing_dependency_display() {
        let err = InstallError::MissingDependency {
            name: "LegacySO".to_string(),
            missing: vec!["The Sims Online".to_string(), "OpenAL".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "LegacySO requires The Sims Online, OpenAL to be installed first"
        );
        assert_eq!(err.class(), ErrorClass::MissingDependency);
    }

    #[test]
    fn test_pipeline_class_follows_source() {
        let err = InstallError::Pipeline {
            name: "LegacySO".to_string(),
            target: PathBuf::from("/games/LegacySO"),
            source: PipelineError::corrupt("/tmp/a.zip", "archive is empty"),
        };
        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(err.to_string().contains("/games/LegacySO"));
        assert!(err.to_string().contains("archive is empty"));
    }

    #[test]
    fn test_io_permission_maps_to_permission_denied() {
        let err = PipelineError::io(
            "/opt/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.class(), ErrorClass::Permission);
        let err = PipelineError::io("/opt/x", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.class(), ErrorClass::General);
    }
}
