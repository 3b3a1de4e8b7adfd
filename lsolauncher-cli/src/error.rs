//! CLI error type and exit codes.

use lsolauncher::config::ConfigError;
use lsolauncher::launch::LaunchError;
use lsolauncher::manager::{ErrorClass, InstallError};
use thiserror::Error;

/// Errors surfaced to the user by a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Install(#[from] InstallError),

    #[error("{0}")]
    Launch(#[from] LaunchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Settings(#[from] ConfigError),

    #[error("{failed} of {attempted} components failed to install")]
    Batch {
        failed: usize,
        attempted: usize,
        class: ErrorClass,
    },

    #[error("Failed to start runtime: {0}")]
    Runtime(String),
}

impl CliError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Install(e) => e.class(),
            Self::Launch(e) => e.class(),
            Self::Config(_) | Self::Settings(_) => ErrorClass::Validation,
            Self::Batch { class, .. } => *class,
            Self::Runtime(_) => ErrorClass::General,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.class().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let cases = [
            (
                CliError::Install(InstallError::NoInternet {
                    name: "LegacySO".to_string(),
                }),
                10,
            ),
            (
                CliError::Install(InstallError::MissingDependency {
                    name: "LegacySO".to_string(),
                    missing: vec!["The Sims Online".to_string()],
                }),
                13,
            ),
            (
                CliError::Install(InstallError::AlreadyInstalling {
                    name: "LegacySO".to_string(),
                }),
                14,
            ),
            (
                CliError::Install(InstallError::AlreadyInstalled {
                    name: "LegacySO".to_string(),
                    path: PathBuf::from("/games/LegacySO"),
                }),
                15,
            ),
            (CliError::Install(InstallError::UnknownComponent("XYZ".to_string())), 12),
            (CliError::Config("bad".to_string()), 12),
            (CliError::Runtime("no threads".to_string()), 1),
        ];
        for (error, code) in cases {
            assert_eq!(error.exit_code(), code, "{}", error);
        }
    }

    #[test]
    fn test_launch_needing_install_uses_dependency_code() {
        let error = CliError::Launch(LaunchError::NeedsInstall {
            name: "LegacySO".to_string(),
        });
        assert_eq!(error.exit_code(), 13);
    }

    #[test]
    fn test_batch_takes_first_failure_class() {
        let error = CliError::Batch {
            failed: 1,
            attempted: 5,
            class: ErrorClass::Permission,
        };
        assert_eq!(error.exit_code(), 11);
        assert_eq!(error.to_string(), "1 of 5 components failed to install");
    }
}
