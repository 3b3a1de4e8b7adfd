//! Shared setup for commands: settings, runtime and the orchestrator.

use std::sync::Arc;

use lsolauncher::component::Catalog;
use lsolauncher::config::{data_dir, ConfigFile, LocalRegistry};
use lsolauncher::discovery::{platform_store, Discovery};
use lsolauncher::drives::SystemDrives;
use lsolauncher::manager::{ManagerConfig, Pipeline};
use lsolauncher::orchestrator::Orchestrator;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::error::CliError;
use crate::prompt::ConsolePrompt;

/// Owns the settings and the tokio runtime for one command.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
}

impl CliRunner {
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load().unwrap_or_else(|e| {
            warn!(error = %e, "Using default settings");
            ConfigFile::default()
        });
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = lsolauncher::VERSION,
            command,
            os = std::env::consts::OS,
            "LSO launcher starting"
        );
    }

    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Orchestrator wired to the real drives, store and network.
    pub fn orchestrator(&self) -> Orchestrator {
        let manager = ManagerConfig::from_config_file(&self.config);
        let catalog = Catalog::standard(&data_dir()).with_download_overrides(&manager.download_urls);
        let drives = Arc::new(SystemDrives);
        let discovery = Discovery::new(
            Arc::from(platform_store()),
            LocalRegistry::default_location(),
            drives.clone(),
        );

        Orchestrator::new(catalog, discovery, Pipeline::new(manager))
            .with_drives(drives)
            .with_prompt(Arc::new(ConsolePrompt))
    }
}
