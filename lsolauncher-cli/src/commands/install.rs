//! Install commands - `install <code>` and `install-all`.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use lsolauncher::manager::ErrorClass;
use lsolauncher::orchestrator::{BatchReport, InstallOptions, InstallOutcome, Orchestrator};

use crate::error::CliError;
use crate::progress::ProgressDisplay;
use crate::runner::CliRunner;

/// Arguments for the install command.
pub struct InstallArgs {
    pub code: String,
    pub dir: Option<PathBuf>,
    pub override_path: Option<PathBuf>,
    pub full: bool,
}

impl InstallArgs {
    fn options(&self) -> InstallOptions {
        InstallOptions {
            full_install: self.full,
            override_path: self.override_path.clone(),
            target_dir: self.dir.clone(),
        }
    }
}

/// Run the install command.
pub fn run(args: InstallArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("install");
    let orchestrator = runner.orchestrator();
    let options = args.options();

    let outcome = runner.block_on(async move {
        orchestrator.refresh().await;
        with_progress(orchestrator, |o| async move { o.install(&args.code, options).await }).await
    })?;

    match outcome {
        InstallOutcome::Installed(Some(path)) => {
            println!("{} {}", style("Installed to").green().bold(), path.display())
        }
        InstallOutcome::Installed(None) => println!("{}", style("Installed").green().bold()),
        InstallOutcome::Overridden(path) => {
            println!("{} {}", style("Now using").green().bold(), path.display())
        }
        InstallOutcome::Cancelled => println!("No install directory chosen; nothing was installed."),
    }
    Ok(())
}

/// Run the install-all command: LegacySO with everything it needs.
pub fn run_all(dir: Option<PathBuf>) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("install-all");
    let orchestrator = runner.orchestrator();

    let report = runner.block_on(async move {
        orchestrator.refresh().await;
        with_progress(orchestrator, |o| async move { o.install_batch("LSO", dir).await }).await
    })?;

    print_report(&report);
    if report.failed.is_empty() {
        return Ok(());
    }
    Err(CliError::Batch {
        failed: report.failed.len(),
        attempted: report.installed.len() + report.failed.len(),
        class: report.first_failure_class().unwrap_or(ErrorClass::General),
    })
}

/// Run `work` while rendering its events. The orchestrator is dropped when
/// the work is done so the event stream closes.
async fn with_progress<T, F, Fut>(orchestrator: Orchestrator, work: F) -> T
where
    F: FnOnce(Arc<Orchestrator>) -> Fut,
    Fut: Future<Output = T>,
{
    let events = orchestrator.subscribe();
    let display = tokio::spawn(ProgressDisplay::new().follow(events));

    let orchestrator = Arc::new(orchestrator);
    let result = work(Arc::clone(&orchestrator)).await;
    drop(orchestrator);

    let _ = display.await;
    result
}

fn print_report(report: &BatchReport) {
    println!();
    for code in &report.installed {
        println!("  {} {}", style("installed").green(), code);
    }
    for code in &report.skipped {
        println!("  {} {}", style("present").dim(), code);
    }
    for (code, error) in &report.failed {
        println!("  {} {}: {}", style("failed").red(), code, error);
    }
    if report.cancelled {
        println!("Stopped: no install directory chosen.");
    }
}
