//! Scan command - search every drive for existing installations.

use console::style;
use lsolauncher::drives::{format_size, list_drives};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the scan command.
pub fn run(component: Option<String>) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("scan");
    let orchestrator = runner.orchestrator();

    let found = runner.block_on(orchestrator.scan(component.as_deref()))?;

    if found.is_empty() {
        println!("No installations found.");
        return Ok(());
    }

    println!("Found {} installation(s):", found.len());
    for (code, hit) in &found {
        println!(
            "  {:<10} {}  {}",
            style(code).bold(),
            hit.path.display(),
            style(format!("[{} on {}]", hit.matched, hit.drive)).dim()
        );
    }
    Ok(())
}

/// Run the drives command.
pub fn run_drives() -> Result<(), CliError> {
    let drives = list_drives();
    if drives.is_empty() {
        println!("No drives found.");
        return Ok(());
    }

    println!("{:<12} {:>12} {:>12}  ROOT", "DRIVE", "FREE", "TOTAL");
    for drive in drives {
        let free = drive.free.bytes().map(format_size).unwrap_or_else(|| "unknown".into());
        let total = drive.total.bytes().map(format_size).unwrap_or_else(|| "unknown".into());
        println!("{:<12} {:>12} {:>12}  {}", drive.id, free, total, drive.root.display());
    }
    Ok(())
}
