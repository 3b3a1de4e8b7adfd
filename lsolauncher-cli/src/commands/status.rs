//! Status command - show what is installed and where.

use console::style;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the status command.
pub fn run() -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("status");
    let orchestrator = runner.orchestrator();
    runner.block_on(orchestrator.refresh());

    let installed = orchestrator.installed();
    for component in orchestrator.catalog().install_order() {
        match installed.get(component.code()) {
            Some(path) => println!(
                "  {} {:<24} {}",
                style("✓").green(),
                component.name(),
                path.display()
            ),
            None => println!(
                "  {} {:<24} {}",
                style("✗").red(),
                component.name(),
                style("not installed").dim()
            ),
        }
    }
    Ok(())
}
