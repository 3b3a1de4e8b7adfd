//! Launch command - start the installed game.

use lsolauncher::launch::{LaunchController, LaunchVariant};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the launch command.
pub fn run(game: &str, variant: LaunchVariant) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("launch");
    let orchestrator = runner.orchestrator();
    runner.block_on(orchestrator.refresh());

    let controller = LaunchController::new(
        orchestrator.catalog(),
        orchestrator.installed(),
        runner.config().game.clone(),
    );
    let process = controller.launch(game, variant)?;

    println!("Started {} (pid {})", process.plan, process.pid);
    Ok(())
}
