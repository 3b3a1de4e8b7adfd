//! LSO launcher CLI - install, find and start LegacySO.

mod commands;
mod error;
mod progress;
mod prompt;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;
use lsolauncher::config::log_dir;
use lsolauncher::launch::LaunchVariant;
use lsolauncher::logging::init_logging;

use commands::config::ConfigCommands;
use commands::install::InstallArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "lsolauncher", version, about = "Install, find and launch LegacySO")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write this session's log to the launcher's log directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install a component (TSO, LSO, RMS, Simitone, OpenAL, NET, SDL, Mono, MacExtras)
    Install {
        /// Component code
        code: String,

        /// Install beneath this directory instead of choosing one
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Record an existing installation at this path without copying anything
        #[arg(long = "override", value_name = "PATH", conflicts_with = "dir")]
        override_path: Option<PathBuf>,

        /// Run installers silently and replace an existing installation
        #[arg(long)]
        full: bool,
    },

    /// Install LegacySO together with everything it needs
    InstallAll {
        /// Install beneath this directory instead of choosing one
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Search every drive for existing installations
    Scan {
        /// Only look for this component
        #[arg(long = "type", value_name = "CODE")]
        component: Option<String>,
    },

    /// List drives and their free space
    Drives,

    /// Show installed components
    Status,

    /// Start the game
    Launch {
        /// Game to start (game, lso, simitone, ts1)
        #[arg(default_value = "game")]
        game: String,

        /// Client variant: default, volcanic or 3d
        #[arg(long, default_value = "default")]
        variant: LaunchVariant,
    },

    /// View or change settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();
    let log_dir = cli.log_file.then(log_dir);
    let _log_session = init_logging(cli.verbose, log_dir.as_deref());

    if let Err(e) = run(cli.command) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(e.exit_code());
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Install {
            code,
            dir,
            override_path,
            full,
        } => commands::install::run(InstallArgs {
            code,
            dir,
            override_path,
            full,
        }),
        Commands::InstallAll { dir } => commands::install::run_all(dir),
        Commands::Scan { component } => commands::scan::run(component),
        Commands::Drives => commands::scan::run_drives(),
        Commands::Status => commands::status::run(),
        Commands::Launch { game, variant } => commands::launch::run(&game, variant),
        Commands::Config(command) => commands::config::run(command),
    }
}
