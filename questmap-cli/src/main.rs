//! QuestMap CLI - Command-line interface
//!
//! Downloads map notes for a tile rect and lists the quests visible to you,
//! and manages the configuration file.

mod commands;
mod error;
mod progress;

use clap::{Parser, Subcommand};
use questmap::config::ConfigFile;
use questmap::logging::init_logging;

use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "questmap")]
#[command(version, about = "Download map quests and list the ones visible to you", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download notes for a tile rect and list visible quests
    Download(DownloadArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Download(args) => {
            let config = ConfigFile::load()?;
            let _logging = init_logging(&config.logging.directory, &config.logging.file)
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;
            commands::download::run(args, &config)
        }
        Commands::Config { command } => commands::config::run(command),
    }
}
