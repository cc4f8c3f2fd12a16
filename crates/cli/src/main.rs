//! Vigil CLI - vigil command

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use cli_lib::{cmd, logging};
use std::path::PathBuf;

/// Vigil - Live health dashboard for your local repositories
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the status of every repository once
    Status {
        /// Repositories to show (default: from the config file)
        paths: Vec<PathBuf>,
    },
    /// Show a live dashboard that updates as repositories change
    Watch {
        /// Repositories to watch (default: from the config file)
        paths: Vec<PathBuf>,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,
    /// Print one value
    Get {
        /// Dotted key, e.g. fetch.subprocess_concurrency
        key: String,
    },
    /// Change one value
    Set {
        /// Dotted key, e.g. fetch.subprocess_concurrency
        key: String,
        /// New value (comma-separated for lists)
        value: String,
    },
    /// Show the config file location
    Path {
        /// Create the file with defaults if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Status { paths } => cmd::status::run(paths).await,
        Commands::Watch { paths } => cmd::watch::run(paths).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
