//! Main entry point for the Roomline CLI.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::client::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Roomline CLI
#[derive(Parser)]
#[command(name = "roomline")]
#[command(about = "Command-line client for Roomline chat rooms", long_about = None)]
struct Cli {
    /// Path to the configuration file (optional)
    #[arg(
        long,
        short,
        global = true,
        help = "Path to the configuration file (e.g., roomline.yaml or roomline.json)"
    )]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the configuration file and environment
    #[arg(long, global = true, help = "Backend base URL (e.g., http://localhost:54321)")]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to a room
    Send(commands::send::SendArgs),

    /// Print a room's history grouped by sender
    History(commands::history::HistoryArgs),

    /// Follow a room's realtime messages until interrupted
    Watch(commands::watch::WatchArgs),

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: clap_complete::Shell,
    },
}

fn load_config(path: Option<PathBuf>, backend: Option<String>) -> Result<Config> {
    Config::load_config(path, backend).map_err(|err| anyhow!("invalid configuration: {err}"))
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { format } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format)?;
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
        }
        command => {
            let config = load_config(cli.config, cli.backend)?;
            init_tracing(&config);
            match command {
                Commands::Send(args) => commands::send::run(&config, args).await?,
                Commands::History(args) => commands::history::run(&config, args).await?,
                Commands::Watch(args) => commands::watch::run(&config, args).await?,
                Commands::Config { .. } | Commands::Completion { .. } => {}
            }
        }
    }

    Ok(())
}
