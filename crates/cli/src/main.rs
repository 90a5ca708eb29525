//! threadloom CLI — the main entry point.
//!
//! Commands:
//! - `replay`   — Feed a recorded session through a message list and print a view
//! - `inspect`  — Summarize a stored thread file
//! - `config`   — Show, validate or locate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "threadloom",
    about = "threadloom — ordered, deduplicated conversation logs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.threadloom/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session (JSON array or JSON lines of {source, input})
    Replay {
        /// Session file
        file: PathBuf,

        /// Output shape
        #[arg(long, default_value = "canonical")]
        view: commands::replay::ViewKind,

        /// Which messages to print: all, memory, input, response
        #[arg(long, default_value = "all")]
        subset: threadloom_store::Subset,

        /// Override the thread id
        #[arg(long)]
        thread: Option<String>,

        /// Recall the thread from this directory first and flush the new delta back
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },

    /// Summarize a stored thread file (JSON lines of canonical messages)
    Inspect {
        file: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the default config file path
    Path,
    /// Print a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Replay {
            file,
            view,
            subset,
            thread,
            save_dir,
        } => {
            let options = commands::replay::ReplayOptions {
                view,
                subset,
                thread,
                save_dir,
            };
            commands::replay::run(&file, config_path, options).await?
        }
        Commands::Inspect { file } => commands::inspect::run(&file)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init(),
        },
    }

    Ok(())
}
