use crate::audit::ActivityLog;
use crate::config::load_config;
use crate::gateway::run_gateway;
use crate::storage::{FileStore, Store};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "scamwatch")]
#[command(about = "scamwatch - Suspected scam / cyber pitfall Telegram bot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable verbose (DEBUG) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display version information
    Version,

    /// Run the bot
    Run {
        /// Config file (default: ~/.scamwatch/config.json)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Completion model / deployment name
        #[arg(long, value_name = "NAME")]
        model: Option<String>,
    },

    /// Print the stored activity (audit) trail, oldest first
    Activity {
        /// How many of the most recent events to show
        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

/// Loads the configuration a command needs before logging is set up, so the
/// activity log file can be attached.
pub fn activity_log_path(cli: &Cli) -> Option<PathBuf> {
    match &cli.command {
        Some(Commands::Run { config, model }) => load_config(model.clone(), config.clone())
            .ok()
            .and_then(|c| c.activity_log),
        _ => None,
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Version) => {
            tracing::debug!("Printing version");
            print_version();
            Ok(())
        }
        Some(Commands::Run { config, model }) => {
            let config = load_config(model, config)?;
            run_gateway(&config).await
        }
        Some(Commands::Activity { limit, config }) => print_activity(limit, config).await,
        None => {
            print_help();
            Ok(())
        }
    }
}

async fn print_activity(limit: usize, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(None, config_path)?;
    let data_dir = config
        .data_dir()
        .context("Could not determine data directory")?;
    let store: Arc<dyn Store> = Arc::new(FileStore::open(&data_dir).await?);

    let events = ActivityLog::new(store)
        .recent(limit)
        .await
        .context("Failed to read activity log")?;

    if events.is_empty() {
        println!("No activity recorded.");
    }
    for event in events {
        println!("{}", event);
    }
    Ok(())
}

fn print_version() {
    println!("scamwatch {}", env!("CARGO_PKG_VERSION"));
}

fn print_help() {
    println!("scamwatch - Suspected scam / cyber pitfall Telegram bot");
    println!();
    println!("Usage: scamwatch [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  run       Run the bot");
    println!("  activity  Print the stored activity trail");
    println!("  version   Display version information");
    println!("  help      Print this message or the help of the given subcommand(s)");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Enable verbose (DEBUG) logging");
    println!("  -V, --version  Print version");
    println!("  -h, --help     Print help");
}
