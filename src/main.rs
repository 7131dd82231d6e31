use clap::Parser;
use scamwatch::audit::AUDIT_TARGET;
use scamwatch::cli;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Logs go to stderr so command output on stdout stays clean. Activity
/// events are also appended to `activity_log` when one is configured.
fn init_logging(verbose: bool, activity_log: Option<&Path>) {
    let filter_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(fmt::time::time())
        .with_filter(EnvFilter::from_default_env().add_directive(filter_level.into()));

    let audit_file = activity_log.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("warning: cannot open activity log {:?}: {}", path, e);
                None
            }
        }
    });
    let audit = audit_file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(Targets::new().with_target(AUDIT_TARGET, Level::INFO))
    });

    tracing_subscriber::registry()
        .with(console)
        .with(audit)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let code = match e.kind() {
                ErrorKind::DisplayVersion | ErrorKind::DisplayHelp => 0,
                ErrorKind::InvalidSubcommand => 1,
                _ => 2,
            };
            e.print().ok();
            std::process::exit(code);
        }
    };

    let activity_log = cli::activity_log_path(&cli);
    init_logging(cli.verbose, activity_log.as_deref());

    tracing::debug!("Verbose mode enabled");

    if let Err(e) = cli::run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
