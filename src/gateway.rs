//! Bot process wiring
//!
//! Opens the store, builds the session, history and dispatch components,
//! starts the inactivity sweeper and the Telegram channel, then runs the
//! ChatHub until SIGTERM/SIGINT.

use crate::auth::{CredentialStore, PasswordHasher};
use crate::bot::CommandDispatcher;
use crate::channels::{Channel, TelegramChannel};
use crate::chat::ChatHub;
use crate::config::Config;
use crate::history::InteractionLog;
use crate::providers::CompletionProvider;
use crate::providers::azure::AzureChatProvider;
use crate::session::{EndReason, InactivitySweeper, SessionPolicy, SessionRegistry};
use crate::storage::{FileStore, Store};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The long-lived components shared by the gateway's tasks
pub struct BotServices {
    pub registry: Arc<SessionRegistry>,
    pub history: Arc<InteractionLog>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub sweeper: InactivitySweeper,
}

impl BotServices {
    pub fn build(
        config: &Config,
        store: Arc<dyn Store>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let credentials = Arc::new(CredentialStore::new(
            Arc::clone(&store),
            PasswordHasher::new(),
        ));
        let registry = Arc::new(
            SessionRegistry::new(Arc::clone(&store), credentials).with_policy(SessionPolicy {
                single_session_per_user: config.session.single_session_per_user,
            }),
        );
        let history = Arc::new(InteractionLog::new(store, config.history_cap()));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&history),
            provider,
        ));
        let sweeper = InactivitySweeper::new(
            Arc::clone(&registry),
            config.session.inactivity_timeout(),
            config.session.sweep_interval(),
        );

        Self {
            registry,
            history,
            dispatcher,
            sweeper,
        }
    }

    /// Ends every session left over from a previous run when configured to.
    pub async fn logout_on_restart(&self, config: &Config) -> Result<usize> {
        if !config.session.logout_on_restart {
            return Ok(0);
        }
        let ended = self
            .registry
            .logout_all(EndReason::Restart)
            .await
            .context("Failed to end sessions from the previous run")?;
        if ended > 0 {
            info!(sessions = ended, "Logged out sessions from the previous run");
        }
        Ok(ended)
    }
}

/// Runs the bot until a shutdown signal arrives.
pub async fn run_gateway(config: &Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting scamwatch gateway"
    );

    let data_dir = config
        .data_dir()
        .context("Could not determine data directory")?;
    let file_store = Arc::new(
        FileStore::open(&data_dir)
            .await
            .with_context(|| format!("Failed to open store in {:?}", data_dir))?,
    );
    let store: Arc<dyn Store> = file_store.clone();

    let provider: Arc<dyn CompletionProvider> = Arc::new(
        AzureChatProvider::from_config(&config.completion).context(
            "No completion service available. Set SCAMWATCH_COMPLETION_TOKEN or add completion.access_token to ~/.scamwatch/config.json",
        )?,
    );
    info!(model = %config.completion.model_name, "Completion provider initialized");

    let services = BotServices::build(config, store, provider);
    services.logout_on_restart(config).await?;

    let (sweeper_handle, sweeper_shutdown) = services.sweeper.start();
    info!(
        timeout_secs = config.session.inactivity_timeout_secs,
        interval_secs = config.session.sweep_interval_secs,
        "Inactivity sweeper started"
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    let mut chat_hub = ChatHub::new();
    let (dispatch_tx, dispatch_rx) = tokio::sync::mpsc::channel(100);
    chat_hub.register_dispatch_sender(dispatch_tx);
    let chat_hub = Arc::new(chat_hub);

    let dispatcher_handle = Arc::clone(&services.dispatcher).start(Arc::clone(&chat_hub), dispatch_rx);

    let telegram_channel = start_telegram(config, &chat_hub).await;

    info!("Gateway is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received, starting graceful shutdown...");
        }
        result = chat_hub.run() => {
            if let Err(e) = result {
                error!("ChatHub error: {}", e);
            }
        }
    }

    if let Some(channel) = telegram_channel {
        info!("Shutting down Telegram channel...");
        if let Err(e) = channel.shutdown().await {
            error!("Error shutting down Telegram channel: {}", e);
        }
    }

    let _ = sweeper_shutdown.send(()).await;
    await_task("Sweeper", sweeper_handle).await;

    dispatcher_handle.abort();

    info!("Shutting down ChatHub...");
    if let Err(e) = chat_hub.shutdown().await {
        error!("Error during ChatHub shutdown: {}", e);
    }

    // Persist session touches that have not been snapshotted yet
    if let Err(e) = file_store.flush().await {
        error!("Failed to flush store: {:#}", e);
    }

    info!("Gateway stopped gracefully");
    Ok(())
}

async fn start_telegram(config: &Config, hub: &Arc<ChatHub>) -> Option<TelegramChannel> {
    let Some(token) = &config.telegram_token else {
        warn!(
            "No Telegram token configured. Set TELEGRAM_BOT_TOKEN or add telegram_token to config.json."
        );
        return None;
    };

    let channel = match TelegramChannel::new(token.clone()) {
        Ok(channel) => channel,
        Err(e) => {
            error!("Invalid Telegram token: {}. Gateway will continue without Telegram.", e);
            return None;
        }
    };

    match channel.start(Arc::clone(hub)).await {
        Ok(()) => {
            info!("Telegram channel initialized successfully");
            Some(channel)
        }
        Err(e) => {
            error!("Failed to start Telegram channel: {:#}. Gateway will continue without Telegram.", e);
            None
        }
    }
}

async fn await_task(name: &str, handle: JoinHandle<()>) {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
        Ok(Ok(())) => info!("{} task completed gracefully", name),
        Ok(Err(e)) => error!("{} task panicked: {}", name, e),
        Err(_) => error!(
            "{} task did not complete within {}s timeout",
            name,
            SHUTDOWN_TIMEOUT.as_secs()
        ),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler the process runs until killed
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C");
}
