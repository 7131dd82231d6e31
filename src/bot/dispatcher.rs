use crate::bot::gate::{GateOutcome, LoginGate};
use crate::bot::replies;
use crate::chat::{ChatHub, Command, InboundMessage};
use crate::history::InteractionLog;
use crate::providers::CompletionProvider;
use crate::session::{Identity, Session, SessionRegistry};
use crate::utils::{Result, ScamWatchError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};

/// Turns inbound chat messages into replies.
///
/// Login, registration and help run for anyone; everything else goes
/// through the [`LoginGate`].
pub struct CommandDispatcher {
    registry: Arc<SessionRegistry>,
    gate: LoginGate,
    history: Arc<InteractionLog>,
    provider: Arc<dyn CompletionProvider>,
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        history: Arc<InteractionLog>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            gate: LoginGate::new(registry.clone()),
            registry,
            history,
            provider,
        }
    }

    /// Produces the reply text for one message. Never fails; errors become
    /// user-facing text.
    pub async fn handle(&self, message: &InboundMessage) -> String {
        let identity = &message.identity;
        let command = Command::parse(&message.content);
        debug!(identity = %identity, command = ?command, "Dispatching command");

        if command.requires_login() {
            return self.handle_gated(identity, command).await;
        }

        match command {
            Command::Start | Command::Help => replies::help(),
            Command::Usage(usage) => usage.to_string(),
            Command::Unknown(name) => replies::unknown_command(&name),
            Command::Register { username, password } => {
                self.register(identity, &username, &password).await
            }
            Command::Login { username, password } => {
                self.login(identity, &username, &password).await
            }
            other => {
                warn!(command = ?other, "Open command without a handler");
                replies::help()
            }
        }
    }

    async fn register(&self, identity: &Identity, username: &str, password: &str) -> String {
        match self
            .registry
            .register_and_start(identity, username, password)
            .await
        {
            Ok(_) => replies::REGISTER_SUCCESS.to_string(),
            Err(ScamWatchError::AlreadyLoggedIn { .. }) => {
                replies::REGISTER_ALREADY_LOGGED_IN.to_string()
            }
            Err(e) => {
                log_error(&e, identity, "register");
                e.user_message()
            }
        }
    }

    async fn login(&self, identity: &Identity, username: &str, password: &str) -> String {
        match self
            .registry
            .authenticate_and_start(identity, username, password)
            .await
        {
            Ok(session) => replies::login_success(&session.username),
            Err(ScamWatchError::AlreadyLoggedIn { .. }) => {
                replies::LOGIN_ALREADY_LOGGED_IN.to_string()
            }
            Err(e) => {
                log_error(&e, identity, "login");
                e.user_message()
            }
        }
    }

    async fn handle_gated(&self, identity: &Identity, command: Command) -> String {
        let name = command.name();
        let outcome = self
            .gate
            .run(identity, |session| self.run_gated(identity, session, command))
            .await;

        match outcome {
            Ok(GateOutcome::Allowed(reply)) => reply,
            Ok(GateOutcome::Denied) => replies::NOT_LOGGED_IN.to_string(),
            Err(e) => {
                log_error(&e, identity, name);
                e.user_message()
            }
        }
    }

    async fn run_gated(&self, identity: &Identity, session: Session, command: Command) -> String {
        match command {
            Command::Logout => match self.registry.end_session(identity).await {
                Ok(true) => replies::LOGOUT_SUCCESS.to_string(),
                Ok(false) => replies::LOGOUT_NOT_LOGGED_IN.to_string(),
                Err(e) => {
                    log_error(&e, identity, "logout");
                    e.user_message()
                }
            },
            Command::History { limit } => {
                let limit = limit.unwrap_or(self.history.cap());
                match self.history.recent(&session.username, limit).await {
                    Ok(items) => replies::history(&items),
                    Err(e) => {
                        log_error(&e, identity, "history");
                        e.user_message()
                    }
                }
            }
            Command::Search => replies::search(),
            Command::Tips => replies::tips(),
            Command::Chat(text) => match self.chat(identity, &session, &text).await {
                Ok(reply) => reply,
                Err(e) => {
                    log_error(&e, identity, "chat");
                    replies::COMPLETION_FAILED.to_string()
                }
            },
            other => {
                warn!(command = ?other, "Command reached the gate without a gated handler");
                replies::help()
            }
        }
    }

    async fn chat(&self, identity: &Identity, session: &Session, text: &str) -> Result<String> {
        let reply = self.provider.complete(text).await.map_err(|e| {
            ScamWatchError::external_service(self.provider.provider_name(), e.to_string())
        })?;

        // The user still gets the answer if it can not be saved
        if let Err(e) = self
            .history
            .record(&session.username, identity, text, &reply)
            .await
        {
            log_error(&e, identity, "record interaction");
        }

        Ok(reply)
    }

    /// Consumes inbound messages, handling each on its own task and sending
    /// the reply back through the hub.
    pub fn start(
        self: Arc<Self>,
        hub: Arc<ChatHub>,
        mut inbound_rx: mpsc::Receiver<InboundMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Command dispatcher started");
            while let Some(message) = inbound_rx.recv().await {
                let dispatcher = self.clone();
                let hub = hub.clone();
                tokio::spawn(async move {
                    let reply = dispatcher.handle(&message).await;
                    if let Err(e) = hub
                        .reply(&message.channel, message.identity.clone(), reply)
                        .await
                    {
                        error!(
                            channel = %message.channel,
                            identity = %message.identity,
                            error = %e,
                            "Failed to send reply"
                        );
                    }
                });
            }
            info!("Inbound channel closed, command dispatcher stopped");
        })
    }
}

fn log_error(err: &ScamWatchError, identity: &Identity, operation: &str) {
    let level = err.severity();
    if level == Level::ERROR {
        error!(identity = %identity, operation, error = %err, "Command failed");
    } else if level == Level::WARN {
        warn!(identity = %identity, operation, error = %err, "Command failed");
    } else if level == Level::INFO {
        info!(identity = %identity, operation, error = %err, "Command failed");
    } else {
        debug!(identity = %identity, operation, error = %err, "Command failed");
    }
}
