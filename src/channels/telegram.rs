use crate::channels::Channel;
use crate::chat::{ChatHub, InboundMessage, OutboundMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Update};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::sync::mpsc;

pub const TELEGRAM_CHANNEL_NAME: &str = "telegram";
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error(
        "Invalid token format: {0}. Check @BotFather (https://t.me/BotFather) for a valid token."
    )]
    InvalidTokenFormat(String),

    #[error("Telegram API error: {0}")]
    ApiError(String),

    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),
}

/// Telegram transport over the Bot API (long polling via teloxide).
///
/// Every chat is served; access control happens in the bot's login gate.
/// The chat id is the caller identity.
pub struct TelegramChannel {
    bot: Bot,
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl TelegramChannel {
    /// Validates the token format and creates the bot client.
    /// Expected: "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
    pub fn new(token: String) -> Result<Self> {
        if !is_valid_token_format(&token) {
            return Err(TelegramError::InvalidTokenFormat(
                "Token must be in format: digits:alphanumeric (e.g., 123456789:ABC...)".to_string(),
            )
            .into());
        }

        Ok(Self {
            bot: Bot::new(token),
            shutdown_tx: Arc::new(RwLock::new(None)),
        })
    }

    /// Converts a Telegram message; None for updates without text.
    fn process_inbound_message(msg: &Message) -> Option<InboundMessage> {
        let content = msg.text()?;
        let chat_id = msg.chat.id.0.to_string();

        let mut inbound = InboundMessage::new(TELEGRAM_CHANNEL_NAME, chat_id, content);
        if let Some(user) = &msg.from {
            inbound = inbound.with_metadata("user_id", serde_json::json!(user.id.0));
            if let Some(username) = &user.username {
                inbound = inbound.with_metadata("telegram_username", serde_json::json!(username));
            }
        }
        inbound = inbound.with_metadata("message_id", serde_json::json!(msg.id.0));

        Some(inbound)
    }

    async fn send_message(bot: &Bot, message: OutboundMessage) -> Result<()> {
        let content = truncate_for_telegram(&message.content);
        if content.len() != message.content.len() {
            tracing::warn!(
                identity = %message.identity,
                original_length = message.content.chars().count(),
                "Outbound message too long, truncating to {} characters",
                TELEGRAM_MAX_MESSAGE_LENGTH
            );
        }

        let chat_id: i64 = message
            .identity
            .as_str()
            .parse()
            .map_err(|_| TelegramError::InvalidChatId(message.identity.to_string()))
            .with_context(|| format!("Cannot reply to {}", message.identity))?;

        match bot.send_message(ChatId(chat_id), content).await {
            Ok(sent) => {
                tracing::debug!(
                    chat_id = chat_id,
                    message_id = sent.id.0,
                    "Sent message to Telegram"
                );
                Ok(())
            }
            Err(e) => {
                let error_msg = format!("Failed to send Telegram message to chat {}: {}", chat_id, e);
                tracing::error!("{}", error_msg);
                Err(TelegramError::ApiError(error_msg).into())
            }
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    async fn start(&self, hub: Arc<ChatHub>) -> Result<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(100);
        hub.register_channel(TELEGRAM_CHANNEL_NAME, outbound_tx)
            .await
            .context("Failed to register Telegram channel")?;

        let bot = self.bot.clone();
        let inbound_hub = hub.clone();

        tokio::spawn(async move {
            let handler = Update::filter_message().endpoint(move |msg: Message| {
                let hub = inbound_hub.clone();
                async move {
                    let Some(inbound) = Self::process_inbound_message(&msg) else {
                        tracing::debug!(chat_id = msg.chat.id.0, "Ignoring non-text message");
                        return Ok::<(), TelegramError>(());
                    };

                    tracing::info!(
                        chat_id = msg.chat.id.0,
                        length = inbound.content.chars().count(),
                        "Received Telegram message"
                    );

                    if let Err(e) = hub.send_inbound(inbound).await {
                        tracing::error!(error = %e, "Failed to queue inbound message");
                    }
                    Ok::<(), TelegramError>(())
                }
            });

            let mut dispatcher = Dispatcher::builder(bot, handler)
                .default_handler(|_upd| async move {
                    tracing::debug!("Ignoring non-message update");
                })
                .build();

            tokio::select! {
                _ = dispatcher.dispatch() => {
                    tracing::info!("Telegram dispatcher stopped");
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Telegram dispatcher received shutdown signal");
                }
            }
        });

        let bot_for_outbound = self.bot.clone();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = Self::send_message(&bot_for_outbound, message).await {
                    tracing::error!("Failed to send outbound message: {:#}", e);
                }
            }
            tracing::info!("Telegram outbound handler stopped");
        });

        tracing::info!("Telegram channel connected and listening for messages");
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        Self::send_message(&self.bot, message).await
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
            tracing::info!("Telegram channel shutdown signal sent");
        }
        Ok(())
    }
}

/// Cuts `content` to Telegram's message limit, counted in characters.
pub fn truncate_for_telegram(content: &str) -> String {
    match content.char_indices().nth(TELEGRAM_MAX_MESSAGE_LENGTH) {
        Some((idx, _)) => content[..idx].to_string(),
        None => content.to_string(),
    }
}

/// Checks the `digits:secret` shape of a bot token.
pub fn is_valid_token_format(token: &str) -> bool {
    let Some((bot_id, secret)) = token.split_once(':') else {
        return false;
    };

    !bot_id.is_empty()
        && bot_id.chars().all(|c| c.is_ascii_digit())
        && !secret.is_empty()
        && !secret.contains(':')
}
