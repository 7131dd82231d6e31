use crate::chat::types::{InboundMessage, OutboundMessage};
use crate::session::Identity;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Channel send failed: {0}")]
    SendError(String),
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

const BUFFER_SIZE: usize = 100;

/// In-process bus between transport channels and the command dispatcher.
///
/// Channels push inbound messages with [`ChatHub::send_inbound`]; `run`
/// forwards them to the dispatcher and routes replies back to the channel
/// they name.
pub struct ChatHub {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Arc<RwLock<mpsc::Receiver<InboundMessage>>>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Arc<RwLock<mpsc::Receiver<OutboundMessage>>>,
    channels: Arc<RwLock<HashMap<String, mpsc::Sender<OutboundMessage>>>>,
    dispatch_tx: Option<mpsc::Sender<InboundMessage>>,
}

impl ChatHub {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(BUFFER_SIZE);
        let (outbound_tx, outbound_rx) = mpsc::channel(BUFFER_SIZE);

        Self {
            inbound_tx,
            inbound_rx: Arc::new(RwLock::new(inbound_rx)),
            outbound_tx,
            outbound_rx: Arc::new(RwLock::new(outbound_rx)),
            channels: Arc::new(RwLock::new(HashMap::new())),
            dispatch_tx: None,
        }
    }

    /// Connects the dispatcher. Must be called before the hub is shared.
    pub fn register_dispatch_sender(&mut self, sender: mpsc::Sender<InboundMessage>) {
        self.dispatch_tx = Some(sender);
    }

    pub async fn register_channel(
        &self,
        name: impl Into<String>,
        sender: mpsc::Sender<OutboundMessage>,
    ) -> Result<()> {
        let mut channels = self.channels.write().await;
        channels.insert(name.into(), sender);
        Ok(())
    }

    pub async fn send_inbound(&self, mut message: InboundMessage) -> Result<()> {
        if !message.sanitize() {
            tracing::debug!(
                channel = %message.channel,
                identity = %message.identity,
                "Ignoring empty or whitespace-only message"
            );
            return Ok(());
        }

        match self.inbound_tx.try_send(message) {
            Ok(_) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!("Inbound buffer full, dropping oldest message");
                if let Ok(mut rx) = self.inbound_rx.try_write() {
                    let _ = rx.try_recv();
                }
                self.inbound_tx
                    .send(msg)
                    .await
                    .map_err(|e| ChatError::SendError(e.to_string()))
            }
            Err(e) => Err(ChatError::SendError(e.to_string())),
        }
    }

    pub async fn send_outbound(&self, message: OutboundMessage) -> Result<()> {
        match self.outbound_tx.try_send(message) {
            Ok(_) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!("Outbound buffer full, dropping oldest message");
                if let Ok(mut rx) = self.outbound_rx.try_write() {
                    let _ = rx.try_recv();
                }
                self.outbound_tx
                    .send(msg)
                    .await
                    .map_err(|e| ChatError::SendError(e.to_string()))
            }
            Err(e) => Err(ChatError::SendError(e.to_string())),
        }
    }

    /// Queues a reply to `identity` on `channel`.
    pub async fn reply(
        &self,
        channel: impl Into<String>,
        identity: impl Into<Identity>,
        content: impl Into<String>,
    ) -> Result<()> {
        let message = OutboundMessage::new(channel, identity, content);
        self.send_outbound(message).await
    }

    pub async fn route_outbound(&self, message: OutboundMessage) -> Result<()> {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(&message.channel) {
            sender
                .send(message)
                .await
                .map_err(|e| ChatError::SendError(e.to_string()))
        } else {
            Err(ChatError::ChannelNotFound(message.channel))
        }
    }

    /// Pumps both directions until the queues close. Callers stop it by
    /// dropping the future.
    pub async fn run(&self) -> Result<()> {
        loop {
            tokio::select! {
                Some(msg) = self.recv_inbound() => {
                    tracing::debug!(
                        channel = %msg.channel,
                        identity = %msg.identity,
                        "Received inbound message"
                    );
                    self.dispatch(msg).await;
                }
                Some(msg) = self.recv_outbound() => {
                    tracing::debug!(
                        channel = %msg.channel,
                        identity = %msg.identity,
                        "Routing outbound message"
                    );
                    if let Err(e) = self.route_outbound(msg).await {
                        tracing::error!(error = %e, "Failed to route outbound message");
                    }
                }
                else => break,
            }
        }
        Ok(())
    }

    /// Drops pending inbound messages and delivers pending replies.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Draining ChatHub channels...");

        let mut inbound_rx = self.inbound_rx.write().await;
        while let Ok(msg) = inbound_rx.try_recv() {
            tracing::debug!(
                channel = %msg.channel,
                identity = %msg.identity,
                "Dropped pending inbound message"
            );
        }

        let mut outbound_rx = self.outbound_rx.write().await;
        while let Ok(msg) = outbound_rx.try_recv() {
            let _ = self.route_outbound(msg).await;
        }

        tracing::info!("ChatHub shutdown complete");
        Ok(())
    }

    async fn dispatch(&self, msg: InboundMessage) {
        match &self.dispatch_tx {
            Some(tx) => {
                if let Err(e) = tx.send(msg).await {
                    tracing::error!(error = %e, "Dispatcher is gone, dropping message");
                }
            }
            None => tracing::warn!("No dispatcher registered, dropping message"),
        }
    }

    async fn recv_inbound(&self) -> Option<InboundMessage> {
        let mut rx = self.inbound_rx.write().await;
        rx.recv().await
    }

    async fn recv_outbound(&self) -> Option<OutboundMessage> {
        let mut rx = self.outbound_rx.write().await;
        rx.recv().await
    }
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}
