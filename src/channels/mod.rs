use crate::chat::{ChatHub, OutboundMessage};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramError};

/// A transport the bot talks through.
///
/// `start` registers the channel's outbound sender with the hub, spawns its
/// receive loop and returns without blocking.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn start(&self, hub: Arc<ChatHub>) -> Result<()>;

    /// Delivers one reply directly, bypassing the hub
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Stops receiving. Pending replies may still be delivered.
    async fn shutdown(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct LoopbackChannel {
        sender: mpsc::Sender<OutboundMessage>,
    }

    #[async_trait]
    impl Channel for LoopbackChannel {
        async fn start(&self, hub: Arc<ChatHub>) -> Result<()> {
            hub.register_channel("loopback", self.sender.clone()).await?;
            Ok(())
        }

        async fn send(&self, message: OutboundMessage) -> Result<()> {
            self.sender.send(message).await?;
            Ok(())
        }

        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_channel_receives_routed_reply() {
        let (tx, mut rx) = mpsc::channel(10);
        let channel = LoopbackChannel { sender: tx };
        let hub = Arc::new(ChatHub::new());
        channel.start(hub.clone()).await.unwrap();

        hub.route_outbound(OutboundMessage::new("loopback", "123", "Stay safe"))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.content, "Stay safe");

        assert!(
            hub.route_outbound(OutboundMessage::new("nowhere", "123", "x"))
                .await
                .is_err()
        );
    }
}
