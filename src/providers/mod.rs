//! Completion service providers
//!
//! The bot relays free text to an external chat-completions service through
//! the [`CompletionProvider`] trait. `AzureChatProvider` talks to an
//! Azure-style deployment endpoint (as exposed by the HKBU ChatGPT gateway).
//!
//! # Example
//!
//! ```rust
//! use scamwatch::providers::CompletionProvider;
//!
//! async fn example(provider: &dyn CompletionProvider) {
//!     let reply = provider.complete("Is +852 5555 0000 a known scam number?").await;
//!     println!("{:?}", reply);
//! }
//! ```

use async_trait::async_trait;

pub mod azure;
pub mod error;
#[cfg(test)]
pub mod mock;

pub use azure::AzureChatProvider;
pub use error::ProviderError;

/// Single-turn text completion
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Sends `prompt` as one user message and returns the assistant's reply.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Short name used in logs
    fn provider_name(&self) -> &'static str;
}
