//! Centralized error types and conversions for scamwatch
//!
//! Library code returns `ScamWatchError`; the gateway and CLI glue wrap it in
//! `anyhow` for context.

use crate::storage::StoreError;
use thiserror::Error;

/// Global error type for scamwatch operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScamWatchError {
    /// Registration conflict, user can pick another name
    #[error("Username already exists: {username}")]
    DuplicateUsername { username: String },

    /// Login failure. Deliberately does not say whether the user exists.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The identity already holds an active session
    #[error("Already logged in as {username}")]
    AlreadyLoggedIn { username: String },

    /// No active session for the identity
    #[error("Not logged in")]
    NotLoggedIn,

    /// The account was created but its first session could not be started
    #[error("Registered {username} but could not start a session: {message}")]
    RegisteredNotLoggedIn { username: String, message: String },

    /// The persistent store failed or is unreachable
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Invalid user input
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// External service errors (Telegram, completion service)
    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    /// Runtime failure inside the process, such as password hashing
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ScamWatchError {
    /// Create a duplicate username error
    pub fn duplicate_username(username: impl Into<String>) -> Self {
        Self::DuplicateUsername {
            username: username.into(),
        }
    }

    /// Create an already-logged-in error
    pub fn already_logged_in(username: impl Into<String>) -> Self {
        Self::AlreadyLoggedIn {
            username: username.into(),
        }
    }

    pub fn registered_not_logged_in(
        username: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RegisteredNotLoggedIn {
            username: username.into(),
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an external service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error is recoverable (system can continue)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ScamWatchError::DuplicateUsername { .. } => true,
            ScamWatchError::InvalidCredentials => true,
            ScamWatchError::AlreadyLoggedIn { .. } => true,
            ScamWatchError::NotLoggedIn => true,
            ScamWatchError::InvalidInput { .. } => true,
            // Store outages are transient from the bot's point of view
            ScamWatchError::StoreUnavailable { .. } => true,
            ScamWatchError::ExternalService { .. } => true,
            ScamWatchError::RegisteredNotLoggedIn { .. } => true,
            ScamWatchError::Internal { .. } => true,
            // Config errors are fatal on startup
            ScamWatchError::Config { .. } => false,
        }
    }

    /// Returns the error severity level for logging
    pub fn severity(&self) -> tracing::Level {
        match self {
            ScamWatchError::Config { .. } => tracing::Level::ERROR,
            ScamWatchError::StoreUnavailable { .. }
            | ScamWatchError::RegisteredNotLoggedIn { .. }
            | ScamWatchError::Internal { .. } => tracing::Level::ERROR,
            ScamWatchError::ExternalService { .. } => tracing::Level::WARN,
            ScamWatchError::InvalidCredentials => tracing::Level::INFO,
            ScamWatchError::DuplicateUsername { .. }
            | ScamWatchError::AlreadyLoggedIn { .. }
            | ScamWatchError::NotLoggedIn
            | ScamWatchError::InvalidInput { .. } => tracing::Level::DEBUG,
        }
    }

    /// Text shown to the chat user for this error.
    ///
    /// Store and service failures collapse into one generic message so
    /// internals never reach the chat.
    pub fn user_message(&self) -> String {
        match self {
            ScamWatchError::DuplicateUsername { .. } => {
                "Username already exists. Please choose a different one.".to_string()
            }
            ScamWatchError::InvalidCredentials => {
                "Invalid username or password. Please try again.".to_string()
            }
            ScamWatchError::AlreadyLoggedIn { .. } => {
                "You are already logged in. Please /logout first.".to_string()
            }
            ScamWatchError::NotLoggedIn => {
                "You are not logged in. Please log in first using /login.".to_string()
            }
            ScamWatchError::RegisteredNotLoggedIn { .. } => {
                "Registration successful, but we could not log you in. Please /login.".to_string()
            }
            ScamWatchError::InvalidInput { message } => message.clone(),
            ScamWatchError::StoreUnavailable { .. }
            | ScamWatchError::Internal { .. }
            | ScamWatchError::Config { .. }
            | ScamWatchError::ExternalService { .. } => {
                "Sorry, something went wrong on our side. Please try again later.".to_string()
            }
        }
    }
}

/// Result type alias using ScamWatchError
pub type Result<T> = std::result::Result<T, ScamWatchError>;

impl From<StoreError> for ScamWatchError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable {
            message: err.to_string(),
        }
    }
}
