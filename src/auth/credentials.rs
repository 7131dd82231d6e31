use crate::auth::password::PasswordHasher;
use crate::storage::{Store, StoreError};
use crate::utils::{Result, ScamWatchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const MAX_USERNAME_LENGTH: usize = 64;

/// Verified against when the username is unknown, so a miss costs the same
/// as a wrong password.
const DUMMY_PASSWORD: &str = "scamwatch-timing-equalizer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Username -> password hash records with unique usernames
pub struct CredentialStore {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    dummy_hash: OnceCell<String>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn Store>, hasher: PasswordHasher) -> Self {
        Self {
            store,
            hasher,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Registers a new user. Fails with `DuplicateUsername` if the name is
    /// taken, including when two registrations race for it.
    pub async fn register(&self, username: &str, password: &str) -> Result<Credential> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(ScamWatchError::invalid_input("Password must not be empty."));
        }

        // Cheap early exit; the insert below is what enforces uniqueness
        if self.store.find_credential(username).await?.is_some() {
            return Err(ScamWatchError::duplicate_username(username));
        }

        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;
        let credential = Credential {
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        };

        match self.store.insert_credential(credential.clone()).await {
            Ok(()) => {
                info!(username = %username, "Registered new credential");
                Ok(credential)
            }
            Err(StoreError::Conflict(_)) => Err(ScamWatchError::duplicate_username(username)),
            Err(e) => Err(e.into()),
        }
    }

    /// True iff the user exists and the password matches. Unknown user and
    /// wrong password are indistinguishable to the caller.
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool> {
        match self.store.find_credential(username).await? {
            Some(credential) => Ok(self
                .hasher
                .verify_blocking(password.to_string(), credential.password_hash)
                .await),
            None => {
                debug!("Credential lookup missed");
                let dummy = self.dummy_hash().await?;
                self.hasher
                    .verify_blocking(password.to_string(), dummy)
                    .await;
                Ok(false)
            }
        }
    }

    async fn dummy_hash(&self) -> Result<String> {
        self.dummy_hash
            .get_or_try_init(|| self.hasher.hash_blocking(DUMMY_PASSWORD.to_string()))
            .await
            .cloned()
    }
}

/// Usernames are 1 to 64 characters without whitespace.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(ScamWatchError::invalid_input("Username must not be empty."));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ScamWatchError::invalid_input(format!(
            "Username must be at most {} characters.",
            MAX_USERNAME_LENGTH
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ScamWatchError::invalid_input(
            "Username must not contain spaces.",
        ));
    }
    Ok(())
}
