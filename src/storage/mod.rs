//! Persistent store abstraction
//!
//! Credentials, sessions, activity events and interactions all go through the
//! [`Store`] trait. Every method is atomic on its own: the conditional ones
//! (`insert_credential`, `insert_session`, `expire_session`) check and write
//! in one step so callers never race between the check and the update.

use crate::audit::ActivityEvent;
use crate::auth::Credential;
use crate::history::{CappedInsert, Interaction, NewInteraction};
use crate::session::{EndReason, Identity, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::num::NonZeroUsize;
use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backend could not be read or written
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Condition checked atomically by [`Store::expire_session`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpireCondition {
    /// Expire whatever session is active
    Always,
    /// Expire only if `last_activity` is strictly older than the cutoff
    IdleBefore(DateTime<Utc>),
}

impl ExpireCondition {
    pub fn allows(&self, session: &Session) -> bool {
        match self {
            ExpireCondition::Always => true,
            ExpireCondition::IdleBefore(cutoff) => session.last_activity < *cutoff,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a credential; `Conflict` if the username is taken.
    async fn insert_credential(&self, credential: Credential) -> StoreResult<()>;

    async fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>>;

    /// Inserts an ACTIVE session; `Conflict` if the identity already has one.
    async fn insert_session(&self, session: Session) -> StoreResult<()>;

    async fn find_active_session(&self, identity: &Identity) -> StoreResult<Option<Session>>;

    async fn find_active_sessions_for_user(&self, username: &str) -> StoreResult<Vec<Session>>;

    async fn list_active_sessions(&self) -> StoreResult<Vec<Session>>;

    /// Full session history for an identity, oldest first
    async fn session_history(&self, identity: &Identity) -> StoreResult<Vec<Session>>;

    /// Moves `last_activity` of the active session forward to `at`.
    /// Returns false if the identity has no active session.
    async fn touch_session(&self, identity: &Identity, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Transitions the active session to EXPIRED if `condition` holds at the
    /// moment of the update. Returns the expired session, or `None` if there
    /// was no active session or the condition failed.
    async fn expire_session(
        &self,
        identity: &Identity,
        condition: ExpireCondition,
        reason: EndReason,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Session>>;

    async fn append_activity(&self, event: ActivityEvent) -> StoreResult<()>;

    /// Most recent `limit` activity events, oldest first
    async fn recent_activity(&self, limit: usize) -> StoreResult<Vec<ActivityEvent>>;

    /// Appends an interaction and evicts the user's lowest-sequence records
    /// until at most `cap` remain, as one atomic step. On error nothing is
    /// inserted or evicted.
    async fn insert_interaction(
        &self,
        interaction: NewInteraction,
        cap: NonZeroUsize,
    ) -> StoreResult<CappedInsert>;

    async fn count_interactions(&self, username: &str) -> StoreResult<usize>;

    /// Most recent `limit` interactions for the user, oldest first
    async fn recent_interactions(&self, username: &str, limit: usize)
    -> StoreResult<Vec<Interaction>>;
}

#[cfg(test)]
pub(crate) mod flaky;
