//! In-memory store backend
//!
//! `StoreState` holds every collection and implements the store operations
//! synchronously; `MemoryStore` guards it with a mutex and `FileStore`
//! snapshots it to disk.

use super::{ExpireCondition, Store, StoreError, StoreResult};
use crate::audit::ActivityEvent;
use crate::auth::Credential;
use crate::history::{CappedInsert, Interaction, NewInteraction};
use crate::session::{EndReason, Identity, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    credentials: HashMap<String, Credential>,
    /// Every session ever started, in start order
    #[serde(default)]
    sessions: Vec<Session>,
    /// Not snapshotted; `FileStore` keeps activity in its own file
    #[serde(skip)]
    activity: Vec<ActivityEvent>,
    /// Per-user interactions, ascending `seq`
    #[serde(default)]
    interactions: HashMap<String, VecDeque<Interaction>>,
    #[serde(default)]
    next_seq: u64,
    /// identity -> index into `sessions` of its ACTIVE record
    #[serde(skip)]
    active: HashMap<Identity, usize>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the active-session index after deserialization.
    pub(crate) fn rebuild_index(&mut self) {
        self.active = self
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_active())
            .map(|(i, s)| (s.identity.clone(), i))
            .collect();
    }

    pub(crate) fn insert_credential(&mut self, credential: Credential) -> StoreResult<()> {
        if self.credentials.contains_key(&credential.username) {
            return Err(StoreError::conflict(format!(
                "username '{}' already exists",
                credential.username
            )));
        }
        self.credentials
            .insert(credential.username.clone(), credential);
        Ok(())
    }

    pub(crate) fn find_credential(&self, username: &str) -> Option<Credential> {
        self.credentials.get(username).cloned()
    }

    pub(crate) fn insert_session(&mut self, session: Session) -> StoreResult<()> {
        if !session.is_active() {
            return Err(StoreError::conflict("only active sessions can be inserted"));
        }
        if self.active.contains_key(&session.identity) {
            return Err(StoreError::conflict(format!(
                "identity '{}' already has an active session",
                session.identity
            )));
        }
        self.active
            .insert(session.identity.clone(), self.sessions.len());
        self.sessions.push(session);
        Ok(())
    }

    pub(crate) fn find_active_session(&self, identity: &Identity) -> Option<Session> {
        self.active
            .get(identity)
            .and_then(|&i| self.sessions.get(i))
            .cloned()
    }

    pub(crate) fn find_active_sessions_for_user(&self, username: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .active
            .values()
            .filter_map(|&i| self.sessions.get(i))
            .filter(|s| s.username == username)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub(crate) fn list_active_sessions(&self) -> Vec<Session> {
        let mut indices: Vec<usize> = self.active.values().copied().collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .filter_map(|i| self.sessions.get(i))
            .cloned()
            .collect()
    }

    pub(crate) fn session_history(&self, identity: &Identity) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|s| &s.identity == identity)
            .cloned()
            .collect()
    }

    pub(crate) fn touch_session(&mut self, identity: &Identity, at: DateTime<Utc>) -> bool {
        match self.active.get(identity).copied() {
            Some(i) => {
                if let Some(session) = self.sessions.get_mut(i) {
                    session.touch(at);
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn expire_session(
        &mut self,
        identity: &Identity,
        condition: ExpireCondition,
        reason: EndReason,
        at: DateTime<Utc>,
    ) -> Option<Session> {
        let i = *self.active.get(identity)?;
        let session = self.sessions.get_mut(i)?;
        if !condition.allows(session) {
            return None;
        }
        session.expire(at, reason);
        let expired = session.clone();
        self.active.remove(identity);
        Some(expired)
    }

    pub(crate) fn append_activity(&mut self, event: ActivityEvent) {
        self.activity.push(event);
    }

    pub(crate) fn recent_activity(&self, limit: usize) -> Vec<ActivityEvent> {
        let skip = self.activity.len().saturating_sub(limit);
        self.activity[skip..].to_vec()
    }

    pub(crate) fn insert_interaction(
        &mut self,
        interaction: NewInteraction,
        cap: NonZeroUsize,
    ) -> CappedInsert {
        self.next_seq += 1;
        let record = interaction.into_interaction(self.next_seq);
        let records = self.interactions.entry(record.username.clone()).or_default();

        let mut evicted = Vec::new();
        while records.len() >= cap.get() {
            match records.pop_front() {
                Some(oldest) => evicted.push(oldest),
                None => break,
            }
        }
        records.push_back(record.clone());
        CappedInsert { record, evicted }
    }

    pub(crate) fn count_interactions(&self, username: &str) -> usize {
        self.interactions.get(username).map_or(0, VecDeque::len)
    }

    pub(crate) fn recent_interactions(&self, username: &str, limit: usize) -> Vec<Interaction> {
        match self.interactions.get(username) {
            Some(records) => {
                let skip = records.len().saturating_sub(limit);
                records.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

/// Thread-safe in-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|e| StoreError::unavailable(format!("Lock poisoned: {}", e)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_credential(&self, credential: Credential) -> StoreResult<()> {
        self.state()?.insert_credential(credential)
    }

    async fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>> {
        Ok(self.state()?.find_credential(username))
    }

    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        self.state()?.insert_session(session)
    }

    async fn find_active_session(&self, identity: &Identity) -> StoreResult<Option<Session>> {
        Ok(self.state()?.find_active_session(identity))
    }

    async fn find_active_sessions_for_user(&self, username: &str) -> StoreResult<Vec<Session>> {
        Ok(self.state()?.find_active_sessions_for_user(username))
    }

    async fn list_active_sessions(&self) -> StoreResult<Vec<Session>> {
        Ok(self.state()?.list_active_sessions())
    }

    async fn session_history(&self, identity: &Identity) -> StoreResult<Vec<Session>> {
        Ok(self.state()?.session_history(identity))
    }

    async fn touch_session(&self, identity: &Identity, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.state()?.touch_session(identity, at))
    }

    async fn expire_session(
        &self,
        identity: &Identity,
        condition: ExpireCondition,
        reason: EndReason,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        Ok(self
            .state()?
            .expire_session(identity, condition, reason, at))
    }

    async fn append_activity(&self, event: ActivityEvent) -> StoreResult<()> {
        self.state()?.append_activity(event);
        Ok(())
    }

    async fn recent_activity(&self, limit: usize) -> StoreResult<Vec<ActivityEvent>> {
        Ok(self.state()?.recent_activity(limit))
    }

    async fn insert_interaction(
        &self,
        interaction: NewInteraction,
        cap: NonZeroUsize,
    ) -> StoreResult<CappedInsert> {
        Ok(self.state()?.insert_interaction(interaction, cap))
    }

    async fn count_interactions(&self, username: &str) -> StoreResult<usize> {
        Ok(self.state()?.count_interactions(username))
    }

    async fn recent_interactions(
        &self,
        username: &str,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>> {
        Ok(self.state()?.recent_interactions(username, limit))
    }
}
