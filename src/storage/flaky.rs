//! Store wrapper with switchable failures, for tests

use super::{ExpireCondition, MemoryStore, Store, StoreError, StoreResult};
use crate::audit::ActivityEvent;
use crate::auth::Credential;
use crate::history::{CappedInsert, Interaction, NewInteraction};
use crate::session::{EndReason, Identity, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_touch: AtomicBool,
    fail_sessions: AtomicBool,
    fail_interactions: AtomicBool,
    fail_expire_for: Mutex<HashSet<Identity>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_touch(&self, fail: bool) {
        self.fail_touch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_interactions(&self, fail: bool) {
        self.fail_interactions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_expire_for(&self, identity: &Identity) {
        if let Ok(mut set) = self.fail_expire_for.lock() {
            set.insert(identity.clone());
        }
    }

    fn check(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn insert_credential(&self, credential: Credential) -> StoreResult<()> {
        self.inner.insert_credential(credential).await
    }

    async fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>> {
        Self::check(&self.fail_reads)?;
        self.inner.find_credential(username).await
    }

    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        Self::check(&self.fail_sessions)?;
        self.inner.insert_session(session).await
    }

    async fn find_active_session(&self, identity: &Identity) -> StoreResult<Option<Session>> {
        Self::check(&self.fail_reads)?;
        self.inner.find_active_session(identity).await
    }

    async fn find_active_sessions_for_user(&self, username: &str) -> StoreResult<Vec<Session>> {
        Self::check(&self.fail_reads)?;
        self.inner.find_active_sessions_for_user(username).await
    }

    async fn list_active_sessions(&self) -> StoreResult<Vec<Session>> {
        Self::check(&self.fail_reads)?;
        self.inner.list_active_sessions().await
    }

    async fn session_history(&self, identity: &Identity) -> StoreResult<Vec<Session>> {
        self.inner.session_history(identity).await
    }

    async fn touch_session(&self, identity: &Identity, at: DateTime<Utc>) -> StoreResult<bool> {
        Self::check(&self.fail_touch)?;
        self.inner.touch_session(identity, at).await
    }

    async fn expire_session(
        &self,
        identity: &Identity,
        condition: ExpireCondition,
        reason: EndReason,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let fail = self
            .fail_expire_for
            .lock()
            .map(|set| set.contains(identity))
            .unwrap_or(false);
        if fail {
            return Err(StoreError::unavailable("injected failure"));
        }
        self.inner
            .expire_session(identity, condition, reason, at)
            .await
    }

    async fn append_activity(&self, event: ActivityEvent) -> StoreResult<()> {
        self.inner.append_activity(event).await
    }

    async fn recent_activity(&self, limit: usize) -> StoreResult<Vec<ActivityEvent>> {
        self.inner.recent_activity(limit).await
    }

    async fn insert_interaction(
        &self,
        interaction: NewInteraction,
        cap: NonZeroUsize,
    ) -> StoreResult<CappedInsert> {
        Self::check(&self.fail_interactions)?;
        self.inner.insert_interaction(interaction, cap).await
    }

    async fn count_interactions(&self, username: &str) -> StoreResult<usize> {
        self.inner.count_interactions(username).await
    }

    async fn recent_interactions(
        &self,
        username: &str,
        limit: usize,
    ) -> StoreResult<Vec<Interaction>> {
        self.inner.recent_interactions(username, limit).await
    }
}
