use crate::audit::{ActivityEvent, ActivityKind, ActivityLog, Actor};
use crate::auth::CredentialStore;
use crate::session::types::{EndReason, Identity, Session};
use crate::storage::{ExpireCondition, Store, StoreError};
use crate::utils::{KeyedLocks, Result, ScamWatchError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Uniqueness rules applied when a session starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Also refuse a login while the username is active under another identity
    pub single_session_per_user: bool,
}

/// Owns the session lifecycle: start, refresh, lookup and termination.
///
/// Check-then-act sequences on one identity are serialized by a per-identity
/// lock; the store's conditional insert and expire back that up. When both
/// locks are needed the identity lock is always taken first.
pub struct SessionRegistry {
    store: Arc<dyn Store>,
    credentials: Arc<CredentialStore>,
    activity: ActivityLog,
    policy: SessionPolicy,
    identity_locks: KeyedLocks,
    user_locks: KeyedLocks,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn Store>, credentials: Arc<CredentialStore>) -> Self {
        let activity = ActivityLog::new(Arc::clone(&store));
        Self {
            store,
            credentials,
            activity,
            policy: SessionPolicy::default(),
            identity_locks: KeyedLocks::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Starts a session for an already authenticated user.
    pub async fn start_session(&self, identity: &Identity, username: &str) -> Result<Session> {
        let _guard = self.identity_locks.lock(identity.as_str()).await;
        self.start_locked(identity, username).await
    }

    /// Verifies the password and starts a session in one step.
    ///
    /// An identity that is already logged in is rejected before the password
    /// is checked.
    pub async fn authenticate_and_start(
        &self,
        identity: &Identity,
        username: &str,
        password: &str,
    ) -> Result<Session> {
        let _guard = self.identity_locks.lock(identity.as_str()).await;
        self.ensure_logged_out(identity).await?;

        if !self.credentials.verify(username, password).await? {
            self.activity
                .log(
                    ActivityEvent::new(ActivityKind::LoginFailed, Actor::User, identity.clone())
                        .with_username(username),
                )
                .await;
            return Err(ScamWatchError::InvalidCredentials);
        }

        self.start_locked(identity, username).await
    }

    /// Registers a new user and logs the identity in as that user.
    ///
    /// If the account is stored but the session can not be started, the
    /// error is `RegisteredNotLoggedIn` so the caller can point the user at
    /// `/login` instead of a retry that would hit the duplicate name.
    pub async fn register_and_start(
        &self,
        identity: &Identity,
        username: &str,
        password: &str,
    ) -> Result<Session> {
        let _guard = self.identity_locks.lock(identity.as_str()).await;
        self.ensure_logged_out(identity).await?;

        self.credentials.register(username, password).await?;
        self.activity
            .log(
                ActivityEvent::new(ActivityKind::Registered, Actor::User, identity.clone())
                    .with_username(username),
            )
            .await;

        self.start_locked(identity, username)
            .await
            .map_err(|e| match e {
                ScamWatchError::StoreUnavailable { message } => {
                    ScamWatchError::registered_not_logged_in(username, message)
                }
                other => other,
            })
    }

    pub async fn current(&self, identity: &Identity) -> Result<Option<Session>> {
        Ok(self.store.find_active_session(identity).await?)
    }

    /// Active sessions bound to `username`, oldest first
    pub async fn current_for_user(&self, username: &str) -> Result<Vec<Session>> {
        Ok(self.store.find_active_sessions_for_user(username).await?)
    }

    pub async fn active_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.store.list_active_sessions().await?)
    }

    /// Every session the identity has had, oldest first
    pub async fn history(&self, identity: &Identity) -> Result<Vec<Session>> {
        Ok(self.store.session_history(identity).await?)
    }

    /// Refreshes `last_activity` to now. Never fails the caller.
    pub async fn touch(&self, identity: &Identity) {
        self.touch_at(identity, Utc::now()).await;
    }

    pub async fn touch_at(&self, identity: &Identity, at: DateTime<Utc>) {
        match self.store.touch_session(identity, at).await {
            Ok(true) => {}
            Ok(false) => debug!(identity = %identity, "No active session to touch"),
            Err(e) => warn!(identity = %identity, error = %e, "Failed to refresh session activity"),
        }
    }

    /// Explicit logout. Returns false if nothing was active.
    pub async fn end_session(&self, identity: &Identity) -> Result<bool> {
        let _guard = self.identity_locks.lock(identity.as_str()).await;
        let ended = self
            .transition(
                identity,
                ExpireCondition::Always,
                EndReason::Logout,
                ActivityKind::LoggedOut,
                Actor::User,
            )
            .await?;
        Ok(ended.is_some())
    }

    /// Expires the session only if it is still idle since before `cutoff`
    /// when the store applies the update.
    pub async fn expire_idle(
        &self,
        identity: &Identity,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let _guard = self.identity_locks.lock(identity.as_str()).await;
        self.transition(
            identity,
            ExpireCondition::IdleBefore(cutoff),
            EndReason::Inactivity,
            ActivityKind::Expired,
            Actor::System,
        )
        .await
    }

    /// Expires every active session. Returns how many were ended.
    pub async fn logout_all(&self, reason: EndReason) -> Result<usize> {
        let kind = match reason {
            EndReason::Logout => ActivityKind::LoggedOut,
            EndReason::Inactivity => ActivityKind::Expired,
            EndReason::Restart => ActivityKind::RestartLogout,
        };

        let sessions = self.store.list_active_sessions().await?;
        let mut ended = 0;
        for session in sessions {
            let _guard = self.identity_locks.lock(session.identity.as_str()).await;
            match self
                .transition(
                    &session.identity,
                    ExpireCondition::Always,
                    reason,
                    kind,
                    Actor::System,
                )
                .await
            {
                Ok(Some(_)) => ended += 1,
                Ok(None) => {}
                Err(e) => warn!(identity = %session.identity, error = %e, "Failed to end session"),
            }
        }

        info!(ended = ended, reason = ?reason, "Logged out active sessions");
        Ok(ended)
    }

    /// Caller must hold the identity lock.
    async fn ensure_logged_out(&self, identity: &Identity) -> Result<()> {
        match self.store.find_active_session(identity).await? {
            Some(existing) => Err(ScamWatchError::already_logged_in(existing.username)),
            None => Ok(()),
        }
    }

    /// Caller must hold the identity lock.
    async fn start_locked(&self, identity: &Identity, username: &str) -> Result<Session> {
        self.ensure_logged_out(identity).await?;

        let _user_guard = if self.policy.single_session_per_user {
            let guard = self.user_locks.lock(username).await;
            if !self.store.find_active_sessions_for_user(username).await?.is_empty() {
                return Err(ScamWatchError::already_logged_in(username));
            }
            Some(guard)
        } else {
            None
        };

        let session = Session::new(identity.clone(), username, Utc::now());
        match self.store.insert_session(session.clone()).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(ScamWatchError::already_logged_in(username));
            }
            Err(e) => return Err(e.into()),
        }

        self.activity
            .log(
                ActivityEvent::new(ActivityKind::LoggedIn, Actor::User, identity.clone())
                    .with_username(username),
            )
            .await;
        Ok(session)
    }

    /// Shared ACTIVE -> EXPIRED path. Caller must hold the identity lock.
    async fn transition(
        &self,
        identity: &Identity,
        condition: ExpireCondition,
        reason: EndReason,
        kind: ActivityKind,
        actor: Actor,
    ) -> Result<Option<Session>> {
        let expired = self
            .store
            .expire_session(identity, condition, reason, Utc::now())
            .await?;

        if let Some(session) = &expired {
            self.activity
                .log(
                    ActivityEvent::new(kind, actor, identity.clone())
                        .with_username(session.username.clone()),
                )
                .await;
        }
        Ok(expired)
    }
}
