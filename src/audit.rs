//! Append-only activity log for operators
//!
//! Every registration, login, failed login, logout and forced expiry is
//! persisted through the store and mirrored on the `audit` tracing target so
//! it can be routed to a dedicated log file.

use crate::session::Identity;
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Tracing target used for activity events
pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Registered,
    LoggedIn,
    LoginFailed,
    LoggedOut,
    Expired,
    RestartLogout,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Registered => "registered",
            ActivityKind::LoggedIn => "logged_in",
            ActivityKind::LoginFailed => "login_failed",
            ActivityKind::LoggedOut => "logged_out",
            ActivityKind::Expired => "expired",
            ActivityKind::RestartLogout => "restart_logout",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who triggered the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User,
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User => f.write_str("user"),
            Actor::System => f.write_str("system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub at: DateTime<Utc>,
    pub kind: ActivityKind,
    pub actor: Actor,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ActivityEvent {
    pub fn new(kind: ActivityKind, actor: Actor, identity: Identity) -> Self {
        Self {
            at: Utc::now(),
            kind,
            actor,
            identity,
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} identity={} user={} actor={}",
            self.at.to_rfc3339(),
            self.kind,
            self.identity,
            self.username.as_deref().unwrap_or("-"),
            self.actor
        )
    }
}

/// Writes activity events to the store and the `audit` tracing target.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn Store>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records an event. A store failure is logged, never returned: the
    /// transition it describes has already happened.
    pub async fn log(&self, event: ActivityEvent) {
        info!(
            target: AUDIT_TARGET,
            kind = %event.kind,
            actor = %event.actor,
            identity = %event.identity,
            username = event.username.as_deref().unwrap_or("-"),
            "{}",
            event.kind
        );

        if let Err(e) = self.store.append_activity(event).await {
            error!(error = %e, "Failed to store activity event");
        }
    }

    pub async fn recent(&self, limit: usize) -> crate::utils::Result<Vec<ActivityEvent>> {
        Ok(self.store.recent_activity(limit).await?)
    }
}
