use crate::session::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One request/response exchange with the completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Store-assigned insertion sequence; orders records and breaks
    /// timestamp ties.
    pub seq: u64,
    pub username: String,
    pub identity: Identity,
    pub request_text: String,
    pub response_text: String,
    pub created_at: DateTime<Utc>,
}

/// An interaction before the store has assigned its sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub username: String,
    pub identity: Identity,
    pub request_text: String,
    pub response_text: String,
    pub created_at: DateTime<Utc>,
}

impl NewInteraction {
    pub fn new(
        username: impl Into<String>,
        identity: Identity,
        request_text: impl Into<String>,
        response_text: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            identity,
            request_text: request_text.into(),
            response_text: response_text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn into_interaction(self, seq: u64) -> Interaction {
        Interaction {
            seq,
            username: self.username,
            identity: self.identity,
            request_text: self.request_text,
            response_text: self.response_text,
            created_at: self.created_at,
        }
    }
}

/// Outcome of a capped insert: the stored record and the records it pushed
/// out, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct CappedInsert {
    pub record: Interaction,
    pub evicted: Vec<Interaction>,
}
