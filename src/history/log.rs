//! Bounded per-user interaction history
//!
//! Every completed exchange is appended for the user; once a user has more
//! than `cap` records the oldest ones (lowest `seq`) are evicted.

use crate::history::types::{Interaction, NewInteraction};
use crate::session::Identity;
use crate::storage::Store;
use crate::utils::Result;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_HISTORY_CAP: usize = 10;

pub struct InteractionLog {
    store: Arc<dyn Store>,
    cap: NonZeroUsize,
}

impl InteractionLog {
    pub fn new(store: Arc<dyn Store>, cap: NonZeroUsize) -> Self {
        Self { store, cap }
    }

    pub fn cap(&self) -> usize {
        self.cap.get()
    }

    /// Appends an exchange and trims the user's history back to the cap.
    ///
    /// The store inserts and evicts in one step, so a failed record leaves
    /// the history exactly as it was.
    pub async fn record(
        &self,
        username: &str,
        identity: &Identity,
        request_text: &str,
        response_text: &str,
    ) -> Result<Interaction> {
        let inserted = self
            .store
            .insert_interaction(
                NewInteraction::new(username, identity.clone(), request_text, response_text),
                self.cap,
            )
            .await?;

        for evicted in &inserted.evicted {
            debug!(username = %username, seq = evicted.seq, "Evicted oldest interaction");
        }
        Ok(inserted.record)
    }

    /// Up to `limit` most recent records, oldest first.
    pub async fn recent(&self, username: &str, limit: usize) -> Result<Vec<Interaction>> {
        Ok(self.store.recent_interactions(username, limit).await?)
    }
}
