//! Per-key async mutexes
//!
//! Serializes read-modify-write sequences on one key (an identity, a
//! username) without a global lock. Entries nobody holds are pruned lazily.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Number of map entries above which idle locks are pruned on acquire
const PRUNE_THRESHOLD: usize = 256;

/// A map of lazily created `tokio::sync::Mutex<()>`, one per key.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Guard returned by [`KeyedLocks::lock`]; the key is released on drop.
pub type KeyGuard = OwnedMutexGuard<()>;

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the lock for `key` is free and returns its guard.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = {
            // Poisoning only happens if a thread panicked while holding the
            // map lock; the map itself is still consistent.
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, m| Arc::strong_count(m) > 1);
            }
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
