//! Utility modules for cross-cutting concerns

pub mod error;
pub mod keyed_lock;

// Re-export commonly used items
pub use error::{Result, ScamWatchError};
pub use keyed_lock::{KeyGuard, KeyedLocks};
