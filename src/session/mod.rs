pub mod registry;
pub mod sweeper;
pub mod types;

pub use registry::{SessionPolicy, SessionRegistry};
pub use sweeper::{InactivitySweeper, SweepReport};
pub use types::{EndReason, Identity, Session, SessionStatus};
