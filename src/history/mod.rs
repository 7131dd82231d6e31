pub mod log;
pub mod types;

pub use log::{DEFAULT_HISTORY_CAP, InteractionLog};
pub use types::{CappedInsert, Interaction, NewInteraction};
