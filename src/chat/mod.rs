pub mod command;
pub mod hub;
pub mod types;

pub use command::Command;
pub use hub::{ChatError, ChatHub};
pub use types::{InboundMessage, OutboundMessage};
