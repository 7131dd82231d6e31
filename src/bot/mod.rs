//! Chat command handling: parsing has already happened in [`crate::chat`];
//! this module decides who may run what and produces the replies.

pub mod dispatcher;
pub mod gate;
pub mod replies;

pub use dispatcher::CommandDispatcher;
pub use gate::{GateOutcome, LoginGate};
