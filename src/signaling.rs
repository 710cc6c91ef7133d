//! Signaling: the JSON control protocol and the relay routing it.

pub mod messages;
pub mod relay;

pub use messages::{ClientMessage, ServerMessage};
pub use relay::{Relay, RelayInput};
