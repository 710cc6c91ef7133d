//! Client-side WebRTC negotiation.
//!
//! - `types`: SDP/ICE payloads, peer keys and link states
//! - `peer_connection`: the `PeerConnection` seam and its factory
//! - `peer_link`: per-counterpart context with the ICE buffer
//! - `negotiator`: the state machine over all links of one client
//! - `driver`: the task feeding the negotiator from its input channel

pub mod driver;
pub mod negotiator;
pub mod peer_connection;
pub mod peer_link;
pub mod types;

pub use driver::{NegotiationDriver, NegotiationInput};
pub use negotiator::Negotiator;
pub use peer_connection::{PeerConnection, PeerConnectionFactory};
