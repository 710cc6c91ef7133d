//! Seam between the negotiation state machine and a WebRTC implementation.

use async_trait::async_trait;
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::error_handling::types::NegotiationError;
use crate::negotiation::driver::NegotiationInput;
use crate::negotiation::types::{IceCandidate, MediaTrack, PeerKey, SessionDescription, TrackKind};

/// One WebRTC peer connection.
///
/// Every operation may complete out of band; the negotiator awaits each one
/// before issuing the next on the same link.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    /// Kinds of the tracks currently sent on this connection.
    fn sender_kinds(&self) -> Vec<TrackKind>;

    async fn add_track(&self, track: &MediaTrack, stream_id: &str) -> Result<(), NegotiationError>;

    /// Swaps the track of the existing sender of the same kind.
    async fn replace_track(&self, track: &MediaTrack) -> Result<(), NegotiationError>;

    async fn close(&self);
}

/// Creates peer connections and wires their callbacks.
///
/// Implementations forward gathered ICE candidates as
/// `NegotiationInput::LocalIceCandidate` and connectivity changes as
/// `NegotiationInput::TransportState`, tagged with `peer`. The handle is
/// weak: callbacks upgrade it per event, and a failed upgrade means the
/// driver is gone and the event is dropped.
pub trait PeerConnectionFactory: Send + Sync {
    fn create(
        &self,
        peer: &PeerKey,
        events: WeakUnboundedSender<NegotiationInput>,
    ) -> Result<Box<dyn PeerConnection>, NegotiationError>;
}
