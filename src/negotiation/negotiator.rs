//! Client-side peer negotiation state machine.
//!
//! The candidate is the offerer for every viewer: each viewer gets its own
//! link and its own offer once it reports ready and a local stream exists.
//! A viewer only ever offers to renegotiate after attaching media late, and
//! then only towards the singleton candidate.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::error_handling::types::NegotiationError;
use crate::negotiation::driver::NegotiationInput;
use crate::negotiation::peer_connection::PeerConnectionFactory;
use crate::negotiation::peer_link::PeerLink;
use crate::negotiation::types::{
    IceCandidate, MediaStream, PeerKey, PeerState, SessionDescription, SignalPayload,
    TransportState,
};
use crate::session_management::connection::Role;
use crate::signaling::messages::{ClientMessage, ServerMessage};

/// Peer links of one signaling client.
///
/// # Fields Overview
///
/// - `role`: which side of the session this client plays
/// - `factory`: creates the underlying peer connections
/// - `events`: weak handle given to the factory so transport callbacks reach
///   the driver without keeping its input channel open
/// - `links`: one per counterpart; removed once closed
/// - `pending_viewers`: viewers that reported ready before a local stream existed
/// - `local_stream`: the capture stream attached to every link
pub struct Negotiator {
    role: Role,
    factory: Arc<dyn PeerConnectionFactory>,
    events: WeakUnboundedSender<NegotiationInput>,
    links: HashMap<PeerKey, PeerLink>,
    pending_viewers: Vec<String>,
    local_stream: Option<MediaStream>,
}

fn signal_to(peer: &PeerKey, payload: SignalPayload) -> ClientMessage {
    ClientMessage::Signal {
        to: Some(peer.target().to_string()),
        signal: payload.to_value(),
    }
}

impl Negotiator {
    pub fn new(
        role: Role,
        factory: Arc<dyn PeerConnectionFactory>,
        events: WeakUnboundedSender<NegotiationInput>,
    ) -> Self {
        Self {
            role,
            factory,
            events,
            links: HashMap::new(),
            pending_viewers: Vec::new(),
            local_stream: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn link(&self, peer: &PeerKey) -> Option<&PeerLink> {
        self.links.get(peer)
    }

    pub fn pending_viewers(&self) -> &[String] {
        &self.pending_viewers
    }

    pub fn is_connected(&self) -> bool {
        self.links
            .values()
            .any(|l| l.state() == PeerState::Connected)
    }

    /// Frames a client sends right after the socket opens.
    pub fn greeting(&self, session_id: &str) -> Vec<ClientMessage> {
        let mut frames = vec![ClientMessage::Join {
            session_id: session_id.to_string(),
            role: self.role,
        }];
        if self.role == Role::Viewer {
            frames.push(ClientMessage::Ready {
                session_id: Some(session_id.to_string()),
                role: Some(self.role),
            });
        }
        frames
    }

    /// Reacts to one relay frame, returning the frames to send back.
    pub async fn handle_server_message(&mut self, message: ServerMessage) -> Vec<ClientMessage> {
        match (self.role, message) {
            (Role::Candidate, ServerMessage::ViewerReady { from }) => {
                self.on_viewer_ready(from).await.into_iter().collect()
            }
            (Role::Candidate, ServerMessage::ViewerDisconnected { from }) => {
                self.pending_viewers.retain(|v| v != &from);
                self.remove_link(&PeerKey::Viewer(from)).await;
                Vec::new()
            }
            (Role::Viewer, ServerMessage::CandidateLeft { .. }) => {
                self.remove_link(&PeerKey::Candidate).await;
                Vec::new()
            }
            (Role::Candidate, ServerMessage::CandidateLeft { from }) => {
                info!("Replaced as candidate by {}, closing all links", from);
                self.pending_viewers.clear();
                self.close_all().await;
                Vec::new()
            }
            (_, ServerMessage::Signal { from, signal }) => {
                self.on_signal(from, signal).await.into_iter().collect()
            }
            (_, other) => {
                debug!("Ignoring {:?}", other);
                Vec::new()
            }
        }
    }

    /// Installs or replaces the local stream.
    ///
    /// Tracks are attached to every live link, deferred offers go out to the
    /// pending viewers, and a viewer whose link is already negotiated offers
    /// to the candidate again.
    pub async fn set_local_stream(&mut self, stream: MediaStream) -> Vec<ClientMessage> {
        self.local_stream = Some(stream.clone());
        let mut out = Vec::new();

        let keys: Vec<PeerKey> = self.links.keys().cloned().collect();
        for key in keys {
            let result = match self.links.get_mut(&key) {
                Some(link) => link.attach_stream(&stream).await,
                None => continue,
            };
            if let Err(e) = result {
                self.abandon(&key, e).await;
            }
        }

        for viewer_id in std::mem::take(&mut self.pending_viewers) {
            out.extend(self.on_viewer_ready(viewer_id).await);
        }

        if self.role == Role::Viewer {
            let key = PeerKey::Candidate;
            let negotiated = self
                .links
                .get(&key)
                .is_some_and(|l| l.has_remote_description());
            if negotiated {
                debug!("Renegotiating with the candidate after local media change");
                out.extend(self.offer(&key).await);
            }
        }
        out
    }

    /// Relays an ICE candidate gathered by the local transport.
    pub fn local_candidate(&self, peer: &PeerKey, candidate: IceCandidate) -> Option<ClientMessage> {
        let link = self.links.get(peer)?;
        if link.state() == PeerState::Closed {
            return None;
        }
        Some(signal_to(peer, SignalPayload::Candidate { candidate }))
    }

    pub async fn transport_state(&mut self, peer: &PeerKey, state: TransportState) {
        match state {
            TransportState::Connected => {
                if let Some(link) = self.links.get_mut(peer) {
                    info!("[{}] peer connected", peer.target());
                    link.mark_connected();
                }
            }
            TransportState::Failed | TransportState::Closed => {
                debug!("[{}] transport {:?}", peer.target(), state);
                self.remove_link(peer).await;
            }
            TransportState::Connecting | TransportState::Disconnected => {
                debug!("[{}] transport {:?}", peer.target(), state);
            }
        }
    }

    /// Closes every link; the local stream is dropped as well.
    pub async fn shutdown(&mut self) {
        self.close_all().await;
        self.pending_viewers.clear();
        self.local_stream = None;
    }

    async fn on_viewer_ready(&mut self, viewer_id: String) -> Option<ClientMessage> {
        let key = PeerKey::Viewer(viewer_id.clone());
        if self.links.contains_key(&key) {
            debug!("[{}] already has a link, ready ignored", viewer_id);
            return None;
        }
        if self.local_stream.is_none() {
            debug!("[{}] no local stream yet, offer deferred", viewer_id);
            if !self.pending_viewers.contains(&viewer_id) {
                self.pending_viewers.push(viewer_id);
            }
            return None;
        }
        if let Err(e) = self.open_link(&key).await {
            warn!("[{}] {}", viewer_id, e);
            return None;
        }
        self.offer(&key).await
    }

    async fn on_signal(&mut self, from: String, signal: Value) -> Option<ClientMessage> {
        let payload: SignalPayload = match serde_json::from_value(signal) {
            Ok(p) => p,
            Err(e) => {
                warn!("[{}] {}", from, NegotiationError::MalformedSignal(e.to_string()));
                return None;
            }
        };
        let key = match self.role {
            Role::Candidate => PeerKey::Viewer(from),
            Role::Viewer => PeerKey::Candidate,
        };
        match payload {
            SignalPayload::Offer { sdp } => self.answer(&key, sdp).await,
            SignalPayload::Answer { sdp } => {
                let result = match self.links.get_mut(&key) {
                    Some(link) => link.accept_answer(sdp).await,
                    None => {
                        debug!("[{}] answer without a link dropped", key.target());
                        return None;
                    }
                };
                if let Err(e) = result {
                    self.abandon(&key, e).await;
                }
                None
            }
            SignalPayload::Candidate { candidate } => {
                match self.links.get_mut(&key) {
                    Some(link) => link.add_remote_candidate(candidate).await,
                    None => debug!("[{}] ICE candidate without a link dropped", key.target()),
                }
                None
            }
        }
    }

    async fn answer(&mut self, key: &PeerKey, offer: SessionDescription) -> Option<ClientMessage> {
        if !self.links.contains_key(key) {
            if let Err(e) = self.open_link(key).await {
                warn!("[{}] {}", key.target(), e);
                return None;
            }
        }
        let result = match self.links.get_mut(key) {
            Some(link) => link.accept_offer(offer).await,
            None => return None,
        };
        match result {
            Ok(sdp) => Some(signal_to(key, SignalPayload::Answer { sdp })),
            Err(e) => {
                self.abandon(key, e).await;
                None
            }
        }
    }

    async fn offer(&mut self, key: &PeerKey) -> Option<ClientMessage> {
        let result = match self.links.get_mut(key) {
            Some(link) => link.create_offer().await,
            None => return None,
        };
        match result {
            Ok(sdp) => Some(signal_to(key, SignalPayload::Offer { sdp })),
            Err(e) => {
                self.abandon(key, e).await;
                None
            }
        }
    }

    /// Creates the link of `key` and attaches the local stream if any.
    async fn open_link(&mut self, key: &PeerKey) -> Result<(), NegotiationError> {
        let pc = self.factory.create(key, self.events.clone())?;
        let mut link = PeerLink::new(key.clone(), pc);
        if let Some(stream) = &self.local_stream {
            if let Err(e) = link.attach_stream(stream).await {
                link.close().await;
                return Err(e);
            }
        }
        debug!("[{}] link created", key.target());
        self.links.insert(key.clone(), link);
        Ok(())
    }

    async fn abandon(&mut self, key: &PeerKey, error: NegotiationError) {
        warn!("[{}] {}, abandoning link", key.target(), error);
        self.remove_link(key).await;
    }

    async fn remove_link(&mut self, key: &PeerKey) {
        if let Some(mut link) = self.links.remove(key) {
            link.close().await;
            info!("[{}] link closed", key.target());
        }
    }

    async fn close_all(&mut self) {
        for (key, mut link) in self.links.drain() {
            link.close().await;
            debug!("[{}] link closed", key.target());
        }
    }
}
