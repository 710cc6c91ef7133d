use std::collections::VecDeque;

use log::{debug, warn};

use crate::error_handling::types::NegotiationError;
use crate::negotiation::peer_connection::PeerConnection;
use crate::negotiation::types::{IceCandidate, MediaStream, PeerKey, PeerState, SessionDescription};

/// Negotiation context with one counterpart.
///
/// Remote ICE candidates that arrive before the remote description is set are
/// queued and replayed in arrival order right after it is applied; no
/// candidate ever reaches the connection earlier.
pub struct PeerLink {
    key: PeerKey,
    pc: Box<dyn PeerConnection>,
    state: PeerState,
    remote_set: bool,
    pending_ice: VecDeque<IceCandidate>,
}

impl PeerLink {
    pub fn new(key: PeerKey, pc: Box<dyn PeerConnection>) -> Self {
        Self {
            key,
            pc,
            state: PeerState::New,
            remote_set: false,
            pending_ice: VecDeque::new(),
        }
    }

    pub fn key(&self) -> &PeerKey {
        &self.key
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_set
    }

    pub fn pending_ice(&self) -> usize {
        self.pending_ice.len()
    }

    /// Sends every track of `stream`, reusing a sender of the same kind when
    /// one exists.
    pub async fn attach_stream(&mut self, stream: &MediaStream) -> Result<(), NegotiationError> {
        let kinds = self.pc.sender_kinds();
        for track in &stream.tracks {
            if kinds.contains(&track.kind) {
                self.pc.replace_track(track).await?;
            } else {
                self.pc.add_track(track, &stream.id).await?;
            }
        }
        Ok(())
    }

    /// Creates an offer and installs it as local description.
    pub async fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError> {
        self.begin_negotiation();
        let offer = self.pc.create_offer().await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(offer)
    }

    /// Applies a remote offer and returns the local answer.
    pub async fn accept_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        self.begin_negotiation();
        self.set_remote(offer).await?;
        let answer = self.pc.create_answer().await?;
        self.pc.set_local_description(answer.clone()).await?;
        self.flush_ice().await;
        Ok(answer)
    }

    /// Applies the remote answer to our offer.
    pub async fn accept_answer(&mut self, answer: SessionDescription) -> Result<(), NegotiationError> {
        self.set_remote(answer).await?;
        self.flush_ice().await;
        Ok(())
    }

    /// Applies a remote ICE candidate, or queues it until the remote
    /// description is set.
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.remote_set {
            debug!(
                "[{}] buffering ICE candidate, remote description not set",
                self.key.target()
            );
            self.pending_ice.push_back(candidate);
            return;
        }
        if let Err(e) = self.pc.add_ice_candidate(candidate).await {
            warn!("[{}] {}", self.key.target(), e);
        }
    }

    pub fn mark_connected(&mut self) {
        if self.state != PeerState::Closed {
            self.state = PeerState::Connected;
        }
    }

    pub async fn close(&mut self) {
        if self.state == PeerState::Closed {
            return;
        }
        self.pc.close().await;
        self.pending_ice.clear();
        self.state = PeerState::Closed;
    }

    fn begin_negotiation(&mut self) {
        if self.state == PeerState::New {
            self.state = PeerState::Negotiating;
        }
    }

    async fn set_remote(&mut self, desc: SessionDescription) -> Result<(), NegotiationError> {
        self.pc.set_remote_description(desc).await?;
        self.remote_set = true;
        Ok(())
    }

    /// A candidate that fails to apply is logged and skipped.
    async fn flush_ice(&mut self) {
        while let Some(candidate) = self.pending_ice.pop_front() {
            if let Err(e) = self.pc.add_ice_candidate(candidate).await {
                warn!("[{}] flushing buffered ICE: {}", self.key.target(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::peer_connection::testing::{Call, Failures, RecordingFactory};
    use crate::negotiation::peer_connection::PeerConnectionFactory;
    use crate::negotiation::types::{MediaTrack, SdpType, TrackKind};
    use tokio::sync::mpsc;

    fn link(factory: &RecordingFactory, key: PeerKey) -> PeerLink {
        let (tx, _rx) = mpsc::unbounded_channel();
        PeerLink::new(key.clone(), factory.create(&key, tx.downgrade()).unwrap())
    }

    fn camera() -> MediaStream {
        MediaStream {
            id: String::from("cam"),
            tracks: vec![
                MediaTrack {
                    id: String::from("a"),
                    kind: TrackKind::Audio,
                },
                MediaTrack {
                    id: String::from("v"),
                    kind: TrackKind::Video,
                },
            ],
        }
    }

    #[tokio::test]
    async fn early_candidates_wait_for_remote_description() {
        let factory = RecordingFactory::default();
        let key = PeerKey::Viewer(String::from("v1"));
        let mut link = link(&factory, key.clone());

        link.create_offer().await.unwrap();
        link.add_remote_candidate(IceCandidate::new("c1")).await;
        link.add_remote_candidate(IceCandidate::new("c2")).await;
        assert_eq!(link.pending_ice(), 2);
        assert!(!factory.calls_for(&key).iter().any(|c| matches!(c, Call::AddIce(_))));

        link.accept_answer(SessionDescription::answer("a")).await.unwrap();
        link.add_remote_candidate(IceCandidate::new("c3")).await;

        assert_eq!(
            factory.calls_for(&key),
            vec![
                Call::CreateOffer,
                Call::SetLocal(SdpType::Offer),
                Call::SetRemote(SdpType::Answer),
                Call::AddIce(String::from("c1")),
                Call::AddIce(String::from("c2")),
                Call::AddIce(String::from("c3")),
            ]
        );
        assert_eq!(link.pending_ice(), 0);
        assert_eq!(link.state(), PeerState::Negotiating);
    }

    #[tokio::test]
    async fn answering_sets_remote_before_local_then_flushes() {
        let factory = RecordingFactory::default();
        let mut link = link(&factory, PeerKey::Candidate);
        link.add_remote_candidate(IceCandidate::new("early")).await;

        let answer = link.accept_offer(SessionDescription::offer("o")).await.unwrap();
        assert_eq!(answer.kind, SdpType::Answer);
        assert_eq!(
            factory.calls_for(&PeerKey::Candidate),
            vec![
                Call::SetRemote(SdpType::Offer),
                Call::CreateAnswer,
                Call::SetLocal(SdpType::Answer),
                Call::AddIce(String::from("early")),
            ]
        );
    }

    #[tokio::test]
    async fn failed_remote_description_keeps_candidates_buffered() {
        let factory = RecordingFactory {
            failures: Failures {
                remote_description: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut link = link(&factory, PeerKey::Candidate);
        link.add_remote_candidate(IceCandidate::new("early")).await;

        assert!(link.accept_answer(SessionDescription::answer("a")).await.is_err());
        assert!(!link.has_remote_description());
        assert_eq!(link.pending_ice(), 1);
    }

    #[tokio::test]
    async fn attach_reuses_senders_of_same_kind() {
        let factory = RecordingFactory::default();
        let mut link = link(&factory, PeerKey::Candidate);
        link.attach_stream(&camera()).await.unwrap();
        link.attach_stream(&camera()).await.unwrap();
        assert_eq!(
            factory.calls_for(&PeerKey::Candidate),
            vec![
                Call::AddTrack(TrackKind::Audio),
                Call::AddTrack(TrackKind::Video),
                Call::ReplaceTrack(TrackKind::Audio),
                Call::ReplaceTrack(TrackKind::Video),
            ]
        );
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let factory = RecordingFactory::default();
        let mut link = link(&factory, PeerKey::Candidate);
        link.mark_connected();
        assert_eq!(link.state(), PeerState::Connected);
        link.close().await;
        link.close().await;
        link.mark_connected();
        assert_eq!(link.state(), PeerState::Closed);
        assert_eq!(factory.calls_for(&PeerKey::Candidate), vec![Call::Close]);
    }
}
