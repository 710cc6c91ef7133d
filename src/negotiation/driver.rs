use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::negotiation::negotiator::Negotiator;
use crate::negotiation::peer_connection::PeerConnectionFactory;
use crate::negotiation::types::{IceCandidate, MediaStream, PeerKey, TransportState};
use crate::session_management::connection::Role;
use crate::signaling::messages::{ClientMessage, ServerMessage};

/// Everything that can advance a client's negotiation.
#[derive(Debug)]
pub enum NegotiationInput {
    /// A frame received from the relay.
    Signaling(ServerMessage),
    /// The local capture stream became available or changed.
    LocalStream(MediaStream),
    /// The transport of `peer` gathered an ICE candidate.
    LocalIceCandidate {
        peer: PeerKey,
        candidate: IceCandidate,
    },
    TransportState {
        peer: PeerKey,
        state: TransportState,
    },
    /// The signaling socket closed or the session ended.
    Shutdown,
}

/// Task feeding a `Negotiator` one input at a time.
///
/// Suspension happens only while awaiting the next input or a peer
/// connection operation; inputs are never processed concurrently.
pub struct NegotiationDriver {
    session_id: String,
    negotiator: Negotiator,
    inputs: UnboundedReceiver<NegotiationInput>,
    outbound: UnboundedSender<ClientMessage>,
}

impl NegotiationDriver {
    /// Builds a driver and returns the sender feeding it.
    ///
    /// Frames for the relay are written to `outbound`.
    pub fn new(
        session_id: &str,
        role: Role,
        factory: Arc<dyn PeerConnectionFactory>,
        outbound: UnboundedSender<ClientMessage>,
    ) -> (Self, UnboundedSender<NegotiationInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Self {
            session_id: session_id.to_string(),
            negotiator: Negotiator::new(role, factory, tx.downgrade()),
            inputs: rx,
            outbound,
        };
        (driver, tx)
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Joins the session, then processes inputs until `Shutdown` or until
    /// every sender returned by `new` is dropped. All links are closed on
    /// exit.
    pub async fn run(mut self) -> Negotiator {
        info!("[{}] negotiation driver started", self.session_id);
        for frame in self.negotiator.greeting(&self.session_id) {
            self.send(frame);
        }
        while let Some(input) = self.inputs.recv().await {
            match input {
                NegotiationInput::Signaling(message) => {
                    let frames = self.negotiator.handle_server_message(message).await;
                    self.send_all(frames);
                }
                NegotiationInput::LocalStream(stream) => {
                    let frames = self.negotiator.set_local_stream(stream).await;
                    self.send_all(frames);
                }
                NegotiationInput::LocalIceCandidate { peer, candidate } => {
                    if let Some(frame) = self.negotiator.local_candidate(&peer, candidate) {
                        self.send(frame);
                    }
                }
                NegotiationInput::TransportState { peer, state } => {
                    self.negotiator.transport_state(&peer, state).await;
                }
                NegotiationInput::Shutdown => break,
            }
        }
        self.negotiator.shutdown().await;
        info!("[{}] negotiation driver stopped", self.session_id);
        self.negotiator
    }

    fn send_all(&self, frames: Vec<ClientMessage>) {
        for frame in frames {
            self.send(frame);
        }
    }

    fn send(&self, frame: ClientMessage) {
        debug!("[{}] -> {:?}", self.session_id, frame);
        if self.outbound.send(frame).is_err() {
            warn!("[{}] signaling socket gone, frame dropped", self.session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::peer_connection::testing::{Call, RecordingFactory};
    use crate::negotiation::types::{MediaTrack, SessionDescription, SignalPayload, TrackKind};

    fn camera() -> MediaStream {
        MediaStream {
            id: String::from("cam"),
            tracks: vec![MediaTrack {
                id: String::from("v"),
                kind: TrackKind::Video,
            }],
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ClientMessage>) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(frame);
        }
        out
    }

    #[tokio::test]
    async fn candidate_driver_runs_full_handshake() {
        let factory = RecordingFactory::default();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (driver, input) =
            NegotiationDriver::new("S", Role::Candidate, Arc::new(factory.clone()), out_tx);
        let task = tokio::spawn(driver.run());

        let v1 = PeerKey::Viewer(String::from("v1"));
        input
            .send(NegotiationInput::Signaling(ServerMessage::ViewerReady {
                from: String::from("v1"),
            }))
            .unwrap();
        input.send(NegotiationInput::LocalStream(camera())).unwrap();
        input
            .send(NegotiationInput::Signaling(ServerMessage::Signal {
                from: String::from("v1"),
                signal: SignalPayload::Answer {
                    sdp: SessionDescription::answer("a"),
                }
                .to_value(),
            }))
            .unwrap();
        input
            .send(NegotiationInput::LocalIceCandidate {
                peer: v1.clone(),
                candidate: IceCandidate::new("host"),
            })
            .unwrap();
        input
            .send(NegotiationInput::TransportState {
                peer: v1.clone(),
                state: TransportState::Connected,
            })
            .unwrap();
        input.send(NegotiationInput::Shutdown).unwrap();

        let negotiator = task.await.unwrap();
        assert!(negotiator.link(&v1).is_none());

        let frames = drain(&mut out_rx);
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[0],
            ClientMessage::Join {
                session_id: String::from("S"),
                role: Role::Candidate,
            }
        );
        let targets: Vec<Option<String>> = frames[1..]
            .iter()
            .map(|f| match f {
                ClientMessage::Signal { to, .. } => to.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(
            targets,
            vec![Some(String::from("v1")), Some(String::from("v1"))]
        );
        assert_eq!(factory.calls_for(&v1).last(), Some(&Call::Close));
    }

    #[tokio::test]
    async fn driver_stops_when_input_is_dropped_with_links_open() {
        let factory = RecordingFactory::default();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (driver, input) =
            NegotiationDriver::new("S", Role::Candidate, Arc::new(factory.clone()), out_tx);
        let task = tokio::spawn(driver.run());

        let v1 = PeerKey::Viewer(String::from("v1"));
        input
            .send(NegotiationInput::Signaling(ServerMessage::ViewerReady {
                from: String::from("v1"),
            }))
            .unwrap();
        input.send(NegotiationInput::LocalStream(camera())).unwrap();
        while factory.events_for(&v1).is_none() {
            tokio::task::yield_now().await;
        }

        // A live transport can still report through its handle.
        let events = factory.events_for(&v1).unwrap();
        events
            .upgrade()
            .unwrap()
            .send(NegotiationInput::LocalIceCandidate {
                peer: v1.clone(),
                candidate: IceCandidate::new("host"),
            })
            .unwrap();
        drop(input);

        let negotiator = tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("driver kept running after its input was dropped")
            .unwrap();
        assert!(negotiator.link(&v1).is_none());
        assert_eq!(factory.calls_for(&v1).last(), Some(&Call::Close));
        assert!(events.upgrade().is_none());

        let signals = drain(&mut out_rx)
            .into_iter()
            .filter(|f| matches!(f, ClientMessage::Signal { .. }))
            .count();
        assert_eq!(signals, 2);
    }

    #[tokio::test]
    async fn viewer_driver_sends_join_and_ready() {
        let factory = RecordingFactory::default();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (driver, input) = NegotiationDriver::new("S", Role::Viewer, Arc::new(factory), out_tx);
        input.send(NegotiationInput::Shutdown).unwrap();
        driver.run().await;

        let frames = drain(&mut out_rx);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], ClientMessage::Join { role: Role::Viewer, .. }));
        assert!(matches!(frames[1], ClientMessage::Ready { .. }));
    }
}
