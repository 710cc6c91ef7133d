use serde::{Deserialize, Serialize};

use crate::signaling::messages::CANDIDATE_TARGET;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// An SDP offer or answer, shaped like the browser's `RTCSessionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer<S: Into<String>>(sdp: S) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer<S: Into<String>>(sdp: S) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A trickled ICE candidate, shaped like the browser's `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        default,
        rename = "sdpMLineIndex",
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub fn new<S: Into<String>>(candidate: S) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// The `signal` field of a signaling frame as the peers interpret it.
///
/// The relay forwards it as opaque JSON; only the negotiating ends decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalPayload {
    Offer { sdp: SessionDescription },
    Answer { sdp: SessionDescription },
    Candidate { candidate: IceCandidate },
}

impl SignalPayload {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Counterpart a `PeerLink` negotiates with.
///
/// The candidate is singleton per session, so viewers address it structurally
/// instead of by socket id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerKey {
    Viewer(String),
    Candidate,
}

impl PeerKey {
    /// Value of the `to` field that reaches this counterpart.
    pub fn target(&self) -> &str {
        match self {
            PeerKey::Viewer(id) => id,
            PeerKey::Candidate => CANDIDATE_TARGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Negotiating,
    Connected,
    Closed,
}

/// Connectivity reported by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
}

/// Local capture stream attached to every peer link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}
