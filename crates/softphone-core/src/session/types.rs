//! Type definitions shared by the call session modules

use serde::{Deserialize, Serialize};

use crate::sdp::MediaDirection;

/// Unique identifier for a call
pub type CallId = uuid::Uuid;

/// How a call uses video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoMode {
    /// Audio only
    #[default]
    Audio,
    /// Send and receive video
    Video,
    /// Receive the remote video without sending our own
    ReceiveOnlyVideo,
}

impl VideoMode {
    /// Initial policy flags for a call started in this mode
    pub fn initial_flags(&self) -> VideoFlags {
        match self {
            VideoMode::Audio => VideoFlags::new(false, false),
            VideoMode::Video => VideoFlags::new(true, true),
            VideoMode::ReceiveOnlyVideo => VideoFlags::new(false, true),
        }
    }
}

/// Send/receive pair for the video line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoFlags {
    /// Video is sent
    pub send: bool,
    /// Video is received
    pub receive: bool,
}

impl VideoFlags {
    /// Create a flag pair
    pub fn new(send: bool, receive: bool) -> Self {
        Self { send, receive }
    }

    /// Four-state direction for these flags
    pub fn direction(&self) -> MediaDirection {
        MediaDirection::from_flags(self.send, self.receive)
    }
}

/// Hold flags of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HoldState {
    /// We put the call on hold
    pub local: bool,
    /// The other party put the call on hold
    pub remote: bool,
}

impl HoldState {
    /// Whether either side holds the call
    pub fn is_held(&self) -> bool {
        self.local || self.remote
    }
}

/// Which party initiated a signaling action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Originator {
    /// This endpoint
    Local,
    /// The other endpoint
    Remote,
}

/// Offer/answer step a session description belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdpExchange {
    /// Offer received from the other party
    RemoteOffer,
    /// Answer received from the other party
    RemoteAnswer,
    /// Offer we sent
    LocalOffer,
    /// Answer we sent
    LocalAnswer,
}

impl SdpExchange {
    /// Whether this step completes an offer/answer exchange
    pub fn is_answer(&self) -> bool {
        matches!(self, SdpExchange::RemoteAnswer | SdpExchange::LocalAnswer)
    }

    /// Whether the description was produced by the other party
    pub fn is_remote(&self) -> bool {
        matches!(self, SdpExchange::RemoteOffer | SdpExchange::RemoteAnswer)
    }
}

/// Point-in-time copy of a call's video state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStateSnapshot {
    /// Confirmed by the last non-hold answer
    pub negotiated: VideoFlags,
    /// What the application wants
    pub enabled: VideoFlags,
    /// Current hold flags
    pub hold: HoldState,
    /// Whether the outgoing video slot carries a screen capture
    pub screen_sharing: bool,
}
