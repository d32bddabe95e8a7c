//! Media direction analysis
//!
//! Resolves the negotiated direction of one media kind from a session
//! description and maps it onto the analyzing party's perspective. A remote
//! `sendonly` means *we* receive, so the mapping flips when the description
//! came from the other side.

use std::fmt;

use sdp_types::{Direction, SessionDescription};
use serde::{Deserialize, Serialize};

use super::description::{first_media, MediaKind};

/// Direction attribute of a media line (RFC 4566 section 6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaDirection {
    /// Send and receive
    SendRecv,
    /// Send only
    SendOnly,
    /// Receive only
    RecvOnly,
    /// Neither send nor receive
    Inactive,
    /// Not determined yet
    Unknown,
}

impl MediaDirection {
    /// Combine send/receive flags into a four-state direction
    pub fn from_flags(send: bool, receive: bool) -> Self {
        match (send, receive) {
            (true, true) => MediaDirection::SendRecv,
            (true, false) => MediaDirection::SendOnly,
            (false, true) => MediaDirection::RecvOnly,
            (false, false) => MediaDirection::Inactive,
        }
    }

    /// Attribute token for this direction
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDirection::SendRecv => "sendrecv",
            MediaDirection::SendOnly => "sendonly",
            MediaDirection::RecvOnly => "recvonly",
            MediaDirection::Inactive => "inactive",
            MediaDirection::Unknown => "unknown",
        }
    }
}

impl From<Direction> for MediaDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::SendRecv => MediaDirection::SendRecv,
            Direction::SendOnly => MediaDirection::SendOnly,
            Direction::RecvOnly => MediaDirection::RecvOnly,
            Direction::Inactive => MediaDirection::Inactive,
        }
    }
}

impl fmt::Display for MediaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of analyzing one media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionAnalysis {
    /// Whether the analyzing party may send this media
    pub can_send: bool,
    /// Whether the analyzing party may receive this media
    pub can_receive: bool,
    /// The resolved attribute as written in the description
    pub direction: MediaDirection,
    /// Whether the description carries a section of this kind at all
    pub present: bool,
}

impl DirectionAnalysis {
    fn absent() -> Self {
        Self {
            can_send: false,
            can_receive: false,
            direction: MediaDirection::Inactive,
            present: false,
        }
    }
}

/// Determine the direction of `kind` in `description`
///
/// The first media line of the requested kind is used. Its direction
/// attribute overrides a session-level one; with neither present the default is
/// `sendrecv`. `is_remote` tells whether the description was produced by the
/// other party, in which case `sendonly` and `recvonly` are flipped.
///
/// ```rust
/// use softphone_core::sdp::{direction_of, parse_description, MediaKind};
///
/// let sdp = "v=0\r\n\
///     o=- 1 1 IN IP4 127.0.0.1\r\n\
///     s=-\r\n\
///     t=0 0\r\n\
///     m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
///     a=sendonly\r\n";
/// let description = parse_description(sdp).unwrap();
///
/// let remote = direction_of(&description, MediaKind::Video, true);
/// assert!(!remote.can_send);
/// assert!(remote.can_receive);
/// ```
pub fn direction_of(description: &SessionDescription, kind: MediaKind, is_remote: bool) -> DirectionAnalysis {
    let Some(media) = first_media(description, kind) else {
        return DirectionAnalysis::absent();
    };

    // A media line without its own attribute reads as sendrecv
    let resolved = if media.direction == Direction::SendRecv {
        description.direction
    } else {
        media.direction
    };
    let perspective = if is_remote { resolved.flipped() } else { resolved };

    let (can_send, can_receive) = match perspective {
        Direction::SendRecv => (true, true),
        Direction::SendOnly => (true, false),
        Direction::RecvOnly => (false, true),
        Direction::Inactive => (false, false),
    };

    DirectionAnalysis {
        can_send,
        can_receive,
        direction: resolved.into(),
        present: true,
    }
}
