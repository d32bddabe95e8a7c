//! Session description parsing
//!
//! Descriptions are parsed into the typed model of the `sdp-types` crate. This
//! module only adds the glue the call layer needs: error mapping into
//! [`CallError::Parse`] and lookup of a media line by kind.

use std::fmt;

use bytesstr::BytesStr;
use sdp_types::{MediaDescription, MediaType, SessionDescription};

use crate::error::{CallError, CallResult};

/// Media line kinds the call layer asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// `m=audio`
    Audio,
    /// `m=video`
    Video,
}

impl MediaKind {
    /// Whether an `m=` line of `media_type` is of this kind
    pub fn matches(&self, media_type: &MediaType) -> bool {
        matches!(
            (self, media_type),
            (MediaKind::Audio, MediaType::Audio) | (MediaKind::Video, MediaType::Video)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a session description
///
/// Fails with [`CallError::Parse`] when the text is not a complete, well
/// formed description (missing origin or timing lines, media lines without
/// port or protocol, ...).
///
/// ```rust
/// use softphone_core::sdp::{first_media, parse_description, MediaKind};
///
/// let sdp = "v=0\r\n\
///     o=- 1 1 IN IP4 127.0.0.1\r\n\
///     s=-\r\n\
///     t=0 0\r\n\
///     m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
///     a=sendrecv\r\n";
/// let description = parse_description(sdp).unwrap();
/// assert_eq!(description.media_descriptions.len(), 1);
/// assert!(first_media(&description, MediaKind::Audio).is_some());
/// assert!(first_media(&description, MediaKind::Video).is_none());
/// ```
pub fn parse_description(text: &str) -> CallResult<SessionDescription> {
    SessionDescription::parse(&BytesStr::from(text.to_owned())).map_err(|e| CallError::parse(e.to_string()))
}

/// First media line of the given kind
pub fn first_media(description: &SessionDescription, kind: MediaKind) -> Option<&MediaDescription> {
    description
        .media_descriptions
        .iter()
        .find(|media| kind.matches(&media.media.media_type))
}
