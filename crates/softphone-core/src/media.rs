//! Media engine seam
//!
//! Capture devices, tracks and transceivers belong to the media engine. This
//! crate only decides which source occupies the single outgoing video slot and
//! which direction each transceiver should have.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CallResult;
use crate::sdp::{MediaDirection, MediaKind};

/// Where a video source captures from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoSourceKind {
    /// Camera device
    Camera,
    /// Screen, window or tab capture
    Display,
}

impl fmt::Display for VideoSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSourceKind::Camera => write!(f, "camera"),
            VideoSourceKind::Display => write!(f, "display"),
        }
    }
}

/// Handle to a captured video source
///
/// Clones share the same end-of-capture signal. The media engine calls
/// [`VideoSource::end_capture`] when capture stops on its own, for example
/// when the user ends a screen share from the operating system's UI.
#[derive(Debug, Clone)]
pub struct VideoSource {
    id: String,
    kind: VideoSourceKind,
    ended: CancellationToken,
}

impl VideoSource {
    pub fn new(id: impl Into<String>, kind: VideoSourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ended: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> VideoSourceKind {
        self.kind
    }

    /// Signal that capture has ended
    pub fn end_capture(&self) {
        self.ended.cancel();
    }

    /// Whether capture has ended
    pub fn is_ended(&self) -> bool {
        self.ended.is_cancelled()
    }

    /// Resolves once capture has ended
    pub async fn capture_ended(&self) {
        self.ended.cancelled().await
    }
}

/// Operations the call layer needs from the media engine
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Open the camera
    ///
    /// The returned future is dropped unfinished when the call terminates
    /// first; an engine must then stop whatever capture it started.
    async fn acquire_camera_video(&self) -> CallResult<VideoSource>;

    /// Open a display capture, dropped unfinished like camera acquisition
    async fn acquire_display_video(&self) -> CallResult<VideoSource>;

    /// Whether display capture is available at all
    fn supports_display_capture(&self) -> bool;

    /// Put `source` on the outgoing video slot
    ///
    /// With `had_prior_video` the existing sender's track is replaced; without
    /// it a new sender is created. Returns whether replace was used.
    async fn add_or_replace_outgoing_video(&self, had_prior_video: bool, source: &VideoSource) -> CallResult<bool>;

    /// Detach the outgoing video track, keeping the sender slot
    async fn remove_outgoing_video(&self) -> CallResult<()>;

    /// Set the direction of the transceiver for `kind`
    async fn set_transceiver_direction(&self, kind: MediaKind, direction: MediaDirection) -> CallResult<()>;

    /// Stop a source that will not be attached (anymore)
    async fn release_source(&self, source: &VideoSource);
}
