//! softphone-core: call media policy for softphones
//!
//! This crate sits between a SIP signaling stack and a media engine and
//! decides what a call's video line should do. It does not parse SIP or touch
//! devices itself; both are reached through traits.
//!
//! ## Layering
//! ```text
//! application ──▶ CallSession ──▶ TrackExchangeCoordinator ──▶ MediaEngine
//!      ▲              │                    │
//!      │              ▼                    ▼
//!  CallEvents   CallSessionState   RenegotiationController ──▶ SignalingStack
//!
//! KeepaliveMonitor ──▶ KeepaliveTransport   (independent of calls)
//! ```
//!
//! - [`sdp`]: session description parsing and media direction analysis
//! - [`session`]: negotiated vs. enabled video, hold, screen sharing flags
//! - [`renegotiation`]: offer/answer re-exchange with bounded retry
//! - [`tracks`]: the single outgoing video slot (camera or screen share)
//! - [`keepalive`]: transport probes, pong timeouts and latency statistics
//! - [`call`]: the per-call entry point tying the above together
//! - [`logging`]: subscriber setup driven by [`PhoneConfig`]
//!
//! Everything the application needs to hear about is delivered as a
//! [`CallEvent`] through an [`EventEmitter`].

pub mod call;
pub mod config;
pub mod error;
pub mod events;
pub mod keepalive;
pub mod logging;
pub mod media;
pub mod renegotiation;
pub mod sdp;
pub mod session;
pub mod signaling;
pub mod tracks;

pub use call::CallSession;
pub use config::{KeepaliveConfig, PhoneConfig, RenegotiationConfig};
pub use error::{CallError, CallResult};
pub use events::{CallEvent, CallEventHandler, EventEmitter};
pub use keepalive::{KeepaliveMonitor, KeepaliveState, KeepaliveTransport, LatencyReport};
pub use logging::{init_logging, LoggingConfig};
pub use media::{MediaEngine, VideoSource, VideoSourceKind};
pub use renegotiation::{RenegotiationController, RenegotiationRequest, RenegotiationState};
pub use sdp::{direction_of, parse_description, DirectionAnalysis, MediaDirection, MediaKind, SessionDescription};
pub use session::{CallId, CallSessionState, VideoFlags, VideoMode, VideoStateSnapshot};
pub use signaling::{ReofferOptions, ReofferOutcome, SignalingEvent, SignalingStack};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for applications
pub mod prelude {
    pub use crate::call::CallSession;
    pub use crate::config::{KeepaliveConfig, PhoneConfig, RenegotiationConfig};
    pub use crate::error::{CallError, CallResult};
    pub use crate::events::{CallEvent, CallEventHandler, EventEmitter};
    pub use crate::keepalive::{KeepaliveMonitor, KeepaliveState, KeepaliveTransport, LatencyReport, PongHandle};
    pub use crate::media::{MediaEngine, VideoSource, VideoSourceKind};
    pub use crate::renegotiation::{RenegotiationRequest, RenegotiationState};
    pub use crate::sdp::{MediaDirection, MediaKind};
    pub use crate::session::{CallId, Originator, SdpExchange, VideoFlags, VideoMode};
    pub use crate::signaling::{ReofferOptions, ReofferOutcome, SignalingEvent, SignalingStack};
}
