//! Signaling stack seam
//!
//! The signaling stack (transactions, dialogs, registration) lives outside
//! this crate. It is consumed through [`SignalingStack`] for outgoing
//! re-offers, and feeds [`SignalingEvent`]s into
//! [`CallSession::handle_signaling_event`](crate::call::CallSession::handle_signaling_event).

use async_trait::async_trait;

use crate::session::{Originator, SdpExchange};

/// Options attached to a re-offer request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReofferOptions {
    /// Extra header lines (`Name: value`) added to the request
    pub extra_headers: Vec<String>,
    /// Use UPDATE instead of re-INVITE when the dialog allows it
    pub use_update: bool,
}

impl ReofferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extra header line
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers.push(format!("{}: {}", name, value));
        self
    }

    pub fn with_update(mut self, use_update: bool) -> Self {
        self.use_update = use_update;
        self
    }

    /// Value of the first header named `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.extra_headers.iter().find_map(|line| {
            let (header, value) = line.split_once(':')?;
            header
                .trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

/// Immediate answer of the signaling stack to a re-offer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReofferOutcome {
    /// The exchange was started; completion arrives as signaling events
    Accepted,
    /// The exchange was refused, typically because one is already running
    Rejected { reason: String },
}

/// Outgoing side of the signaling stack
#[async_trait]
pub trait SignalingStack: Send + Sync {
    /// Start one offer/answer exchange on the call's dialog
    async fn request_reoffer(&self, options: &ReofferOptions) -> ReofferOutcome;
}

/// Events the signaling stack reports for a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    /// A session description was sent or received
    Sdp {
        /// Which step of offer/answer it belongs to
        exchange: SdpExchange,
        /// The raw description
        sdp: String,
    },
    /// The call was put on hold
    Hold { originator: Originator },
    /// The call was taken off hold
    Unhold { originator: Originator },
    /// The dialog ended
    Terminated,
}

impl SignalingEvent {
    /// Build an [`SignalingEvent::Sdp`]
    pub fn sdp(exchange: SdpExchange, sdp: impl Into<String>) -> Self {
        SignalingEvent::Sdp {
            exchange,
            sdp: sdp.into(),
        }
    }
}
