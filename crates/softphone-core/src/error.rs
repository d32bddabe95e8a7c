//! Error types for softphone-core
//!
//! Every fallible operation in this crate returns [`CallResult`]. The variants
//! fall into three groups:
//!
//! - **Absorbed internally**: [`CallError::RenegotiationRejected`] is retried by the
//!   renegotiation controller and a malformed session description
//!   ([`CallError::Parse`]) only leaves the previous state in place.
//! - **Caller misuse**: [`CallError::AlreadyActive`], [`CallError::AlreadyStopped`]
//!   and [`CallError::Unsupported`] are returned synchronously without touching state.
//! - **Terminal**: [`CallError::RenegotiationExhausted`], [`CallError::Terminated`] and
//!   [`CallError::ConnectionFailed`] mean the call or transport cannot continue.
//!   They are surfaced once and never retried here.

use thiserror::Error;

/// Result type for call operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors that can occur while driving a call's media state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Malformed session description
    #[error("Malformed session description: {reason}")]
    Parse { reason: String },

    /// The requested media activity is already running
    #[error("{activity} is already active")]
    AlreadyActive { activity: String },

    /// The requested media activity is not running
    #[error("{activity} is already stopped")]
    AlreadyStopped { activity: String },

    /// Camera or display capture unavailable or denied
    #[error("Failed to acquire {device} video: {reason}")]
    MediaAcquisition { device: String, reason: String },

    /// The media engine cannot perform the operation at all
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The signaling stack refused a renegotiation attempt (transient)
    #[error("Renegotiation rejected: {reason}")]
    RenegotiationRejected { reason: String },

    /// Every renegotiation attempt was rejected
    #[error("Renegotiation failed after {attempts} attempts")]
    RenegotiationExhausted { attempts: u32 },

    /// The call ended while the operation was in flight
    #[error("Call has been terminated")]
    Terminated,

    /// Keepalive detected a dead transport
    #[error("Connection failed on transport {transport}: {reason}")]
    ConnectionFailed { transport: String, reason: String },

    /// Configuration value out of range
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Media engine operation failed
    #[error("Media engine error: {reason}")]
    MediaEngine { reason: String },
}

impl CallError {
    /// Create a parse error
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Create an already-active error
    pub fn already_active(activity: impl Into<String>) -> Self {
        Self::AlreadyActive {
            activity: activity.into(),
        }
    }

    /// Create an already-stopped error
    pub fn already_stopped(activity: impl Into<String>) -> Self {
        Self::AlreadyStopped {
            activity: activity.into(),
        }
    }

    /// Create a media acquisition error
    pub fn media_acquisition(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MediaAcquisition {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a connection failure error
    pub fn connection_failed(transport: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            transport: transport.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a media engine error
    pub fn media_engine(reason: impl Into<String>) -> Self {
        Self::MediaEngine {
            reason: reason.into(),
        }
    }

    /// Whether the error is a transient race worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CallError::RenegotiationRejected { .. })
    }

    /// Whether the call or transport cannot continue after this error
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallError::RenegotiationExhausted { .. }
                | CallError::Terminated
                | CallError::ConnectionFailed { .. }
        )
    }

    /// Short category name used in structured log fields
    pub fn category(&self) -> &'static str {
        match self {
            CallError::Parse { .. } => "parse",
            CallError::AlreadyActive { .. } | CallError::AlreadyStopped { .. } => "misuse",
            CallError::MediaAcquisition { .. } => "media_acquisition",
            CallError::Unsupported { .. } => "unsupported",
            CallError::RenegotiationRejected { .. } => "renegotiation_rejected",
            CallError::RenegotiationExhausted { .. } => "renegotiation_exhausted",
            CallError::Terminated => "terminated",
            CallError::ConnectionFailed { .. } => "connection",
            CallError::InvalidConfiguration { .. } => "configuration",
            CallError::MediaEngine { .. } => "media_engine",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let rejected = CallError::RenegotiationRejected {
            reason: "already negotiating".to_string(),
        };
        assert!(rejected.is_recoverable());
        assert!(!rejected.is_terminal());

        let exhausted = CallError::RenegotiationExhausted { attempts: 30 };
        assert!(!exhausted.is_recoverable());
        assert!(exhausted.is_terminal());

        assert!(CallError::Terminated.is_terminal());
        assert!(CallError::connection_failed("ws-1", "pong timeout").is_terminal());
        assert!(!CallError::already_active("camera video").is_terminal());
    }

    #[test]
    fn test_error_display() {
        let err = CallError::media_acquisition("camera", "permission denied");
        assert_eq!(err.to_string(), "Failed to acquire camera video: permission denied");
        assert_eq!(err.category(), "media_acquisition");

        let err = CallError::RenegotiationExhausted { attempts: 3 };
        assert_eq!(err.to_string(), "Renegotiation failed after 3 attempts");
    }
}
