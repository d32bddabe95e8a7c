//! Configuration for the call layer
//!
//! [`PhoneConfig`] groups the renegotiation retry policy, the keepalive
//! settings, the header used to tag screen-share renegotiations and the log
//! output (see [`crate::logging`]). All
//! structures deserialize with defaults for missing fields, so a partial JSON
//! document is enough:
//!
//! ```rust
//! use softphone_core::config::PhoneConfig;
//!
//! let config = PhoneConfig::from_json(r#"{ "keepalive": { "ping_interval_ms": 1000 } }"#).unwrap();
//! assert_eq!(config.keepalive.ping_interval_ms, 1000);
//! assert_eq!(config.renegotiation.repeat_limit, 30);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CallError, CallResult};
use crate::logging::LoggingConfig;
use crate::renegotiation::RenegotiationRequest;
use crate::signaling::ReofferOptions;

/// Default number of renegotiation attempts
pub const DEFAULT_REPEAT_LIMIT: u32 = 30;

/// Default delay between renegotiation attempts
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Default header marking screen-share renegotiations
pub const DEFAULT_SCREEN_SHARE_HEADER: &str = "X-Screen-Sharing";

/// Renegotiation retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenegotiationConfig {
    /// Attempts before giving up
    pub repeat_limit: u32,
    /// Fixed delay between attempts, in milliseconds
    pub retry_delay_ms: u64,
    /// Ask the signaling stack for UPDATE instead of re-INVITE
    pub use_update: bool,
}

impl Default for RenegotiationConfig {
    fn default() -> Self {
        Self {
            repeat_limit: DEFAULT_REPEAT_LIMIT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            use_update: false,
        }
    }
}

impl RenegotiationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// A request using this policy with the given options
    pub fn request(&self, options: ReofferOptions) -> RenegotiationRequest {
        RenegotiationRequest::new(options.with_update(self.use_update))
            .with_repeat_limit(self.repeat_limit)
            .with_retry_delay(self.retry_delay())
    }
}

/// Transport keepalive settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Probe interval in milliseconds; 0 disables keepalive
    pub ping_interval_ms: u64,
    /// Time to wait for a pong in milliseconds; 0 disables pong checking
    pub pong_timeout_ms: u64,
    /// Pongs per statistics report; 0 disables statistics
    pub stats_sample_count: u32,
    /// Keep a latency histogram in the statistics reports
    pub latency_histogram: bool,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 15_000,
            pong_timeout_ms: 5_000,
            stats_sample_count: 0,
            latency_histogram: false,
        }
    }
}

impl KeepaliveConfig {
    /// Keepalive switched off
    pub fn disabled() -> Self {
        Self {
            ping_interval_ms: 0,
            ..Self::default()
        }
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Report statistics every `samples` pongs, optionally with a histogram
    pub fn with_stats(mut self, samples: u32, histogram: bool) -> Self {
        self.stats_sample_count = samples;
        self.latency_histogram = histogram;
        self
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.ping_interval_ms > 0
    }

    pub fn stats_enabled(&self) -> bool {
        self.stats_sample_count > 0
    }
}

/// Complete configuration of the call layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    /// Renegotiation retry policy
    pub renegotiation: RenegotiationConfig,
    /// Transport keepalive
    pub keepalive: KeepaliveConfig,
    /// Header name tagging screen-share renegotiations
    pub screen_share_header: String,
    /// Log output, applied by [`crate::logging::init_logging`]
    pub logging: LoggingConfig,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            renegotiation: RenegotiationConfig::default(),
            keepalive: KeepaliveConfig::default(),
            screen_share_header: DEFAULT_SCREEN_SHARE_HEADER.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PhoneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document and validate it
    pub fn from_json(json: &str) -> CallResult<Self> {
        let config: PhoneConfig = serde_json::from_str(json)
            .map_err(|e| CallError::invalid_config("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_renegotiation(mut self, renegotiation: RenegotiationConfig) -> Self {
        self.renegotiation = renegotiation;
        self
    }

    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set the retry policy in one go
    pub fn with_retry_policy(mut self, repeat_limit: u32, retry_delay: Duration) -> Self {
        self.renegotiation.repeat_limit = repeat_limit;
        self.renegotiation.retry_delay_ms = retry_delay.as_millis() as u64;
        self
    }

    pub fn with_screen_share_header(mut self, header: impl Into<String>) -> Self {
        self.screen_share_header = header.into();
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> CallResult<()> {
        if self.renegotiation.repeat_limit == 0 {
            return Err(CallError::invalid_config(
                "renegotiation.repeat_limit",
                "must allow at least one attempt",
            ));
        }

        let header = self.screen_share_header.as_str();
        if header.is_empty() || header.chars().any(|c| c == ':' || c.is_whitespace()) {
            return Err(CallError::invalid_config(
                "screen_share_header",
                format!("{:?} is not a valid header name", header),
            ));
        }

        if self.keepalive.latency_histogram && self.keepalive.pong_timeout_ms == 0 {
            return Err(CallError::invalid_config(
                "keepalive.latency_histogram",
                "histogram buckets are derived from pong_timeout_ms, which is 0",
            ));
        }

        self.logging.validate()
    }
}
