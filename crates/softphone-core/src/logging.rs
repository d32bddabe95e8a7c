//! Log output for applications embedding the call layer
//!
//! The crate itself only emits `tracing` events. [`init_logging`] installs a
//! global fmt subscriber from the `logging` section of a [`PhoneConfig`]:
//!
//! ```json
//! { "logging": { "level": "info", "directives": ["softphone_core::keepalive=debug"] } }
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::PhoneConfig;
use crate::error::{CallError, CallResult};

/// The `logging` section of [`PhoneConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level for everything not matched by a directive
    pub level: String,
    /// Per-target overrides in `RUST_LOG` syntax, e.g. `softphone_core::renegotiation=debug`
    pub directives: Vec<String>,
    /// JSON lines instead of human readable output
    pub json: bool,
    /// Include file and line of each event
    pub file_info: bool,
    /// Log span enter/exit
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            json: false,
            file_info: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Add a per-target override
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Build the filter: `RUST_LOG`, then the base level, then the directives
    pub fn env_filter(&self) -> CallResult<EnvFilter> {
        let level = parse_log_level(&self.level)?;
        let mut filter = EnvFilter::from_default_env().add_directive(level.into());
        for directive in &self.directives {
            filter = filter.add_directive(parse_directive(directive)?);
        }
        Ok(filter)
    }

    pub fn validate(&self) -> CallResult<()> {
        parse_log_level(&self.level)?;
        for directive in &self.directives {
            parse_directive(directive)?;
        }
        Ok(())
    }
}

/// Install a global fmt subscriber configured by `config.logging`
///
/// Fails with [`CallError::InvalidConfiguration`] on a bad level or directive,
/// or when a global subscriber is already installed.
pub fn init_logging(config: &PhoneConfig) -> CallResult<()> {
    let logging = &config.logging;
    let filter = logging.env_filter()?;

    let span_events = if logging.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(logging.file_info)
        .with_line_number(logging.file_info);

    let installed = if logging.json {
        subscriber.with_writer(std::io::stdout).json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| CallError::invalid_config("logging", e.to_string()))?;

    tracing::info!(
        version = crate::VERSION,
        repeat_limit = config.renegotiation.repeat_limit,
        retry_delay_ms = config.renegotiation.retry_delay_ms,
        ping_interval_ms = config.keepalive.ping_interval_ms,
        pong_timeout_ms = config.keepalive.pong_timeout_ms,
        "Call layer logging initialized"
    );
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> CallResult<Level> {
    Level::from_str(level)
        .map_err(|_| CallError::invalid_config("logging.level", format!("Invalid log level: {}", level)))
}

fn parse_directive(directive: &str) -> CallResult<Directive> {
    directive
        .parse()
        .map_err(|e| CallError::invalid_config("logging.directives", format!("{:?}: {}", directive, e)))
}
