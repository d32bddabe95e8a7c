//! Transport keepalive: periodic probes, pong timeouts and latency statistics

pub mod monitor;
pub mod stats;

pub use monitor::{KeepaliveMonitor, KeepaliveState, KeepaliveTransport, PongHandle};
pub use stats::{LatencyReport, LatencyStats, HISTOGRAM_BUCKETS};
