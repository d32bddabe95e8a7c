//! Application-facing events
//!
//! Everything the call layer reports upward is a [`CallEvent`]. Applications
//! either implement [`CallEventHandler`] (every method has a no-op default, so
//! only the interesting ones need overriding) or take a broadcast receiver from
//! [`EventEmitter::subscribe`].
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use softphone_core::events::{CallEventHandler, EventEmitter};
//! use softphone_core::session::{CallId, VideoFlags};
//! use std::sync::Arc;
//!
//! struct VideoLogger;
//!
//! #[async_trait]
//! impl CallEventHandler for VideoLogger {
//!     async fn on_video_state_changed(&self, call_id: CallId, negotiated: VideoFlags, enabled: VideoFlags) {
//!         println!("{}: negotiated {} enabled {}", call_id, negotiated.direction(), enabled.direction());
//!     }
//! }
//!
//! let emitter = EventEmitter::new();
//! emitter.add_handler(Arc::new(VideoLogger));
//! assert_eq!(emitter.handler_count(), 1);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::CallError;
use crate::keepalive::LatencyReport;
use crate::session::{CallId, VideoFlags};

/// Capacity of the broadcast channel behind [`EventEmitter::subscribe`]
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events produced by the call layer
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Negotiated or enabled video flags changed
    VideoStateChanged {
        call_id: CallId,
        negotiated: VideoFlags,
        enabled: VideoFlags,
        timestamp: DateTime<Utc>,
    },
    /// A renegotiation gave up; the call should be terminated
    RenegotiationFailed {
        call_id: CallId,
        error: CallError,
        timestamp: DateTime<Utc>,
    },
    /// Screen sharing stopped, by the user or explicitly
    ScreenSharingEnded {
        call_id: CallId,
        timestamp: DateTime<Utc>,
    },
    /// Aggregated keepalive latency for a transport
    KeepaliveStatsReport {
        transport: String,
        report: LatencyReport,
    },
    /// Keepalive declared a transport dead
    ConnectionFailed {
        transport: String,
        error: CallError,
        timestamp: DateTime<Utc>,
    },
}

impl CallEvent {
    pub fn video_state_changed(call_id: CallId, negotiated: VideoFlags, enabled: VideoFlags) -> Self {
        CallEvent::VideoStateChanged {
            call_id,
            negotiated,
            enabled,
            timestamp: Utc::now(),
        }
    }

    pub fn renegotiation_failed(call_id: CallId, error: CallError) -> Self {
        CallEvent::RenegotiationFailed {
            call_id,
            error,
            timestamp: Utc::now(),
        }
    }

    pub fn screen_sharing_ended(call_id: CallId) -> Self {
        CallEvent::ScreenSharingEnded {
            call_id,
            timestamp: Utc::now(),
        }
    }

    pub fn connection_failed(transport: impl Into<String>, error: CallError) -> Self {
        CallEvent::ConnectionFailed {
            transport: transport.into(),
            error,
            timestamp: Utc::now(),
        }
    }

    /// Call the event belongs to, if any
    ///
    /// Keepalive events belong to a transport, not a call.
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            CallEvent::VideoStateChanged { call_id, .. }
            | CallEvent::RenegotiationFailed { call_id, .. }
            | CallEvent::ScreenSharingEnded { call_id, .. } => Some(*call_id),
            CallEvent::KeepaliveStatsReport { .. } | CallEvent::ConnectionFailed { .. } => None,
        }
    }
}

/// Receiver of call layer events
///
/// Implement the methods you care about; [`CallEventHandler::on_event`]
/// routes each event to its method.
#[async_trait]
pub trait CallEventHandler: Send + Sync {
    async fn on_video_state_changed(&self, _call_id: CallId, _negotiated: VideoFlags, _enabled: VideoFlags) {}

    /// The call cannot renegotiate anymore and should be hung up
    async fn on_renegotiation_failed(&self, _call_id: CallId, _error: CallError) {}

    async fn on_screen_sharing_ended(&self, _call_id: CallId) {}

    async fn on_keepalive_stats_report(&self, _transport: String, _report: LatencyReport) {}

    /// The transport is dead; reconnecting is up to the signaling stack
    async fn on_connection_failed(&self, _transport: String, _error: CallError) {}

    /// Dispatch an event to the matching method
    async fn on_event(&self, event: CallEvent) {
        match event {
            CallEvent::VideoStateChanged {
                call_id,
                negotiated,
                enabled,
                ..
            } => self.on_video_state_changed(call_id, negotiated, enabled).await,
            CallEvent::RenegotiationFailed { call_id, error, .. } => {
                self.on_renegotiation_failed(call_id, error).await
            }
            CallEvent::ScreenSharingEnded { call_id, .. } => self.on_screen_sharing_ended(call_id).await,
            CallEvent::KeepaliveStatsReport { transport, report } => {
                self.on_keepalive_stats_report(transport, report).await
            }
            CallEvent::ConnectionFailed { transport, error, .. } => {
                self.on_connection_failed(transport, error).await
            }
        }
    }
}

/// Fans events out to handlers and broadcast subscribers
pub struct EventEmitter {
    handlers: RwLock<Vec<Arc<dyn CallEventHandler>>>,
    sender: broadcast::Sender<CallEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            handlers: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Register a handler for all future events
    pub fn add_handler(&self, handler: Arc<dyn CallEventHandler>) {
        self.handlers.write().push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Receive all future events on a channel
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.sender.subscribe()
    }

    /// Deliver an event
    ///
    /// Handlers are awaited one after another so they observe events in
    /// emission order.
    pub async fn emit(&self, event: CallEvent) {
        tracing::trace!(?event, "Emitting call event");

        // No subscribers is fine
        let _ = self.sender.send(event.clone());

        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler.on_event(event.clone()).await;
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        video: AtomicUsize,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl CallEventHandler for CountingHandler {
        async fn on_video_state_changed(&self, _call_id: CallId, _negotiated: VideoFlags, _enabled: VideoFlags) {
            self.video.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_renegotiation_failed(&self, _call_id: CallId, _error: CallError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_emit_dispatches_to_handlers_and_subscribers() {
        let emitter = EventEmitter::new();
        let handler = Arc::new(CountingHandler::default());
        emitter.add_handler(handler.clone());
        let mut rx = emitter.subscribe();

        let call_id = uuid::Uuid::new_v4();
        emitter
            .emit(CallEvent::video_state_changed(call_id, VideoFlags::new(true, true), VideoFlags::new(true, false)))
            .await;
        emitter
            .emit(CallEvent::renegotiation_failed(call_id, CallError::RenegotiationExhausted { attempts: 3 }))
            .await;
        emitter.emit(CallEvent::screen_sharing_ended(call_id)).await;

        assert_eq!(handler.video.load(Ordering::SeqCst), 1);
        assert_eq!(handler.failures.load(Ordering::SeqCst), 1);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, CallEvent::VideoStateChanged { .. }));
        assert_eq!(first.call_id(), Some(call_id));
        assert!(matches!(rx.recv().await.unwrap(), CallEvent::RenegotiationFailed { .. }));
        assert!(matches!(rx.recv().await.unwrap(), CallEvent::ScreenSharingEnded { .. }));
    }

    #[tokio::test]
    async fn test_emit_without_listeners() {
        let emitter = EventEmitter::default();
        emitter
            .emit(CallEvent::connection_failed("ws-0", CallError::connection_failed("ws-0", "pong timeout")))
            .await;
        assert_eq!(emitter.handler_count(), 0);
    }
}
