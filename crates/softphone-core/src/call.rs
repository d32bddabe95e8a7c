//! Per-call entry point
//!
//! A [`CallSession`] bundles everything one call needs: its media state, the
//! renegotiation controller and the track coordinator. It is created by the
//! call-lifecycle code when a call starts and fed the call's signaling events
//! in arrival order:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use softphone_core::prelude::*;
//! # async fn example(signaling: Arc<dyn SignalingStack>, media: Arc<dyn MediaEngine>, answer: String) -> CallResult<()> {
//! let events = Arc::new(EventEmitter::new());
//! let call = CallSession::new(
//!     uuid::Uuid::new_v4(),
//!     VideoMode::Audio,
//!     signaling,
//!     media,
//!     events,
//!     PhoneConfig::default(),
//! );
//!
//! call.handle_signaling_event(SignalingEvent::sdp(SdpExchange::RemoteAnswer, answer)).await;
//! call.start_sending_video().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PhoneConfig;
use crate::error::{CallError, CallResult};
use crate::events::{CallEvent, EventEmitter};
use crate::media::MediaEngine;
use crate::renegotiation::{RenegotiationController, RenegotiationRequest, RenegotiationState};
use crate::sdp::MediaKind;
use crate::session::{CallId, CallSessionState, NegotiationUpdate, Originator, VideoMode, VideoStateSnapshot};
use crate::signaling::{ReofferOptions, SignalingEvent, SignalingStack};
use crate::tracks::TrackExchangeCoordinator;

/// State and collaborators shared by the parts of one call
pub(crate) struct CallContext {
    pub(crate) call_id: CallId,
    pub(crate) state: Mutex<CallSessionState>,
    pub(crate) media: Arc<dyn MediaEngine>,
    pub(crate) events: Arc<EventEmitter>,
    pub(crate) renegotiation: RenegotiationController,
    pub(crate) terminated: CancellationToken,
    pub(crate) config: PhoneConfig,
}

impl CallContext {
    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }

    pub(crate) fn ensure_active(&self) -> CallResult<()> {
        if self.is_terminated() {
            Err(CallError::Terminated)
        } else {
            Ok(())
        }
    }

    /// Renegotiate with the configured retry policy
    pub(crate) async fn renegotiate(&self, options: ReofferOptions) -> CallResult<u32> {
        let request = self.config.renegotiation.request(options);
        self.renegotiation.renegotiate(request).await
    }

    /// Emit the current negotiated and enabled video flags
    pub(crate) async fn emit_video_state(&self) {
        let (negotiated, enabled) = {
            let state = self.state.lock();
            (state.negotiated_video(), state.enabled_video())
        };
        self.events
            .emit(CallEvent::video_state_changed(self.call_id, negotiated, enabled))
            .await;
    }

    /// Emit events collected while the track lock was held
    pub(crate) async fn emit_all(&self, events: Vec<CallEvent>) {
        for event in events {
            self.events.emit(event).await;
        }
    }
}

/// Media side of one call
pub struct CallSession {
    ctx: Arc<CallContext>,
    tracks: Arc<TrackExchangeCoordinator>,
}

impl CallSession {
    /// Create the session for a new call
    ///
    /// A [`VideoMode::Video`] call starts with a video sender, so later camera
    /// or screen-share tracks replace onto it.
    pub fn new(
        call_id: CallId,
        video_mode: VideoMode,
        signaling: Arc<dyn SignalingStack>,
        media: Arc<dyn MediaEngine>,
        events: Arc<EventEmitter>,
        config: PhoneConfig,
    ) -> Self {
        let terminated = CancellationToken::new();
        let mut state = CallSessionState::new(call_id, video_mode);
        if video_mode == VideoMode::Video {
            state.mark_video_sent();
        }

        let renegotiation = RenegotiationController::new(call_id, signaling, events.clone(), terminated.clone());
        let ctx = Arc::new(CallContext {
            call_id,
            state: Mutex::new(state),
            media,
            events,
            renegotiation,
            terminated,
            config,
        });
        let tracks = Arc::new(TrackExchangeCoordinator::new(ctx.clone()));

        debug!(call_id = %call_id, video_mode = ?video_mode, "Call session created");
        Self { ctx, tracks }
    }

    pub fn call_id(&self) -> CallId {
        self.ctx.call_id
    }

    /// Process one signaling event
    ///
    /// Events must be passed in the order they arrived; each is fully applied
    /// before this returns.
    pub async fn handle_signaling_event(&self, event: SignalingEvent) {
        let call_id = self.ctx.call_id;
        match event {
            SignalingEvent::Sdp { exchange, sdp } => {
                let update = self.ctx.state.lock().on_offer_or_answer(exchange, &sdp);
                if let NegotiationUpdate::Updated { changed, initial } = update {
                    if changed {
                        self.ctx.emit_video_state().await;
                    }
                    if initial {
                        self.fix_up_after_first_answer().await;
                    }
                }
            }
            SignalingEvent::Hold { originator } => self.set_hold(originator, true),
            SignalingEvent::Unhold { originator } => self.set_hold(originator, false),
            SignalingEvent::Terminated => {
                debug!(call_id = %call_id, "Dialog terminated");
                self.terminate();
            }
        }
    }

    /// Align the transceiver with what the application wants when the first
    /// answer negotiated something else, e.g. a video offer answered audio-only
    async fn fix_up_after_first_answer(&self) {
        let (negotiated, enabled) = {
            let state = self.ctx.state.lock();
            (state.negotiated_video(), state.enabled_video())
        };
        if negotiated == enabled {
            return;
        }

        info!(
            call_id = %self.ctx.call_id,
            negotiated = %negotiated.direction(),
            enabled = %enabled.direction(),
            "First answer differs from enabled video, renegotiating"
        );

        if let Err(e) = self
            .ctx
            .media
            .set_transceiver_direction(MediaKind::Video, enabled.direction())
            .await
        {
            warn!(call_id = %self.ctx.call_id, error = %e, "Failed to update video transceiver direction");
            return;
        }

        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            // Exhaustion is reported through the event emitter
            if let Err(e) = ctx.renegotiate(ReofferOptions::new()).await {
                debug!(call_id = %ctx.call_id, error = %e, "Post-answer renegotiation did not complete");
            }
        });
    }

    fn set_hold(&self, originator: Originator, held: bool) {
        let mut state = self.ctx.state.lock();
        match originator {
            Originator::Local => state.set_local_hold(held),
            Originator::Remote => state.set_remote_hold(held),
        }
        debug!(call_id = %self.ctx.call_id, originator = ?originator, held = held, "Hold state changed");
    }

    /// Start sending camera video
    pub async fn start_sending_video(&self) -> CallResult<()> {
        self.tracks.start_sending_video().await
    }

    /// Stop sending video, ending a screen share if one runs
    pub async fn stop_sending_video(&self) -> CallResult<()> {
        self.tracks.stop_sending_video().await
    }

    /// Share the screen on the outgoing video slot
    pub async fn start_screen_sharing(&self) -> CallResult<()> {
        self.tracks.start_screen_sharing().await
    }

    pub async fn stop_screen_sharing(&self) -> CallResult<()> {
        self.tracks.stop_screen_sharing().await
    }

    /// Renegotiate with an explicit request
    pub async fn renegotiate(&self, request: RenegotiationRequest) -> CallResult<u32> {
        self.ctx.renegotiation.renegotiate(request).await
    }

    pub fn renegotiation_state(&self) -> RenegotiationState {
        self.ctx.renegotiation.state()
    }

    /// End the call
    ///
    /// Cancels retry delays, queued renegotiations and screen-share watchers.
    /// Operations in flight fail with [`CallError::Terminated`].
    pub fn terminate(&self) {
        if !self.ctx.terminated.is_cancelled() {
            info!(call_id = %self.ctx.call_id, "Call session terminated");
            self.ctx.terminated.cancel();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.ctx.is_terminated()
    }

    /// Copy of the current video state
    pub fn snapshot(&self) -> VideoStateSnapshot {
        self.ctx.state.lock().snapshot()
    }

    /// Copy of the full media state
    pub fn state(&self) -> CallSessionState {
        self.ctx.state.lock().clone()
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        self.ctx.terminated.cancel();
    }
}
