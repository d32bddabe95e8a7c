use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::call::CallContext;
use crate::error::{CallError, CallResult};
use crate::events::CallEvent;
use crate::media::{VideoSource, VideoSourceKind};
use crate::signaling::ReofferOptions;

const VIDEO: &str = "video";
const SCREEN_SHARING: &str = "screen sharing";

/// Occupancy of the outgoing video slot
#[derive(Debug, Default)]
struct OutgoingVideo {
    /// Camera source, kept while a screen share covers it
    camera: Option<VideoSource>,
    /// Display source of the running screen share
    screen: Option<VideoSource>,
    /// Whether camera video was being sent when the share started
    camera_before_share: bool,
    /// Whether a video sender was created on this call
    has_sender: bool,
}

/// Owns the single outgoing video sender of a call
///
/// Camera video and screen sharing compete for the same sender slot. Sources
/// are opened without holding the coordinator's lock, racing call termination.
/// The lock is then held from the precondition re-check until the slot and the
/// call state agree again, so two slot updates never interleave. Events and the
/// renegotiation that announces the change go out after the lock is released;
/// video state events carry the state at the time they are emitted.
pub struct TrackExchangeCoordinator {
    ctx: Arc<CallContext>,
    outgoing: Mutex<OutgoingVideo>,
}

impl TrackExchangeCoordinator {
    pub(crate) fn new(ctx: Arc<CallContext>) -> Self {
        Self {
            ctx,
            outgoing: Mutex::new(OutgoingVideo::default()),
        }
    }

    /// Start sending camera video
    pub async fn start_sending_video(&self) -> CallResult<()> {
        let call_id = self.ctx.call_id;
        self.ensure_can_start_video()?;
        let source = self.acquire(VideoSourceKind::Camera).await?;

        {
            let mut outgoing = self.outgoing.lock().await;
            // Things may have moved on while the camera was opening
            if let Err(e) = self.ensure_can_start_video() {
                debug!(call_id = %call_id, source = source.id(), error = %e, "Dropping camera acquired too late");
                self.ctx.media.release_source(&source).await;
                return Err(e);
            }

            let replaced = self.attach(&outgoing, &source).await?;
            info!(call_id = %call_id, source = source.id(), replaced = replaced, "Sending camera video");

            outgoing.has_sender = true;
            outgoing.camera = Some(source);
            self.ctx.state.lock().set_enabled_send(true);
        }

        self.ctx.emit_video_state().await;
        self.ctx.renegotiate(ReofferOptions::new()).await.map(|_| ())
    }

    /// Stop sending video
    ///
    /// A running screen share ends with it; the camera is not restored.
    pub async fn stop_sending_video(&self) -> CallResult<()> {
        let call_id = self.ctx.call_id;
        let events = {
            let mut outgoing = self.outgoing.lock().await;
            self.ctx.ensure_active()?;
            if !self.ctx.state.lock().enabled_video().send {
                return Err(CallError::already_stopped(VIDEO));
            }

            self.ctx.media.remove_outgoing_video().await?;

            let mut events = Vec::new();
            if let Some(screen) = outgoing.screen.take() {
                self.ctx.media.release_source(&screen).await;
                screen.end_capture();
                outgoing.camera_before_share = false;
                self.ctx.state.lock().set_screen_sharing(false);
                events.push(CallEvent::screen_sharing_ended(call_id));
            }
            if let Some(camera) = outgoing.camera.take() {
                self.ctx.media.release_source(&camera).await;
            }

            {
                let mut state = self.ctx.state.lock();
                state.mark_video_sent();
                state.set_enabled_send(false);
            }
            info!(call_id = %call_id, "Stopped sending video");
            events
        };

        self.ctx.emit_all(events).await;
        self.ctx.emit_video_state().await;
        self.ctx.renegotiate(ReofferOptions::new()).await.map(|_| ())
    }

    /// Replace outgoing video with a display capture
    ///
    /// When the user ends the capture from outside (the operating system's
    /// sharing controls), the share is cleaned up automatically and camera
    /// video, if it was running, comes back.
    pub async fn start_screen_sharing(self: &Arc<Self>) -> CallResult<()> {
        let call_id = self.ctx.call_id;
        self.ensure_can_start_sharing()?;
        let source = self.acquire(VideoSourceKind::Display).await?;

        {
            let mut outgoing = self.outgoing.lock().await;
            if let Err(e) = self.ensure_can_start_sharing() {
                debug!(call_id = %call_id, source = source.id(), error = %e, "Dropping display acquired too late");
                self.ctx.media.release_source(&source).await;
                return Err(e);
            }

            // Covers a camera started here as well as the initial sender of a video call
            let camera_active = {
                let state = self.ctx.state.lock();
                state.enabled_video().send && !state.is_screen_sharing()
            };
            let replaced = self.attach(&outgoing, &source).await?;
            info!(
                call_id = %call_id,
                source = source.id(),
                replaced = replaced,
                camera_active = camera_active,
                "Screen sharing started"
            );

            outgoing.has_sender = true;
            outgoing.camera_before_share = camera_active;
            outgoing.screen = Some(source.clone());
            {
                let mut state = self.ctx.state.lock();
                state.set_screen_sharing(true);
                state.set_enabled_send(true);
            }
            self.watch_capture_end(source);
        }

        self.ctx.emit_video_state().await;
        self.ctx
            .renegotiate(self.screen_share_options(true))
            .await
            .map(|_| ())
    }

    /// End the running screen share
    ///
    /// The remote party is told the share ended even when putting the camera
    /// back failed; that failure is returned afterwards.
    pub async fn stop_screen_sharing(&self) -> CallResult<()> {
        let (ended, events) = {
            let mut outgoing = self.outgoing.lock().await;
            if outgoing.screen.is_none() {
                return Err(CallError::already_stopped(SCREEN_SHARING));
            }
            let mut events = Vec::new();
            let ended = self.end_screen_sharing(&mut outgoing, &mut events).await;
            (ended, events)
        };

        self.ctx.emit_all(events).await;
        self.ctx.emit_video_state().await;
        let renegotiated = self.ctx.renegotiate(self.screen_share_options(false)).await;
        ended?;
        renegotiated.map(|_| ())
    }

    fn ensure_can_start_video(&self) -> CallResult<()> {
        self.ctx.ensure_active()?;
        if self.ctx.state.lock().enabled_video().send {
            return Err(CallError::already_active(VIDEO));
        }
        Ok(())
    }

    fn ensure_can_start_sharing(&self) -> CallResult<()> {
        self.ctx.ensure_active()?;
        if self.ctx.state.lock().is_screen_sharing() {
            return Err(CallError::already_active(SCREEN_SHARING));
        }
        if !self.ctx.media.supports_display_capture() {
            return Err(CallError::unsupported(SCREEN_SHARING));
        }
        Ok(())
    }

    /// Open a source, giving up as soon as the call terminates
    async fn acquire(&self, kind: VideoSourceKind) -> CallResult<VideoSource> {
        let media = &self.ctx.media;
        let acquisition = async move {
            match kind {
                VideoSourceKind::Camera => media.acquire_camera_video().await,
                VideoSourceKind::Display => media.acquire_display_video().await,
            }
        };

        let source = tokio::select! {
            biased;
            _ = self.ctx.terminated.cancelled() => {
                debug!(call_id = %self.ctx.call_id, kind = %kind, "Call ended while acquiring video source");
                return Err(CallError::Terminated);
            }
            source = acquisition => source?,
        };
        debug!(call_id = %self.ctx.call_id, source = source.id(), kind = %source.kind(), "Video source acquired");
        Ok(source)
    }

    /// Put a freshly acquired source on the slot, releasing it on failure
    async fn attach(&self, outgoing: &OutgoingVideo, source: &VideoSource) -> CallResult<bool> {
        let had_prior_video = self.had_prior_video(outgoing);
        match self.ctx.media.add_or_replace_outgoing_video(had_prior_video, source).await {
            Ok(replaced) => Ok(replaced),
            Err(e) => {
                self.ctx.media.release_source(source).await;
                Err(e)
            }
        }
    }

    fn had_prior_video(&self, outgoing: &OutgoingVideo) -> bool {
        outgoing.has_sender || self.ctx.state.lock().was_video_sent_before()
    }

    fn screen_share_options(&self, sharing: bool) -> ReofferOptions {
        ReofferOptions::new().with_header(
            &self.ctx.config.screen_share_header,
            if sharing { "true" } else { "false" },
        )
    }

    fn watch_capture_end(self: &Arc<Self>, source: VideoSource) {
        let coordinator = Arc::clone(self);
        let terminated = self.ctx.terminated.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = terminated.cancelled() => return,
                _ = source.capture_ended() => {}
            }

            let (ended, events) = {
                let mut outgoing = coordinator.outgoing.lock().await;
                // Already cleaned up, or a newer share took the slot
                if !outgoing.screen.as_ref().is_some_and(|screen| screen.id() == source.id()) {
                    return;
                }
                debug!(call_id = %coordinator.ctx.call_id, source = source.id(), "Display capture ended");
                let mut events = Vec::new();
                let ended = coordinator.end_screen_sharing(&mut outgoing, &mut events).await;
                (ended, events)
            };

            coordinator.ctx.emit_all(events).await;
            coordinator.ctx.emit_video_state().await;
            let renegotiated = coordinator
                .ctx
                .renegotiate(coordinator.screen_share_options(false))
                .await;
            if let Err(e) = ended.and(renegotiated.map(|_| ())) {
                warn!(
                    call_id = %coordinator.ctx.call_id,
                    error = %e,
                    "Automatic screen sharing cleanup failed"
                );
            }
        });
    }

    /// Release the display source and give the slot back
    ///
    /// Camera video that was running before the share is put back with a
    /// replace, otherwise outgoing video is removed. If the camera cannot be
    /// put back, outgoing video is removed as well and the error returned. The
    /// call state is consistent with the slot either way. Does nothing without
    /// a running share.
    async fn end_screen_sharing(&self, outgoing: &mut OutgoingVideo, events: &mut Vec<CallEvent>) -> CallResult<()> {
        let Some(screen) = outgoing.screen.take() else {
            return Ok(());
        };
        let call_id = self.ctx.call_id;

        self.ctx.media.release_source(&screen).await;
        screen.end_capture();

        let restore = std::mem::take(&mut outgoing.camera_before_share);
        let result = if restore {
            self.restore_camera(outgoing).await
        } else {
            self.ctx.media.remove_outgoing_video().await
        };

        let restored = restore && result.is_ok();
        if restore && !restored {
            if let Err(e) = self.ctx.media.remove_outgoing_video().await {
                warn!(call_id = %call_id, error = %e, "Failed to clear outgoing video after camera restore failed");
            }
            if let Some(camera) = outgoing.camera.take() {
                self.ctx.media.release_source(&camera).await;
            }
        }

        {
            let mut state = self.ctx.state.lock();
            state.set_screen_sharing(false);
            state.mark_video_sent();
            if !restored {
                state.set_enabled_send(false);
            }
        }
        info!(call_id = %call_id, camera_restored = restored, "Screen sharing ended");

        events.push(CallEvent::screen_sharing_ended(call_id));
        result
    }

    /// Put camera video back on the slot
    ///
    /// A video call's initial camera track belongs to the media engine, so a
    /// camera is opened here when none was started through this coordinator.
    async fn restore_camera(&self, outgoing: &mut OutgoingVideo) -> CallResult<()> {
        let camera = match outgoing.camera.take() {
            Some(camera) => camera,
            None => self.acquire(VideoSourceKind::Camera).await?,
        };
        let attached = self.ctx.media.add_or_replace_outgoing_video(true, &camera).await;
        outgoing.camera = Some(camera);
        attached.map(|_| ())
    }
}
