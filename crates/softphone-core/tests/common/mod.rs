//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use softphone_core::prelude::*;

/// Signaling stack answering re-offers from a script
pub struct MockSignaling {
    script: Mutex<VecDeque<ReofferOutcome>>,
    fallback: ReofferOutcome,
    requests: Mutex<Vec<(Instant, ReofferOptions)>>,
}

impl MockSignaling {
    pub fn accepting() -> Arc<Self> {
        Self::scripted(Vec::new(), ReofferOutcome::Accepted)
    }

    pub fn rejecting() -> Arc<Self> {
        Self::scripted(Vec::new(), rejected())
    }

    /// Play `script` first, then answer every request with `fallback`
    pub fn scripted(script: Vec<ReofferOutcome>, fallback: ReofferOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().iter().map(|(at, _)| *at).collect()
    }

    pub fn requests(&self) -> Vec<ReofferOptions> {
        self.requests.lock().iter().map(|(_, options)| options.clone()).collect()
    }

    pub fn last_request(&self) -> Option<ReofferOptions> {
        self.requests.lock().last().map(|(_, options)| options.clone())
    }
}

pub fn rejected() -> ReofferOutcome {
    ReofferOutcome::Rejected {
        reason: "491 Request Pending".to_string(),
    }
}

#[async_trait]
impl SignalingStack for MockSignaling {
    async fn request_reoffer(&self, options: &ReofferOptions) -> ReofferOutcome {
        self.requests.lock().push((Instant::now(), options.clone()));
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Everything the call layer asked the media engine to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    AcquireCamera,
    AcquireDisplay,
    AddOrReplace { had_prior_video: bool, source: String },
    Remove,
    Direction(MediaKind, MediaDirection),
    Release(String),
}

/// Media engine recording its calls
pub struct MockMedia {
    supports_display: bool,
    camera_error: Option<CallError>,
    camera_replace_error: Option<CallError>,
    acquire_delay: Duration,
    next_id: AtomicUsize,
    calls: Mutex<Vec<MediaCall>>,
    displays: Mutex<Vec<VideoSource>>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self {
            supports_display: true,
            camera_error: None,
            camera_replace_error: None,
            acquire_delay: Duration::ZERO,
            next_id: AtomicUsize::new(1),
            calls: Mutex::new(Vec::new()),
            displays: Mutex::new(Vec::new()),
        }
    }

    pub fn without_display_capture(mut self) -> Self {
        self.supports_display = false;
        self
    }

    pub fn with_camera_error(mut self, error: CallError) -> Self {
        self.camera_error = Some(error);
        self
    }

    /// Fail every attempt to replace a camera track onto an existing sender
    pub fn with_camera_replace_error(mut self, error: CallError) -> Self {
        self.camera_replace_error = Some(error);
        self
    }

    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Most recently acquired display source
    pub fn last_display(&self) -> Option<VideoSource> {
        self.displays.lock().last().cloned()
    }

    fn record(&self, call: MediaCall) {
        self.calls.lock().push(call);
    }

    async fn acquire(&self, kind: VideoSourceKind) -> VideoSource {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        VideoSource::new(format!("{}-{}", kind, id), kind)
    }
}

#[async_trait]
impl MediaEngine for MockMedia {
    async fn acquire_camera_video(&self) -> CallResult<VideoSource> {
        self.record(MediaCall::AcquireCamera);
        if let Some(error) = &self.camera_error {
            return Err(error.clone());
        }
        Ok(self.acquire(VideoSourceKind::Camera).await)
    }

    async fn acquire_display_video(&self) -> CallResult<VideoSource> {
        self.record(MediaCall::AcquireDisplay);
        let source = self.acquire(VideoSourceKind::Display).await;
        self.displays.lock().push(source.clone());
        Ok(source)
    }

    fn supports_display_capture(&self) -> bool {
        self.supports_display
    }

    async fn add_or_replace_outgoing_video(&self, had_prior_video: bool, source: &VideoSource) -> CallResult<bool> {
        self.record(MediaCall::AddOrReplace {
            had_prior_video,
            source: source.id().to_string(),
        });
        if had_prior_video && source.kind() == VideoSourceKind::Camera {
            if let Some(error) = &self.camera_replace_error {
                return Err(error.clone());
            }
        }
        Ok(had_prior_video)
    }

    async fn remove_outgoing_video(&self) -> CallResult<()> {
        self.record(MediaCall::Remove);
        Ok(())
    }

    async fn set_transceiver_direction(&self, kind: MediaKind, direction: MediaDirection) -> CallResult<()> {
        self.record(MediaCall::Direction(kind, direction));
        Ok(())
    }

    async fn release_source(&self, source: &VideoSource) {
        self.record(MediaCall::Release(source.id().to_string()));
    }
}

const SESSION_HEADER: &str = "v=0\r\n\
    o=- 1857034225 1 IN IP4 198.51.100.7\r\n\
    s=-\r\n\
    c=IN IP4 198.51.100.7\r\n\
    t=0 0\r\n\
    m=audio 40000 RTP/AVP 0\r\n\
    a=rtpmap:0 PCMU/8000\r\n\
    a=sendrecv\r\n";

/// Session description with an audio line and a video line in `video` direction
pub fn sdp_with_video(video: &str) -> String {
    format!(
        "{}m=video 40002 RTP/AVP 96\r\na=rtpmap:96 VP8/90000\r\na={}\r\n",
        SESSION_HEADER, video
    )
}

/// Session description without a video line
pub fn audio_only_sdp() -> String {
    SESSION_HEADER.to_string()
}

pub struct TestCall {
    pub call: CallSession,
    pub signaling: Arc<MockSignaling>,
    pub media: Arc<MockMedia>,
    pub events: broadcast::Receiver<CallEvent>,
}

pub fn test_config() -> PhoneConfig {
    PhoneConfig::default().with_retry_policy(3, Duration::from_millis(50))
}

pub fn new_call(mode: VideoMode, signaling: Arc<MockSignaling>, media: MockMedia) -> TestCall {
    let media = Arc::new(media);
    let emitter = Arc::new(EventEmitter::new());
    let events = emitter.subscribe();
    let call = CallSession::new(
        uuid::Uuid::new_v4(),
        mode,
        signaling.clone(),
        media.clone(),
        emitter,
        test_config(),
    );
    TestCall {
        call,
        signaling,
        media,
        events,
    }
}

/// Events received so far, without waiting
pub fn drain(events: &mut broadcast::Receiver<CallEvent>) -> Vec<CallEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

/// Poll `condition` until it holds, failing the test after a few seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}
