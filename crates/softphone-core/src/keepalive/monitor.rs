//! Per-transport keepalive task
//!
//! A [`KeepaliveMonitor`] owns one background task that sends a probe every
//! ping interval and, while pong checking is on, arms a single pong timer per
//! outstanding probe. Pongs are fed in through [`KeepaliveMonitor::pong_received`]
//! or a cloned [`PongHandle`].
//!
//! A peer that has never answered a single probe is assumed not to implement
//! pongs at all: the first timeout switches pong checking off for good and the
//! probes keep going. Once a pong has been seen, a timeout means the transport
//! is dead; it is closed and a [`CallEvent::ConnectionFailed`] is emitted.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stats::LatencyStats;
use crate::config::KeepaliveConfig;
use crate::error::{CallError, CallResult};
use crate::events::{CallEvent, EventEmitter};

/// Connection the monitor probes
#[async_trait]
pub trait KeepaliveTransport: Send + Sync {
    /// Identifier used in logs and events
    fn id(&self) -> &str;

    /// Send one probe frame
    async fn send_ping(&self) -> CallResult<()>;

    /// Close the connection after a confirmed failure
    async fn close(&self, reason: &str);
}

/// Lifecycle of a keepalive monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveState {
    /// Ping interval is zero; nothing runs
    Disabled,
    /// Running, no probe sent yet
    Armed,
    /// A probe is out and the pong timer is running
    AwaitingPong,
    /// Running with no pong timer outstanding
    Idle,
    /// The transport was declared dead and closed
    ConnectionFailed,
    /// Stopped by the owner
    Stopped,
}

impl KeepaliveState {
    /// Whether the monitor task has finished
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            KeepaliveState::Disabled | KeepaliveState::ConnectionFailed | KeepaliveState::Stopped
        )
    }
}

/// Cloneable sender for pong notifications
#[derive(Debug, Clone)]
pub struct PongHandle {
    sender: mpsc::UnboundedSender<Instant>,
}

impl PongHandle {
    /// Report a pong observed now
    pub fn pong_received(&self) {
        // The task may already be gone after a failure
        let _ = self.sender.send(Instant::now());
    }
}

/// Liveness watchdog for one transport
pub struct KeepaliveMonitor {
    transport_id: String,
    pongs: PongHandle,
    state: watch::Receiver<KeepaliveState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl KeepaliveMonitor {
    /// Start monitoring `transport`
    ///
    /// Must be called from within a tokio runtime. With a zero ping interval
    /// no task is spawned and the monitor stays [`KeepaliveState::Disabled`].
    pub fn start(
        transport: Arc<dyn KeepaliveTransport>,
        config: KeepaliveConfig,
        events: Arc<EventEmitter>,
    ) -> Self {
        let transport_id = transport.id().to_string();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        if !config.is_enabled() {
            debug!(transport = %transport_id, "Keepalive disabled");
            let (_, state) = watch::channel(KeepaliveState::Disabled);
            return Self {
                transport_id,
                pongs: PongHandle { sender: pong_tx },
                state,
                cancel,
                task: None,
            };
        }

        let (state_tx, state) = watch::channel(KeepaliveState::Armed);
        info!(
            transport = %transport_id,
            ping_interval_ms = config.ping_interval_ms,
            pong_timeout_ms = config.pong_timeout_ms,
            "Starting keepalive"
        );

        let task = MonitorTask {
            transport,
            stats: config.stats_enabled().then(|| {
                LatencyStats::new(config.stats_sample_count, config.pong_timeout(), config.latency_histogram)
            }),
            pong_checks: !config.pong_timeout().is_zero(),
            config,
            events,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run(pong_rx));

        Self {
            transport_id,
            pongs: PongHandle { sender: pong_tx },
            state,
            cancel,
            task: Some(handle),
        }
    }

    pub fn transport_id(&self) -> &str {
        &self.transport_id
    }

    /// Report a pong observed now
    pub fn pong_received(&self) {
        self.pongs.pong_received();
    }

    /// Handle for delivering pongs from elsewhere, e.g. the transport reader
    pub fn pong_handle(&self) -> PongHandle {
        self.pongs.clone()
    }

    pub fn state(&self) -> KeepaliveState {
        *self.state.borrow()
    }

    /// Wait until the monitor reaches `target` (or any final state)
    pub async fn wait_for_state(&mut self, target: KeepaliveState) -> KeepaliveState {
        let reached = self
            .state
            .wait_for(|state| *state == target || state.is_final())
            .await
            .map(|state| *state);
        // Sender dropped: the task is gone, report what it left behind
        reached.unwrap_or_else(|_| *self.state.borrow())
    }

    /// Stop the task and wait for it to finish
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(transport = %self.transport_id, error = %e, "Keepalive task ended abnormally");
            }
        }
    }
}

impl Drop for KeepaliveMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct MonitorTask {
    transport: Arc<dyn KeepaliveTransport>,
    config: KeepaliveConfig,
    events: Arc<EventEmitter>,
    state: watch::Sender<KeepaliveState>,
    cancel: CancellationToken,
    stats: Option<LatencyStats>,
    pong_checks: bool,
}

impl MonitorTask {
    async fn run(mut self, mut pongs: mpsc::UnboundedReceiver<Instant>) {
        let transport_id = self.transport.id().to_string();
        let interval = self.config.ping_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pong_timer: Option<Pin<Box<Sleep>>> = None;
        let mut pong_seen = false;
        // Probe that armed the outstanding timer, else the latest probe
        let mut armed_probe: Option<Instant> = None;
        let mut last_probe: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(transport = %transport_id, "Keepalive stopped");
                    self.set_state(KeepaliveState::Stopped);
                    break;
                }

                _ = ticker.tick() => {
                    let sent_at = Instant::now();
                    if let Err(e) = self.transport.send_ping().await {
                        self.fail(&transport_id, format!("failed to send probe: {}", e)).await;
                        break;
                    }
                    last_probe = Some(sent_at);
                    debug!(transport = %transport_id, "Sent keepalive probe");

                    if self.pong_checks && pong_timer.is_none() {
                        pong_timer = Some(Box::pin(tokio::time::sleep(self.config.pong_timeout())));
                        armed_probe = Some(sent_at);
                        self.set_state(KeepaliveState::AwaitingPong);
                    }
                }

                _ = async {
                    if let Some(timer) = pong_timer.as_mut() {
                        timer.await;
                    }
                }, if pong_timer.is_some() => {
                    pong_timer = None;
                    armed_probe = None;

                    if !pong_seen {
                        warn!(
                            transport = %transport_id,
                            "No pong ever received, peer does not answer probes; disabling pong timeout"
                        );
                        self.pong_checks = false;
                        self.set_state(KeepaliveState::Idle);
                    } else {
                        self.fail(&transport_id, "pong timeout".to_string()).await;
                        break;
                    }
                }

                pong = pongs.recv() => {
                    let Some(received_at) = pong else {
                        self.set_state(KeepaliveState::Stopped);
                        break;
                    };

                    pong_timer = None;
                    let probe = armed_probe.take().or(last_probe);

                    if !pong_seen {
                        pong_seen = true;
                        info!(transport = %transport_id, "Peer answers keepalive probes");
                    }

                    if let (Some(stats), Some(probe)) = (self.stats.as_mut(), probe) {
                        let latency = received_at.saturating_duration_since(probe);
                        if let Some(report) = stats.record(latency) {
                            debug!(
                                transport = %transport_id,
                                min_ms = report.min.as_millis() as u64,
                                max_ms = report.max.as_millis() as u64,
                                samples = report.samples,
                                "Keepalive latency report"
                            );
                            self.events
                                .emit(CallEvent::KeepaliveStatsReport {
                                    transport: transport_id.clone(),
                                    report,
                                })
                                .await;
                        }
                    }

                    self.set_state(KeepaliveState::Idle);
                }
            }
        }
    }

    async fn fail(&self, transport_id: &str, reason: String) {
        warn!(transport = %transport_id, reason = %reason, "Keepalive detected a dead transport");
        self.transport.close(&reason).await;
        self.set_state(KeepaliveState::ConnectionFailed);
        self.events
            .emit(CallEvent::connection_failed(
                transport_id,
                CallError::connection_failed(transport_id, reason),
            ))
            .await;
    }

    fn set_state(&self, state: KeepaliveState) {
        self.state.send_replace(state);
    }
}
