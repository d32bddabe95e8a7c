use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_REPEAT_LIMIT, DEFAULT_RETRY_DELAY_MS};
use crate::error::{CallError, CallResult};
use crate::events::{CallEvent, EventEmitter};
use crate::session::CallId;
use crate::signaling::{ReofferOptions, ReofferOutcome, SignalingStack};

/// Where the controller is in its current (or last) renegotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenegotiationState {
    /// Nothing requested yet, or the last request was cut short by termination
    Idle,
    /// Waiting on the signaling stack or on the retry delay
    Attempting { attempt: u32 },
    /// The last request was accepted
    Succeeded { attempts: u32 },
    /// The last request ran out of attempts
    Exhausted { attempts: u32 },
}

/// One renegotiation request with its retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenegotiationRequest {
    /// Options handed to the signaling stack on every attempt
    pub options: ReofferOptions,
    /// Maximum number of attempts; 0 behaves like 1
    pub repeat_limit: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for RenegotiationRequest {
    fn default() -> Self {
        Self {
            options: ReofferOptions::default(),
            repeat_limit: DEFAULT_REPEAT_LIMIT,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RenegotiationRequest {
    pub fn new(options: ReofferOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn with_repeat_limit(mut self, repeat_limit: u32) -> Self {
        self.repeat_limit = repeat_limit;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_options(mut self, options: ReofferOptions) -> Self {
        self.options = options;
        self
    }
}

/// Drives offer/answer re-exchanges for one call
///
/// Requests are serialized: a request made while another one is still
/// attempting waits for it to finish. A rejection by the signaling stack
/// (typically because an exchange is already in progress on the dialog) is
/// retried after a fixed delay until the repeat limit is reached.
pub struct RenegotiationController {
    call_id: CallId,
    signaling: Arc<dyn SignalingStack>,
    events: Arc<EventEmitter>,
    terminated: CancellationToken,
    state: Mutex<RenegotiationState>,
    gate: tokio::sync::Mutex<()>,
}

impl RenegotiationController {
    /// Create a controller; cancelling `terminated` aborts queued and retrying requests
    pub fn new(
        call_id: CallId,
        signaling: Arc<dyn SignalingStack>,
        events: Arc<EventEmitter>,
        terminated: CancellationToken,
    ) -> Self {
        Self {
            call_id,
            signaling,
            events,
            terminated,
            state: Mutex::new(RenegotiationState::Idle),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> RenegotiationState {
        *self.state.lock()
    }

    /// Renegotiate, retrying rejections
    ///
    /// Returns the number of attempts it took. Fails with
    /// [`CallError::Terminated`] if the call ends before or during the
    /// request, and with [`CallError::RenegotiationExhausted`] once every
    /// attempt was rejected. Exhaustion is also reported once as
    /// [`CallEvent::RenegotiationFailed`].
    pub async fn renegotiate(&self, request: RenegotiationRequest) -> CallResult<u32> {
        if self.terminated.is_cancelled() {
            return Err(CallError::Terminated);
        }

        let _turn = tokio::select! {
            biased;
            _ = self.terminated.cancelled() => {
                debug!(call_id = %self.call_id, "Call terminated while waiting to renegotiate");
                return Err(CallError::Terminated);
            }
            guard = self.gate.lock() => guard,
        };

        let limit = request.repeat_limit.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.set_state(RenegotiationState::Attempting { attempt });
            debug!(
                call_id = %self.call_id,
                attempt = attempt,
                max_attempts = limit,
                "Requesting renegotiation"
            );

            let reason = match self.signaling.request_reoffer(&request.options).await {
                ReofferOutcome::Accepted => {
                    if attempt > 1 {
                        info!(call_id = %self.call_id, attempts = attempt, "Renegotiation accepted after retries");
                    }
                    self.set_state(RenegotiationState::Succeeded { attempts: attempt });
                    return Ok(attempt);
                }
                ReofferOutcome::Rejected { reason } => reason,
            };

            let rejected = CallError::RenegotiationRejected { reason };
            if attempt >= limit {
                warn!(
                    call_id = %self.call_id,
                    attempts = attempt,
                    error = %rejected,
                    "Renegotiation attempts exhausted"
                );
                self.set_state(RenegotiationState::Exhausted { attempts: attempt });
                let error = CallError::RenegotiationExhausted { attempts: attempt };
                self.events
                    .emit(CallEvent::renegotiation_failed(self.call_id, error.clone()))
                    .await;
                return Err(error);
            }

            debug!(
                call_id = %self.call_id,
                attempt = attempt,
                error = %rejected,
                category = rejected.category(),
                next_delay_ms = request.retry_delay.as_millis() as u64,
                "Renegotiation rejected, will retry"
            );

            tokio::select! {
                biased;
                _ = self.terminated.cancelled() => {
                    debug!(call_id = %self.call_id, attempt = attempt, "Call terminated during retry delay");
                    self.set_state(RenegotiationState::Idle);
                    return Err(CallError::Terminated);
                }
                _ = tokio::time::sleep(request.retry_delay) => {}
            }
        }
    }

    fn set_state(&self, state: RenegotiationState) {
        *self.state.lock() = state;
    }
}
