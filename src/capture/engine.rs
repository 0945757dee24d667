//! ChallengeCaptureEngine — drives the timed multi-frame liveness burst.
//!
//! One burst per challenge attempt: up to N frames acquired at a fixed
//! spacing, packaged with the action name and submitted to the liveness
//! oracle as a single call. The burst buffer is ephemeral; it is discarded
//! after submission whether the oracle accepts or rejects.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::gateway::VerificationGateway;

use super::challenge::{ChallengeAction, ChallengeSequence};

/// A single captured image frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Source of camera frames.
///
/// Yielding `None` for a tick means the camera produced nothing; the tick
/// is skipped, not retried within the burst.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<Vec<u8>>;
}

/// Create a linked cancel handle/token pair for one capture session.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Aborts an in-flight burst, e.g. when the user navigates away from the
/// capture step and the camera must be released.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cooperative cancellation observed by the engine.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        Self { rx }
    }

    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling: never fires.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Phase of the current challenge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Capturing,
    Submitting,
}

/// Outcome of one liveness step attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// A burst is already in flight; this request was a no-op.
    Busy,
    /// The oracle rejected the action. Same index, user may retry.
    Rejected,
    /// The action passed; `next` is now the current challenge.
    Advanced { next: ChallengeAction },
    /// Every action in the sequence has passed, in order.
    SequenceComplete,
}

struct EngineState {
    index: usize,
    phase: CapturePhase,
}

/// Resets the phase to `Idle` on drop so no exit path leaves the engine
/// stuck busy.
struct PhaseReset<'a> {
    state: &'a Mutex<EngineState>,
}

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.phase = CapturePhase::Idle;
        }
    }
}

/// Drives the liveness challenge sequence, one burst at a time.
pub struct ChallengeCaptureEngine {
    gateway: Arc<dyn VerificationGateway>,
    sequence: ChallengeSequence,
    config: CaptureConfig,
    state: Mutex<EngineState>,
}

impl ChallengeCaptureEngine {
    pub fn new(
        gateway: Arc<dyn VerificationGateway>,
        sequence: ChallengeSequence,
        config: CaptureConfig,
    ) -> Self {
        Self {
            gateway,
            sequence,
            config,
            state: Mutex::new(EngineState {
                index: 0,
                phase: CapturePhase::Idle,
            }),
        }
    }

    /// The challenge currently awaiting a successful burst, or `None` once
    /// the sequence has completed.
    pub fn current_action(&self) -> Option<ChallengeAction> {
        let state = self.state.lock().unwrap();
        self.sequence.get(state.index)
    }

    /// Whether every challenge in the sequence has passed.
    pub fn is_complete(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.index >= self.sequence.len()
    }

    pub fn phase(&self) -> CapturePhase {
        self.state.lock().unwrap().phase
    }

    /// Return to the first challenge. Used at logout.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.index = 0;
        state.phase = CapturePhase::Idle;
    }

    /// Run one burst for the current challenge.
    ///
    /// Busy-guarded: at most one burst is in flight; a second request is a
    /// no-op returning [`ChallengeOutcome::Busy`]. The index advances only
    /// when the oracle reports success. An empty burst is still submitted:
    /// the oracle is the sole judge of acceptance.
    pub async fn run_current(
        &self,
        user_id: &str,
        source: &mut dyn FrameSource,
        cancel: &CancelToken,
    ) -> Result<ChallengeOutcome, CaptureError> {
        let action = {
            let mut state = self.state.lock().unwrap();
            if state.phase != CapturePhase::Idle {
                return Ok(ChallengeOutcome::Busy);
            }
            let Some(action) = self.sequence.get(state.index) else {
                return Ok(ChallengeOutcome::SequenceComplete);
            };
            state.phase = CapturePhase::Capturing;
            action
        };
        let _reset = PhaseReset { state: &self.state };

        let burst_id = Uuid::new_v4();
        let deadline = self.config.burst_deadline();
        let frames = tokio::select! {
            burst = tokio::time::timeout(deadline, self.capture_burst(burst_id, source)) => {
                burst.map_err(|_| CaptureError::DeadlineExceeded { deadline })?
            }
            _ = cancel.cancelled() => {
                tracing::info!(%burst_id, action = %action, "Capture burst cancelled");
                return Err(CaptureError::Cancelled);
            }
        };

        tracing::debug!(
            %burst_id,
            action = %action,
            frames = frames.len(),
            "Submitting liveness burst"
        );
        {
            let mut state = self.state.lock().unwrap();
            state.phase = CapturePhase::Submitting;
        }

        let outcome = tokio::select! {
            result = self.gateway.submit_liveness_step(user_id, action, &frames) => result?,
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled),
        };

        if !outcome.success {
            tracing::info!(action = %action, "Liveness action rejected by oracle");
            return Ok(ChallengeOutcome::Rejected);
        }

        let mut state = self.state.lock().unwrap();
        state.index += 1;
        match self.sequence.get(state.index) {
            Some(next) => Ok(ChallengeOutcome::Advanced { next }),
            None => Ok(ChallengeOutcome::SequenceComplete),
        }
    }

    async fn capture_burst(&self, burst_id: Uuid, source: &mut dyn FrameSource) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(self.config.frames_per_burst);
        let mut ticker = tokio::time::interval(self.config.frame_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        for tick in 0..self.config.frames_per_burst {
            ticker.tick().await;
            match source.next_frame().await {
                Some(bytes) => frames.push(Frame {
                    file_name: format!("{burst_id}_frame_{tick}.jpg"),
                    bytes,
                }),
                None => {
                    tracing::trace!(%burst_id, tick, "Frame source yielded nothing; tick skipped");
                }
            }
        }
        frames
    }
}
