//! Bounded polling of a submitted job until it reaches a terminal status.
//!
//! The transition table lives in [`PollMachine`], a pure state machine
//! with no I/O. [`Poller`] drives it: it issues one status request per
//! attempt, waits between attempts through a [`Scheduler`], and stops on
//! the first terminal status, the first transport failure, the attempt
//! ceiling, or cancellation of the [`CancellationToken`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codepad_core::job::{JobHandle, JobResult};
use codepad_core::status;
use codepad_core::types::StatusId;
use codepad_events::{ExecutionEvent, ExecutionObserver};
use tokio_util::sync::CancellationToken;

use crate::api::{ExecutionApi, JudgeApiError};

/// Attempt ceiling used when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Fixed wait between attempts used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Status code reported when the attempt ceiling is hit.
pub const EXHAUSTED_STATUS_CODE: u16 = 504;

/* --------------------------------------------------------------------------
   Wait policy
   -------------------------------------------------------------------------- */

/// How long to wait after attempt `n` before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitPolicy {
    /// Same delay after every attempt.
    Fixed(Duration),
    /// Exponential backoff starting at `initial`, clamped to `max`.
    Backoff {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::Fixed(DEFAULT_POLL_INTERVAL)
    }
}

impl WaitPolicy {
    /// Delay to apply after the given (1-based) attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            WaitPolicy::Fixed(delay) => *delay,
            WaitPolicy::Backoff {
                initial,
                max,
                multiplier,
            } => {
                let mut delay = (*initial).min(*max);
                for _ in 1..attempt {
                    delay = next_delay(delay, *max, *multiplier);
                    if delay == *max {
                        break;
                    }
                }
                delay
            }
        }
    }
}

/// Calculate the next backoff delay, clamped to `max`.
pub fn next_delay(current: Duration, max: Duration, multiplier: f64) -> Duration {
    let next_ms = (current.as_millis() as f64 * multiplier) as u64;
    Duration::from_millis(next_ms).min(max)
}

/// Tunable parameters of the polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the first status request.
    pub initial_delay: Duration,
    /// Wait between attempts.
    pub wait: WaitPolicy,
    /// Attempts allowed while the job stays non-terminal.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            wait: WaitPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/* --------------------------------------------------------------------------
   State machine
   -------------------------------------------------------------------------- */

/// States of one polling sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Waiting,
    /// Status request number `n` (1-based) is in flight.
    Attempt(u32),
    Done,
    Failed,
    Exhausted,
    Cancelled,
}

impl PollState {
    pub fn is_final(self) -> bool {
        !matches!(self, PollState::Waiting | PollState::Attempt(_))
    }
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Wait `delay`, then issue status request number `attempt`.
    Poll { attempt: u32, delay: Duration },
    /// The sequence is over in the given final state.
    Stop(PollState),
}

/// Pure transition table for one polling sequence.
///
/// Events that do not apply to the current state leave it unchanged.
#[derive(Debug, Clone)]
pub struct PollMachine {
    config: PollConfig,
    state: PollState,
    attempts: u32,
}

impl PollMachine {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            state: PollState::Waiting,
            attempts: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Status requests issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `Waiting -> Attempt(1)` after the initial delay.
    pub fn start(&mut self) -> Transition {
        if self.state != PollState::Waiting {
            return self.current();
        }
        if self.config.max_attempts == 0 {
            return self.stop(PollState::Exhausted);
        }
        self.enter_attempt(1, self.config.initial_delay)
    }

    /// A status request answered with `status_id`.
    pub fn on_status(&mut self, status_id: StatusId) -> Transition {
        let PollState::Attempt(n) = self.state else {
            return self.current();
        };

        if status::is_terminal(status_id) {
            self.stop(PollState::Done)
        } else if n >= self.config.max_attempts {
            self.stop(PollState::Exhausted)
        } else {
            let delay = self.config.wait.delay_after(n);
            self.enter_attempt(n + 1, delay)
        }
    }

    /// A status request failed at the transport level. Not retried.
    pub fn on_transport_error(&mut self) -> Transition {
        match self.state {
            PollState::Attempt(_) => self.stop(PollState::Failed),
            _ => self.current(),
        }
    }

    pub fn cancel(&mut self) -> Transition {
        if self.state.is_final() {
            return self.current();
        }
        self.stop(PollState::Cancelled)
    }

    fn enter_attempt(&mut self, attempt: u32, delay: Duration) -> Transition {
        self.state = PollState::Attempt(attempt);
        self.attempts = attempt;
        Transition::Poll { attempt, delay }
    }

    fn stop(&mut self, state: PollState) -> Transition {
        self.state = state;
        Transition::Stop(state)
    }

    fn current(&self) -> Transition {
        match self.state {
            PollState::Attempt(attempt) => Transition::Poll {
                attempt,
                delay: Duration::ZERO,
            },
            other => Transition::Stop(other),
        }
    }
}

/* --------------------------------------------------------------------------
   Scheduler
   -------------------------------------------------------------------------- */

/// Timer abstraction the poller waits on between attempts.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Production scheduler backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, delay: Duration) {
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
}

/* --------------------------------------------------------------------------
   Errors
   -------------------------------------------------------------------------- */

/// Errors that end a polling sequence without a result.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A status request returned a non-2xx status code.
    #[error("Status request failed ({status}): {body}")]
    Api { status: u16, body: String },

    /// A status request failed before a response arrived.
    #[error("Status request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The job stayed non-terminal for every allowed attempt.
    #[error("Maximum number of status requests reached.")]
    Exhausted { attempts: u32 },

    #[error("Polling was cancelled")]
    Cancelled,

    /// Another polling sequence for the same token is still running.
    #[error("Submission {0} is already being polled")]
    AlreadyPolling(String),
}

impl PollError {
    /// HTTP-style status code describing the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PollError::Api { status, .. } => Some(*status),
            PollError::Transport(e) => e.status().map(|s| s.as_u16()),
            PollError::Exhausted { .. } => Some(EXHAUSTED_STATUS_CODE),
            PollError::Cancelled | PollError::AlreadyPolling(_) => None,
        }
    }
}

impl From<JudgeApiError> for PollError {
    fn from(e: JudgeApiError) -> Self {
        match e {
            JudgeApiError::Request(e) => PollError::Transport(e),
            JudgeApiError::ApiError { status, body } => PollError::Api { status, body },
        }
    }
}

/* --------------------------------------------------------------------------
   Driver
   -------------------------------------------------------------------------- */

/// Drives [`PollMachine`] against the execution service.
pub struct Poller {
    api: Arc<dyn ExecutionApi>,
    scheduler: Arc<dyn Scheduler>,
    observer: Arc<dyn ExecutionObserver>,
    config: PollConfig,
    /// Tokens with a polling sequence in progress.
    in_flight: Mutex<HashSet<String>>,
}

impl Poller {
    pub fn new(
        api: Arc<dyn ExecutionApi>,
        scheduler: Arc<dyn Scheduler>,
        observer: Arc<dyn ExecutionObserver>,
        config: PollConfig,
    ) -> Self {
        Self {
            api,
            scheduler,
            observer,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll until the job is terminal or the attempt ceiling is hit.
    pub async fn poll_until_done(&self, handle: &JobHandle) -> Result<JobResult, PollError> {
        self.poll_with_cancel(handle, &CancellationToken::new())
            .await
    }

    /// Like [`poll_until_done`](Self::poll_until_done), but stops with
    /// [`PollError::Cancelled`] as soon as `cancel` is triggered.
    pub async fn poll_with_cancel(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<JobResult, PollError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, &handle.token)?;
        let mut machine = PollMachine::new(self.config.clone());
        let mut next = machine.start();

        while let Transition::Poll { attempt, delay } = next {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    machine.cancel();
                    tracing::info!(token = %handle.token, attempt, "Polling cancelled");
                    return Err(PollError::Cancelled);
                }
                _ = self.scheduler.sleep(delay) => {}
            }

            tracing::debug!(token = %handle.token, attempt, "Requesting submission status");
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    machine.cancel();
                    tracing::info!(token = %handle.token, attempt, "Polling cancelled");
                    return Err(PollError::Cancelled);
                }
                response = self.api.get_submission(
                    handle.flavor,
                    &handle.token,
                    handle.routing_hint.as_deref(),
                ) => response,
            };

            let details = match response {
                Ok(details) => details,
                Err(e) => {
                    machine.on_transport_error();
                    tracing::warn!(
                        token = %handle.token,
                        attempt,
                        error = %e,
                        "Status request failed",
                    );
                    return Err(e.into());
                }
            };

            next = machine.on_status(details.status.id);
            match next {
                Transition::Poll { .. } => {
                    self.observer.notify(&ExecutionEvent::StatusUpdate {
                        token: handle.token.clone(),
                        attempt,
                        status: details.status.clone(),
                    });
                }
                Transition::Stop(PollState::Done) => {
                    tracing::info!(
                        token = %handle.token,
                        attempts = attempt,
                        status = %details.status.description,
                        "Submission finished",
                    );
                    return Ok(details.into_result());
                }
                Transition::Stop(_) => {}
            }
        }

        tracing::warn!(
            token = %handle.token,
            attempts = machine.attempts(),
            "Giving up on submission, still not finished",
        );
        Err(PollError::Exhausted {
            attempts: machine.attempts(),
        })
    }
}

/// Marks a token as being polled for as long as the guard lives.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    token: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<String>>, token: &str) -> Result<Self, PollError> {
        let mut tokens = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !tokens.insert(token.to_string()) {
            return Err(PollError::AlreadyPolling(token.to_string()));
        }
        Ok(Self {
            in_flight,
            token: token.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut tokens = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(&self.token);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
