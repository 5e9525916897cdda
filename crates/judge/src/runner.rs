//! Submit -> poll -> report orchestration.
//!
//! [`Runner::run`] is the single entry point a host needs: it owns one
//! [`Submitter`], [`Poller`] and [`Reporter`] wired to the same observer,
//! and guarantees every job is reported exactly once (`postExecution` on
//! success, `runError` on failure). Requests rejected by local validation
//! never become jobs and are returned without a notification.

use std::sync::Arc;
use std::time::Instant;

use codepad_core::job::JobRequest;
use codepad_events::ExecutionObserver;
use tokio_util::sync::CancellationToken;

use crate::api::ExecutionApi;
use crate::poller::{PollConfig, PollError, Poller, Scheduler, TokioScheduler};
use crate::reporter::{FailureReport, Report, Reporter};
use crate::session::SessionContext;
use crate::submit::{LanguagePolicy, SubmitError, Submitter};

/// Any failure of a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Poll(#[from] PollError),
}

impl RunError {
    /// HTTP-style status code, e.g. 504 when polling gave up.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RunError::Submit(e) => e.status_code(),
            RunError::Poll(e) => e.status_code(),
        }
    }

    /// Raw response body returned by the service, when there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            RunError::Submit(SubmitError::Api { body, .. }) => Some(body),
            RunError::Poll(PollError::Api { body, .. }) => Some(body),
            _ => None,
        }
    }

    /// Whether the request was rejected before reaching the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, RunError::Submit(SubmitError::Validation(_)))
    }
}

pub struct Runner {
    submitter: Submitter,
    poller: Poller,
    reporter: Reporter,
}

impl Runner {
    /// Build a runner that waits on the tokio timer.
    pub fn new(
        api: Arc<dyn ExecutionApi>,
        session: Arc<SessionContext>,
        observer: Arc<dyn ExecutionObserver>,
        config: PollConfig,
    ) -> Self {
        Self::with_scheduler(api, session, observer, config, Arc::new(TokioScheduler))
    }

    pub fn with_scheduler(
        api: Arc<dyn ExecutionApi>,
        session: Arc<SessionContext>,
        observer: Arc<dyn ExecutionObserver>,
        config: PollConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            submitter: Submitter::new(Arc::clone(&api), session, Arc::clone(&observer)),
            poller: Poller::new(api, scheduler, Arc::clone(&observer), config),
            reporter: Reporter::new(observer),
        }
    }

    pub fn with_policy(mut self, policy: LanguagePolicy) -> Self {
        self.submitter = self.submitter.with_policy(policy);
        self
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Run a job to completion.
    pub async fn run(&self, request: &JobRequest) -> Result<Report, RunFailure> {
        self.run_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Run a job, giving up with [`PollError::Cancelled`] once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
    ) -> Result<Report, RunFailure> {
        let started = Instant::now();

        let outcome = async {
            let handle = self.submitter.submit(request).await?;
            let result = self.poller.poll_with_cancel(&handle, cancel).await?;
            Ok::<_, RunError>(result)
        }
        .await;

        match outcome {
            Ok(result) => Ok(self.reporter.report(result, Some(started.elapsed()))),
            Err(error) if error.is_validation() => Err(RunFailure {
                error,
                report: None,
            }),
            Err(error) => {
                let report = self.reporter.report_failure(&error);
                Err(RunFailure {
                    error,
                    report: Some(report),
                })
            }
        }
    }
}

/// A failed run: the error plus its display form when one was reported.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: RunError,
    /// `None` for requests rejected by local validation.
    pub report: Option<FailureReport>,
}
