//! Job submission.
//!
//! [`Submitter::submit`] validates a [`JobRequest`] locally, builds the
//! wire body, notifies observers with `preExecution`, and sends exactly
//! one `POST /submissions`. Failures are surfaced, never retried.

use std::sync::Arc;

use chrono::Utc;
use codepad_core::codec;
use codepad_core::error::CoreError;
use codepad_core::job::{JobHandle, JobRequest};
use codepad_core::language::{
    LanguageRef, BUNDLED_DEPENDENCY_LANGUAGE_ID, PASS_THROUGH_LANGUAGE_ID,
};
use codepad_core::types::LanguageId;
use codepad_events::{ExecutionEvent, ExecutionObserver};

use crate::api::{ExecutionApi, JudgeApiError, SubmissionBody};
use crate::session::SessionContext;

/// Languages that need special handling on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguagePolicy {
    /// Source is sent as-is instead of being encoded.
    pub pass_through: LanguageId,
    /// The session's bundled files are attached as `additional_files`.
    pub bundled_dependency: LanguageId,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self {
            pass_through: PASS_THROUGH_LANGUAGE_ID,
            bundled_dependency: BUNDLED_DEPENDENCY_LANGUAGE_ID,
        }
    }
}

/// Errors from submitting a job.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Rejected locally; nothing was sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// The service answered with a non-2xx status code.
    #[error("Submission rejected ({status}): {body}")]
    Api { status: u16, body: String },

    /// The request failed before a response arrived.
    #[error("Submission request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The bundled files for the language could not be downloaded.
    #[error("Failed to fetch bundled files: {0}")]
    BundleFetch(#[source] JudgeApiError),
}

impl SubmitError {
    /// HTTP-style status code describing the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SubmitError::Validation(_) => None,
            SubmitError::Api { status, .. } => Some(*status),
            SubmitError::Transport(e) => e.status().map(|s| s.as_u16()),
            SubmitError::BundleFetch(JudgeApiError::ApiError { status, .. }) => Some(*status),
            SubmitError::BundleFetch(JudgeApiError::Request(e)) => e.status().map(|s| s.as_u16()),
        }
    }
}

impl From<JudgeApiError> for SubmitError {
    fn from(e: JudgeApiError) -> Self {
        match e {
            JudgeApiError::Request(e) => SubmitError::Transport(e),
            JudgeApiError::ApiError { status, body } => SubmitError::Api { status, body },
        }
    }
}

/// Sends jobs to the execution service.
pub struct Submitter {
    api: Arc<dyn ExecutionApi>,
    session: Arc<SessionContext>,
    observer: Arc<dyn ExecutionObserver>,
    policy: LanguagePolicy,
}

impl Submitter {
    pub fn new(
        api: Arc<dyn ExecutionApi>,
        session: Arc<SessionContext>,
        observer: Arc<dyn ExecutionObserver>,
    ) -> Self {
        Self {
            api,
            session,
            observer,
            policy: LanguagePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LanguagePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> LanguagePolicy {
        self.policy
    }

    /// Validate and submit a job, returning its handle.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, SubmitError> {
        self.validate(request).await?;

        let additional_files = match &request.additional_files {
            Some(files) => Some(files.clone()),
            None if request.language_id == self.policy.bundled_dependency => Some(
                self.session
                    .bundled_files(self.api.as_ref())
                    .await
                    .map_err(SubmitError::BundleFetch)?,
            ),
            None => None,
        };
        let body = self.build_body(request, additional_files);

        self.observer.notify(&ExecutionEvent::PreExecution {
            source_code: request.source_code.clone(),
            language_id: request.language_id,
            flavor: request.flavor,
            stdin: request.stdin.clone(),
            compiler_options: request.compiler_options.clone(),
            command_line_arguments: request.command_line_arguments.clone(),
            timestamp: Utc::now(),
        });

        let receipt = self
            .api
            .create_submission(request.flavor, &body)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    flavor = %request.flavor,
                    language_id = request.language_id,
                    error = %e,
                    "Submission failed",
                );
            })?;

        tracing::info!(
            token = %receipt.token,
            region = ?receipt.region,
            flavor = %request.flavor,
            "Submission accepted",
        );

        Ok(JobHandle::new(receipt.token, receipt.region, request.flavor))
    }

    async fn validate(&self, request: &JobRequest) -> Result<(), CoreError> {
        request.validate()?;

        let language = LanguageRef::new(request.flavor, request.language_id);
        if self.session.is_known(language).await == Some(false) {
            return Err(CoreError::UnknownLanguage {
                flavor: request.flavor,
                id: request.language_id,
            });
        }
        Ok(())
    }

    /// Encode the request into its wire form.
    ///
    /// Source and stdin are encoded; compiler options and arguments are
    /// plain text on the wire. The pass-through language keeps its
    /// source untouched.
    pub fn build_body(
        &self,
        request: &JobRequest,
        additional_files: Option<String>,
    ) -> SubmissionBody {
        let source_code = if request.language_id == self.policy.pass_through {
            request.source_code.clone()
        } else {
            codec::encode(&request.source_code)
        };

        SubmissionBody {
            source_code,
            language_id: request.language_id,
            stdin: codec::encode(&request.stdin),
            compiler_options: request.compiler_options.clone(),
            command_line_arguments: request.command_line_arguments.clone(),
            redirect_stderr_to_stdout: request.redirect_stderr_to_stdout,
            additional_files,
        }
    }
}
