//! Job request, handle, status, and result types.
//!
//! A [`JobRequest`] is built by the caller, validated locally, and
//! submitted once. The service answers with a token which becomes a
//! [`JobHandle`]; polling the handle eventually yields a [`JobResult`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::language::Flavor;
use crate::status;
use crate::types::{LanguageId, StatusId};

/* --------------------------------------------------------------------------
   Request
   -------------------------------------------------------------------------- */

/// Everything needed to run one program.
///
/// Text fields hold plain (unencoded) text; encoding happens when the
/// wire body is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    /// Service instance that should run the job.
    pub flavor: Flavor,
    pub source_code: String,
    pub language_id: LanguageId,
    pub stdin: String,
    pub compiler_options: String,
    pub command_line_arguments: String,
    pub redirect_stderr_to_stdout: bool,
    /// Base64 zip of extra files placed next to the program.
    pub additional_files: Option<String>,
}

impl JobRequest {
    /// Create a request with empty stdin/options and stderr merged into stdout.
    pub fn new(flavor: Flavor, language_id: LanguageId, source_code: impl Into<String>) -> Self {
        Self {
            flavor,
            source_code: source_code.into(),
            language_id,
            stdin: String::new(),
            compiler_options: String::new(),
            command_line_arguments: String::new(),
            redirect_stderr_to_stdout: true,
            additional_files: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = stdin.into();
        self
    }

    pub fn with_compiler_options(mut self, options: impl Into<String>) -> Self {
        self.compiler_options = options.into();
        self
    }

    pub fn with_command_line_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.command_line_arguments = arguments.into();
        self
    }

    pub fn with_additional_files(mut self, zip_base64: impl Into<String>) -> Self {
        self.additional_files = Some(zip_base64.into());
        self
    }

    /// Caller-level checks that must pass before anything touches the network.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_code.trim().is_empty() {
            return Err(CoreError::Validation(
                "Source code can't be empty!".to_string(),
            ));
        }
        if self.language_id == 0 {
            return Err(CoreError::Validation(
                "A language must be selected".to_string(),
            ));
        }
        Ok(())
    }
}

/* --------------------------------------------------------------------------
   Handle
   -------------------------------------------------------------------------- */

/// Identifies a submitted job. Only a successful submission creates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    /// Opaque token assigned by the service.
    pub token: String,
    /// Region that accepted the job; echoed on every poll.
    pub routing_hint: Option<String>,
    /// Instance that accepted the job; polls go to the same one.
    pub flavor: Flavor,
}

impl JobHandle {
    pub fn new(token: impl Into<String>, routing_hint: Option<String>, flavor: Flavor) -> Self {
        Self {
            token: token.into(),
            routing_hint,
            flavor,
        }
    }
}

/* --------------------------------------------------------------------------
   Status and result
   -------------------------------------------------------------------------- */

/// Status reported by the service for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: StatusId,
    pub description: String,
}

impl JobStatus {
    pub fn new(id: StatusId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }

    /// Whether no further state change will occur.
    pub fn is_terminal(&self) -> bool {
        status::is_terminal(self.id)
    }
}

/// Outcome of a finished job, with text fields already decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub stdout: String,
    pub compile_output: String,
    /// CPU seconds exactly as the service reported them, e.g. `"0.100"`.
    pub time: Option<String>,
    /// Peak memory in kilobytes.
    pub memory: Option<u64>,
}

impl JobResult {
    /// CPU time as a number, if the reported text parses.
    pub fn time_seconds(&self) -> Option<f64> {
        self.time.as_deref().and_then(|t| t.trim().parse().ok())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
