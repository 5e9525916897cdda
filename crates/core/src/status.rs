//! Well-known job status ID constants.
//!
//! These mirror the status table of the execution service. IDs up to and
//! including [`STATUS_PROCESSING`] are non-terminal; everything above is
//! a final verdict.

use crate::types::StatusId;

/// Job accepted by the service and waiting for a worker.
pub const STATUS_IN_QUEUE: StatusId = 1;

/// Job is being compiled or run.
pub const STATUS_PROCESSING: StatusId = 2;

/// Program ran to completion.
pub const STATUS_ACCEPTED: StatusId = 3;

/// Output did not match the expected output.
pub const STATUS_WRONG_ANSWER: StatusId = 4;

/// Program exceeded its CPU time limit.
pub const STATUS_TIME_LIMIT_EXCEEDED: StatusId = 5;

/// Source failed to compile.
pub const STATUS_COMPILATION_ERROR: StatusId = 6;

// 7..=12 are the runtime-error verdicts (SIGSEGV, SIGXFSZ, SIGFPE, SIGABRT, NZEC, other).

/// The service itself failed while handling the job.
pub const STATUS_INTERNAL_ERROR: StatusId = 13;

/// The submitted executable could not be run.
pub const STATUS_EXEC_FORMAT_ERROR: StatusId = 14;

/// Whether a status ID is a final verdict.
pub fn is_terminal(id: StatusId) -> bool {
    id > STATUS_PROCESSING
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
