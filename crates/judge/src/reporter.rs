//! Turns job outcomes into display text and notifications.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use codepad_core::job::JobResult;
use codepad_events::{ExecutionEvent, ExecutionObserver};

use crate::runner::RunError;

/// Placeholder shown for a missing time or memory value.
const MISSING: &str = "-";

/// Display form of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// e.g. `Accepted, 0.012s, 3264KB (TAT: 840ms)`.
    pub status_line: String,
    /// Compile output and stdout, newline-joined, trailing whitespace trimmed.
    pub output: String,
    pub result: JobResult,
}

/// Display form of a failed job.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    /// e.g. `Maximum number of status requests reached. (504)`.
    pub title: String,
    pub details: String,
    /// Markdown suitable for filing an issue about the failure.
    pub diagnostic: String,
}

pub struct Reporter {
    observer: Arc<dyn ExecutionObserver>,
}

impl Reporter {
    pub fn new(observer: Arc<dyn ExecutionObserver>) -> Self {
        Self { observer }
    }

    /// Report a finished job and emit `postExecution`.
    ///
    /// Takes the result by value: a result can be reported only once.
    pub fn report(&self, result: JobResult, turnaround: Option<Duration>) -> Report {
        let status_line = status_line(&result, turnaround);
        let output = combined_output(&result);

        self.observer.notify(&ExecutionEvent::PostExecution {
            status: result.status.clone(),
            time: result.time_seconds(),
            memory: result.memory,
            output: output.clone(),
            timestamp: Utc::now(),
        });

        Report {
            status_line,
            output,
            result,
        }
    }

    /// Report a failed job and emit `runError`.
    pub fn report_failure(&self, error: &RunError) -> FailureReport {
        let message = error.to_string();
        let status = error.status_code();
        let body = error.body().map(str::to_string);

        self.observer.notify(&ExecutionEvent::RunError {
            status,
            message: message.clone(),
            body: body.clone(),
            timestamp: Utc::now(),
        });

        let title = match status {
            Some(code) => format!("{message} ({code})"),
            None => message,
        };
        let details = body.unwrap_or_default();
        let diagnostic = diagnostic_report(&title, &details);

        FailureReport {
            title,
            details,
            diagnostic,
        }
    }
}

/// `"{description}, {time}, {memory}"`, plus the turnaround time when known.
pub fn status_line(result: &JobResult, turnaround: Option<Duration>) -> String {
    let time = result
        .time
        .as_deref()
        .map(|t| format!("{t}s"))
        .unwrap_or_else(|| MISSING.to_string());
    let memory = result
        .memory
        .map(|m| format!("{m}KB"))
        .unwrap_or_else(|| MISSING.to_string());

    let mut line = format!("{}, {time}, {memory}", result.status.description);
    if let Some(tat) = turnaround {
        line.push_str(&format!(" (TAT: {}ms)", tat.as_millis()));
    }
    line
}

/// Compile output followed by stdout, skipping empty parts.
pub fn combined_output(result: &JobResult) -> String {
    [result.compile_output.as_str(), result.stdout.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

fn diagnostic_report(title: &str, details: &str) -> String {
    format!(
        "**Error Title**: {title}\n**Error Timestamp**: `{}`\n**Description**:\n{details}",
        Utc::now().to_rfc3339()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
