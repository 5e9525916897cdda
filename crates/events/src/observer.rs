//! Observer interface through which the judge client reports to its host.

use std::sync::Arc;

use crate::bus::ExecutionEvent;

/// Receives execution notifications.
///
/// Implementations must be cheap and must not block: they are called
/// inline from the submission and polling code paths.
pub trait ExecutionObserver: Send + Sync {
    fn notify(&self, event: &ExecutionEvent);
}

impl<F> ExecutionObserver for F
where
    F: Fn(&ExecutionEvent) + Send + Sync,
{
    fn notify(&self, event: &ExecutionEvent) {
        self(event)
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn notify(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::PreExecution {
                language_id,
                flavor,
                ..
            } => {
                tracing::info!(language_id, flavor = %flavor, "Submitting job");
            }
            ExecutionEvent::StatusUpdate {
                token,
                attempt,
                status,
            } => {
                tracing::debug!(
                    token = %token,
                    attempt,
                    status = %status.description,
                    "Job not finished yet",
                );
            }
            ExecutionEvent::PostExecution { status, time, memory, .. } => {
                tracing::info!(
                    status_id = status.id,
                    status = %status.description,
                    ?time,
                    ?memory,
                    "Job finished",
                );
            }
            ExecutionEvent::RunError {
                status, message, ..
            } => {
                tracing::warn!(?status, error = %message, "Job failed");
            }
        }
    }
}

/// Fan-out to a fixed list of observers, in registration order.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. Returns `self` for chaining.
    pub fn with(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn push(&mut self, observer: Arc<dyn ExecutionObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ExecutionObserver for ObserverSet {
    fn notify(&self, event: &ExecutionEvent) {
        for observer in &self.observers {
            observer.notify(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
