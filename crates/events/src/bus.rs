//! Execution notifications and a broadcast fan-out for them.
//!
//! [`ExecutionEvent`] is the envelope a host receives for each stage of a
//! job. [`EventBus`] relays events to any number of async subscribers and
//! is usually held behind an `Arc`.

use chrono::{DateTime, Utc};
use codepad_core::job::JobStatus;
use codepad_core::language::Flavor;
use codepad_core::types::LanguageId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::observer::ExecutionObserver;

// ---------------------------------------------------------------------------
// ExecutionEvent
// ---------------------------------------------------------------------------

/// A notification about the lifecycle of one job.
///
/// Serialized with an `event` tag (`preExecution`, `statusUpdate`,
/// `postExecution`, `runError`) so hosts can route on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ExecutionEvent {
    /// A job is about to be submitted. Carries the plain-text request.
    PreExecution {
        source_code: String,
        language_id: LanguageId,
        flavor: Flavor,
        stdin: String,
        compiler_options: String,
        command_line_arguments: String,
        timestamp: DateTime<Utc>,
    },

    /// A poll observed a non-terminal status.
    StatusUpdate {
        token: String,
        attempt: u32,
        status: JobStatus,
    },

    /// The job reached a terminal status.
    PostExecution {
        status: JobStatus,
        /// CPU time in seconds.
        time: Option<f64>,
        /// Peak memory in kilobytes.
        memory: Option<u64>,
        /// Compile output and stdout combined.
        output: String,
        timestamp: DateTime<Utc>,
    },

    /// Submission or polling failed.
    RunError {
        /// HTTP-style status code, when one applies.
        status: Option<u16>,
        message: String,
        /// Raw response body or diagnostic detail.
        body: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    /// Wire name of the event, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionEvent::PreExecution { .. } => "preExecution",
            ExecutionEvent::StatusUpdate { .. } => "statusUpdate",
            ExecutionEvent::PostExecution { .. } => "postExecution",
            ExecutionEvent::RunError { .. } => "runError",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Events buffered per subscriber before it starts lagging.
const DEFAULT_CAPACITY: usize = 256;

/// Relays every notification to all of its subscribers.
///
/// Implements [`ExecutionObserver`], so it can be handed to the judge
/// client directly or combined with other observers.
///
/// ```rust
/// use codepad_events::bus::{EventBus, ExecutionEvent};
/// use codepad_core::job::JobStatus;
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ExecutionEvent::StatusUpdate {
///     token: "abc".into(),
///     attempt: 1,
///     status: JobStatus::new(1, "In Queue"),
/// });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    /// A subscriber more than `capacity` events behind loses the oldest
    /// ones and sees `RecvError::Lagged` on its next receive.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to everyone subscribed right now. Without
    /// subscribers the event is discarded.
    pub fn publish(&self, event: ExecutionEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No subscribers for execution event");
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ExecutionObserver for EventBus {
    fn notify(&self, event: &ExecutionEvent) {
        self.publish(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn post_execution() -> ExecutionEvent {
        ExecutionEvent::PostExecution {
            status: JobStatus::new(3, "Accepted"),
            time: Some(0.012),
            memory: Some(3264),
            output: "1".into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(post_execution());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "postExecution");
        match received {
            ExecutionEvent::PostExecution { output, memory, .. } => {
                assert_eq!(output, "1");
                assert_eq!(memory, Some(3264));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_observer_notifications() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let event = post_execution();

        bus.notify(&event);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[test]
    fn events_without_subscribers_are_discarded() {
        let bus = EventBus::new(4);
        bus.publish(post_execution());

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_camel_case_tag() {
        let json = serde_json::to_value(post_execution()).unwrap();
        assert_eq!(json["event"], "postExecution");
        assert_eq!(json["status"]["id"], 3);
        assert_eq!(json["output"], "1");

        let err = ExecutionEvent::RunError {
            status: Some(504),
            message: "Maximum number of status requests reached.".into(),
            body: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["event"], "runError");
        assert_eq!(json["status"], 504);
        assert!(json["body"].is_null());
    }

    #[test]
    fn pre_execution_round_trips_through_json() {
        let event = ExecutionEvent::PreExecution {
            source_code: "print(1)".into(),
            language_id: 71,
            flavor: Flavor::Ce,
            stdin: String::new(),
            compiler_options: String::new(),
            command_line_arguments: String::new(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"preExecution\""));
        assert!(json.contains("\"flavor\":\"CE\""));
        let back: ExecutionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
