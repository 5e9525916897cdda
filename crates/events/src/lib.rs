//! Execution notifications for embedding hosts.
//!
//! The judge client never talks to its host directly. Instead it emits
//! [`ExecutionEvent`]s to any number of [`ExecutionObserver`]s:
//!
//! - [`EventBus`]: in-process fan-out backed by `tokio::sync::broadcast`.
//! - [`TracingObserver`]: logs every event.
//! - any `Fn(&ExecutionEvent)` closure.

pub mod bus;
pub mod observer;

pub use bus::{EventBus, ExecutionEvent};
pub use observer::{ExecutionObserver, ObserverSet, TracingObserver};
