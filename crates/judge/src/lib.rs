//! Client for a Judge0-compatible remote code-execution service.
//!
//! The pipeline is submit -> poll -> report:
//!
//! - [`submit::Submitter`] validates and sends a job, returning a handle.
//! - [`poller::Poller`] drives a bounded polling state machine until the
//!   job reaches a terminal status.
//! - [`reporter::Reporter`] turns the outcome into display text and
//!   notifies observers.
//! - [`runner::Runner`] ties the three together so each job is reported
//!   exactly once.
//!
//! All HTTP traffic goes through the [`api::ExecutionApi`] trait;
//! [`api::JudgeApi`] is the `reqwest` implementation.

pub mod api;
pub mod config;
pub mod poller;
pub mod reporter;
pub mod runner;
pub mod session;
pub mod submit;
