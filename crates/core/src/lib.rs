//! Domain model shared by every codepad crate.
//!
//! Holds the job types exchanged with the execution service, the
//! binary-safe text codec used on the wire, well-known status and
//! language identifiers, and the core error type.

pub mod codec;
pub mod error;
pub mod job;
pub mod language;
pub mod status;
pub mod types;
