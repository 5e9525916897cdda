/// Execution-service language identifiers are small positive integers.
pub type LanguageId = u32;

/// Execution-service status identifiers (see [`crate::status`]).
pub type StatusId = u32;
