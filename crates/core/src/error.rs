#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown language: {flavor} language {id}")]
    UnknownLanguage {
        flavor: crate::language::Flavor,
        id: crate::types::LanguageId,
    },
}
