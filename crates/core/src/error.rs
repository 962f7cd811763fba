//! Error types for Graft.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for Graft core operations.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Raised when an identity object would be built in violation of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ValidationError {
    #[error("Missing required field '{0}'")]
    #[diagnostic(code(graft::validation::missing_field))]
    MissingField(&'static str),

    #[error("Invalid plugin id '{0}': must be lowercase and match [a-z][a-z0-9_-]{{1,63}}")]
    #[diagnostic(code(graft::validation::plugin_id))]
    InvalidPluginId(String),

    #[error("Duplicate author '{0}'")]
    #[diagnostic(code(graft::validation::duplicate_author))]
    DuplicateAuthor(String),

    #[error("Invalid url '{url}': {reason}")]
    #[diagnostic(code(graft::validation::url))]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid transformer name '{0}': must be non-empty and contain no ':'")]
    #[diagnostic(code(graft::validation::transformer_name))]
    InvalidTransformerName(String),

    #[error("Invalid descriptor '{0}'")]
    #[diagnostic(code(graft::validation::descriptor))]
    InvalidDescriptor(String),

    #[error("{0} may not have type void")]
    #[diagnostic(code(graft::validation::void))]
    VoidType(String),

    #[error("Invalid target: {0}")]
    #[diagnostic(code(graft::validation::target))]
    InvalidTarget(String),
}
