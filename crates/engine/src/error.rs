//! Engine error types.

use std::path::PathBuf;

use graft_plugin::TransformError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while building the blackboard or loading its configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("Duplicate plugin id '{id}': {existing} and {new}")]
    #[diagnostic(
        code(graft::registry::duplicate_plugin),
        help("remove one of the two plugins from the installation")
    )]
    DuplicatePlugin {
        id: String,
        existing: String,
        new: String,
    },

    #[error("Duplicate transformer '{0}'")]
    #[diagnostic(code(graft::registry::duplicate_transformer))]
    DuplicateTransformer(String),

    #[error("Transformer '{0}' declares no target classes")]
    #[diagnostic(code(graft::registry::no_targets))]
    NoTargets(String),

    #[error("Transformer '{transformer}' is registered by plugin '{plugin}' but belongs to another plugin")]
    #[diagnostic(code(graft::registry::foreign_transformer))]
    ForeignTransformer { transformer: String, plugin: String },

    #[error("Plugin '{plugin}' rejected the environment: {reason}")]
    #[diagnostic(code(graft::registry::incompatible_environment))]
    IncompatibleEnvironment { plugin: String, reason: String },

    #[error("Invalid configuration document {path}: {reason}")]
    #[diagnostic(code(graft::registry::config))]
    Config { path: PathBuf, reason: String },

    #[error("Failed to access {path}: {source}")]
    #[diagnostic(code(graft::registry::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by [`TransformEngine::transform`](crate::TransformEngine::transform).
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("Transform requested before the engine accepted a blackboard")]
    #[diagnostic(code(graft::engine::not_accepted))]
    NotAccepted,

    #[error("Transformer '{transformer}' failed on class {class}: {source}")]
    #[diagnostic(code(graft::engine::transform_failure))]
    TransformFailure {
        transformer: String,
        class: String,
        #[source]
        source: TransformError,
    },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
