//! Plugin error types.

use std::path::PathBuf;

use graft_classfile::ClassFileError;
use graft_core::ValidationError;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for plugin discovery.
#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    /// A candidate archive or manifest could not be read.
    #[error("Failed to read {path}: {source}")]
    #[diagnostic(code(graft::discovery::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An archive opened but one of its entries could not be read.
    #[error("Failed to read archive {path}: {reason}")]
    #[diagnostic(code(graft::discovery::archive))]
    Archive { path: PathBuf, reason: String },

    /// A manifest names a type the catalog has no factory for.
    #[error("Unknown launch plugin type '{type_name}' declared by {origin}")]
    #[diagnostic(
        code(graft::discovery::unknown_type),
        help("register a factory for this type in the plugin catalog")
    )]
    UnknownPluginType { type_name: String, origin: String },
}

/// Error raised by a transformer while rewriting a class.
#[derive(Debug, Error, Diagnostic)]
pub enum TransformError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    ClassFile(#[from] ClassFileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    /// The transformer refused the class.
    #[error("{0}")]
    #[diagnostic(code(graft::transform::rejected))]
    Rejected(String),
}

/// Error raised by a configuration triple.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid configuration document: {0}")]
    #[diagnostic(code(graft::config::document))]
    Document(#[from] serde_json::Error),

    #[error("Configuration document must be a JSON object")]
    #[diagnostic(code(graft::config::shape))]
    NotAnObject,
}

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
