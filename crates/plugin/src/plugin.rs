//! The launch plugin and transformer contracts.

use std::sync::Arc;

use graft_classfile::ClassFile;
use graft_core::{ClassDescriptor, PluginMetadata, TransformerData};

use crate::config::TransformerConfiguration;
use crate::environment::Environment;
use crate::error::TransformError;

/// A named unit of bytecode rewriting.
pub trait Transformer: Send + Sync {
    /// Identity and default state.
    fn data(&self) -> &TransformerData;

    /// Classes this transformer rewrites. Must not be empty.
    fn targets(&self) -> Vec<ClassDescriptor>;

    /// Settings round-tripped through `config/graft/plugins/<id>/<name>.json`.
    fn configuration(&self) -> Option<&TransformerConfiguration> {
        None
    }

    /// Rewrites `class` in place.
    ///
    /// Leaving the class untouched is a no-op: the engine only counts a run as
    /// a mutation when the written bytes differ from the input.
    fn transform(&self, class: &mut ClassFile) -> Result<(), TransformError>;
}

/// A discovered unit contributing metadata and transformers.
pub trait LaunchPlugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    fn transformers(&self) -> Vec<Arc<dyn Transformer>>;

    /// Dotted package prefixes whose archive entries belong to this plugin.
    fn root_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called once after every plugin is registered; an `Err` vetoes startup.
    fn validate_environment(&self, _environment: &Environment) -> Result<(), String> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn LaunchPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchPlugin")
            .field("id", &self.metadata().id())
            .finish()
    }
}

impl std::fmt::Debug for dyn Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("name", &self.data().registry_name())
            .finish()
    }
}
