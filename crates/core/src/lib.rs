//! Graft Core - Descriptor model and plugin metadata for the Graft transformer framework.

pub mod descriptor;
mod error;
pub mod metadata;

pub use descriptor::{ClassDescriptor, FieldDescriptor, MethodDescriptor, PrimitiveType};
pub use error::{Result, ValidationError};
pub use metadata::{
    PluginMetadata, PluginMetadataBuilder, TransformerData, TransformerDataBuilder,
    is_valid_plugin_id,
};
