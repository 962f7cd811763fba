//! Graft Plugin - launch plugin contracts and discovery.
//!
//! A launch plugin contributes [`PluginMetadata`](graft_core::PluginMetadata)
//! and a set of [`Transformer`]s. Plugins are found by [`discovery`] and
//! constructed through the host's [`PluginCatalog`].

mod catalog;
mod config;
pub mod discovery;
mod environment;
mod error;
mod plugin;

pub use catalog::{PluginCatalog, PluginFactory};
pub use config::TransformerConfiguration;
pub use discovery::{
    ArchiveManifest, Classpath, DiscoveredPlugin, JarEntryRef, PluginOrigin, discover,
    discover_jar_entries,
};
pub use environment::{Environment, HostEnvironment, StaticHost};
pub use error::{ConfigError, DiscoveryError, Result, TransformError};
pub use plugin::{LaunchPlugin, Transformer};
