//! Plugins linked into this binary.

use graft_plugin::PluginCatalog;

/// The catalog used to instantiate discovered plugins.
///
/// The stock binary links no plugins; hosts embedding Graft register theirs
/// here with [`PluginCatalog::register`].
pub fn linked() -> PluginCatalog {
    PluginCatalog::new()
}
