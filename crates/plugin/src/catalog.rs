//! Link-time table of plugin constructors.

use std::collections::BTreeMap;

use crate::plugin::LaunchPlugin;

/// Constructs a plugin instance.
pub type PluginFactory = fn() -> Box<dyn LaunchPlugin>;

/// Maps the type names found in plugin manifests to constructors.
///
/// The host fills the catalog with every plugin it links; discovery only ever
/// instantiates types registered here.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `type_name`, replacing any earlier entry.
    pub fn register(&mut self, type_name: impl Into<String>, factory: PluginFactory) -> &mut Self {
        self.factories.insert(type_name.into(), factory);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, type_name: impl Into<String>, factory: PluginFactory) -> Self {
        self.register(type_name, factory);
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Builds a fresh instance, or `None` for an unregistered type.
    pub fn instantiate(&self, type_name: &str) -> Option<Box<dyn LaunchPlugin>> {
        self.factories.get(type_name).map(|factory| factory())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use graft_core::PluginMetadata;

    use super::*;
    use crate::plugin::Transformer;

    struct Empty(PluginMetadata);

    impl LaunchPlugin for Empty {
        fn metadata(&self) -> &PluginMetadata {
            &self.0
        }

        fn transformers(&self) -> Vec<Arc<dyn Transformer>> {
            Vec::new()
        }
    }

    fn empty() -> Box<dyn LaunchPlugin> {
        Box::new(Empty(
            PluginMetadata::builder("empty")
                .version("1.0.0")
                .name("Empty")
                .build()
                .unwrap(),
        ))
    }

    #[test]
    fn test_instantiate_registered_type() {
        let catalog = PluginCatalog::new().with("com.example.Empty", empty);
        let plugin = catalog.instantiate("com.example.Empty").unwrap();
        assert_eq!(plugin.metadata().id(), "empty");
        assert_eq!(catalog.type_names().collect::<Vec<_>>(), vec!["com.example.Empty"]);
    }

    #[test]
    fn test_unknown_type() {
        let catalog = PluginCatalog::new();
        assert!(catalog.instantiate("com.example.Missing").is_none());
        assert!(catalog.is_empty());
    }
}
