//! The registry of accepted plugins and their transformers.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use graft_plugin::{
    DiscoveredPlugin, Environment, HostEnvironment, LaunchPlugin, PluginOrigin, Transformer,
};
use tracing::{debug, info};

use crate::config::{self, EngineConfig};
use crate::error::{RegistryError, Result};

/// A plugin accepted into the blackboard.
#[derive(Debug, Clone)]
pub struct RegisteredPlugin {
    plugin: Arc<dyn LaunchPlugin>,
    type_name: String,
    origin: PluginOrigin,
    description: String,
}

impl RegisteredPlugin {
    pub fn id(&self) -> &str {
        self.plugin.metadata().id()
    }

    pub fn plugin(&self) -> &Arc<dyn LaunchPlugin> {
        &self.plugin
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn origin(&self) -> &PluginOrigin {
        &self.origin
    }

    /// `<plugin name> (<origin>)`.
    pub fn describe(&self) -> &str {
        &self.description
    }

    pub fn transformers(&self) -> Vec<Arc<dyn Transformer>> {
        self.plugin.transformers()
    }
}

/// Accepted plugins in discovery order, their transformers, and the
/// environment they validated against.
///
/// Immutable once built.
#[derive(Debug)]
pub struct Blackboard {
    plugins: Vec<RegisteredPlugin>,
    transformers: Vec<Arc<dyn Transformer>>,
    environment: Environment,
}

impl Blackboard {
    /// Registers `discovered` and lets every plugin vet the environment.
    pub fn accept(
        discovered: Vec<DiscoveredPlugin>,
        host: Arc<dyn HostEnvironment>,
    ) -> Result<Self> {
        let mut plugins: Vec<RegisteredPlugin> = Vec::with_capacity(discovered.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in discovered {
            let description = entry.describe();
            let id = entry.plugin.metadata().id().to_string();
            if let Some(&existing) = index.get(&id) {
                return Err(RegistryError::DuplicatePlugin {
                    id,
                    existing: plugins[existing].description.clone(),
                    new: description,
                });
            }

            debug!(plugin_id = %id, origin = %entry.origin, "Registered plugin");
            index.insert(id, plugins.len());
            plugins.push(RegisteredPlugin {
                plugin: Arc::from(entry.plugin),
                type_name: entry.type_name,
                origin: entry.origin,
                description,
            });
        }

        let transformers = collect_transformers(&plugins)?;

        let environment = Environment::new(
            plugins.iter().map(|p| p.id().to_string()).collect(),
            host,
        );
        for registered in &plugins {
            registered
                .plugin
                .validate_environment(&environment)
                .map_err(|reason| RegistryError::IncompatibleEnvironment {
                    plugin: registered.id().to_string(),
                    reason,
                })?;
        }

        info!(
            plugins = plugins.len(),
            transformers = transformers.len(),
            "Accepted launch plugins"
        );

        Ok(Self {
            plugins,
            transformers,
            environment,
        })
    }

    pub fn plugins(&self) -> &[RegisteredPlugin] {
        &self.plugins
    }

    pub fn plugin(&self, id: &str) -> Option<&RegisteredPlugin> {
        self.plugins.iter().find(|p| p.id() == id)
    }

    /// Every transformer, grouped by plugin in discovery order.
    pub fn transformers(&self) -> &[Arc<dyn Transformer>] {
        &self.transformers
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Loads or creates the configuration documents under `root`.
    pub fn load_config(&self, root: &Path) -> Result<EngineConfig> {
        config::load_config(self, root)
    }
}

fn collect_transformers(plugins: &[RegisteredPlugin]) -> Result<Vec<Arc<dyn Transformer>>> {
    let mut names = HashSet::new();
    let mut transformers = Vec::new();

    for registered in plugins {
        for transformer in registered.transformers() {
            let data = transformer.data();
            let name = data.registry_name();

            if data.plugin_id() != registered.id() {
                return Err(RegistryError::ForeignTransformer {
                    transformer: name,
                    plugin: registered.id().to_string(),
                });
            }
            if transformer.targets().is_empty() {
                return Err(RegistryError::NoTargets(name));
            }
            if !names.insert(name.clone()) {
                return Err(RegistryError::DuplicateTransformer(name));
            }

            debug!(transformer = %name, "Registered transformer");
            transformers.push(transformer);
        }
    }
    Ok(transformers)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use graft_classfile::ClassFile;
    use graft_core::{ClassDescriptor, PluginMetadata, TransformerData};
    use graft_plugin::{StaticHost, TransformError};

    use super::*;

    struct Named {
        data: TransformerData,
        targets: Vec<ClassDescriptor>,
    }

    impl Transformer for Named {
        fn data(&self) -> &TransformerData {
            &self.data
        }

        fn targets(&self) -> Vec<ClassDescriptor> {
            self.targets.clone()
        }

        fn transform(&self, _class: &mut ClassFile) -> std::result::Result<(), TransformError> {
            Ok(())
        }
    }

    struct Fixture {
        metadata: PluginMetadata,
        transformers: Vec<Arc<dyn Transformer>>,
        veto: Option<String>,
    }

    impl LaunchPlugin for Fixture {
        fn metadata(&self) -> &PluginMetadata {
            &self.metadata
        }

        fn transformers(&self) -> Vec<Arc<dyn Transformer>> {
            self.transformers.clone()
        }

        fn validate_environment(&self, environment: &Environment) -> std::result::Result<(), String> {
            assert!(environment.has_plugin(self.metadata.id()));
            match &self.veto {
                Some(reason) => Err(reason.clone()),
                None => Ok(()),
            }
        }
    }

    fn transformer(plugin: &str, name: &str, targets: &[&str]) -> Arc<dyn Transformer> {
        Arc::new(Named {
            data: TransformerData::builder(plugin, name).build().unwrap(),
            targets: targets.iter().map(|t| ClassDescriptor::of(t).unwrap()).collect(),
        })
    }

    fn discovered(
        id: &str,
        name: &str,
        path: &str,
        transformers: Vec<Arc<dyn Transformer>>,
    ) -> DiscoveredPlugin {
        DiscoveredPlugin {
            plugin: Box::new(Fixture {
                metadata: PluginMetadata::builder(id)
                    .version("1.0.0")
                    .name(name)
                    .build()
                    .unwrap(),
                transformers,
                veto: None,
            }),
            type_name: format!("{id}.Plugin"),
            origin: PluginOrigin::Archive(PathBuf::from(path)),
        }
    }

    fn host() -> Arc<dyn HostEnvironment> {
        Arc::new(StaticHost::new("/opt/game"))
    }

    #[test]
    fn test_accept_preserves_discovery_order() {
        let board = Blackboard::accept(
            vec![
                discovered("beta", "Beta", "b.jar", vec![transformer("beta", "one", &["a.B"])]),
                discovered("alpha", "Alpha", "a.jar", vec![transformer("alpha", "two", &["a.A"])]),
            ],
            host(),
        )
        .unwrap();

        let ids: Vec<&str> = board.plugins().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["beta", "alpha"]);
        let names: Vec<String> = board
            .transformers()
            .iter()
            .map(|t| t.data().registry_name())
            .collect();
        assert_eq!(names, vec!["beta:one", "alpha:two"]);
        assert_eq!(board.environment().plugin_ids(), ["beta", "alpha"]);
        assert!(board.plugin("alpha").is_some());
    }

    #[test]
    fn test_duplicate_plugin_names_both_registrants() {
        let err = Blackboard::accept(
            vec![
                discovered("core", "Core", "first.jar", vec![]),
                discovered("core", "Core Fork", "second.jar", vec![]),
            ],
            host(),
        )
        .unwrap_err();

        match err {
            RegistryError::DuplicatePlugin { id, existing, new } => {
                assert_eq!(id, "core");
                assert!(existing.contains("Core") && existing.contains("first.jar"));
                assert!(new.contains("Core Fork") && new.contains("second.jar"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transformer_without_targets_rejected() {
        let err = Blackboard::accept(
            vec![discovered("core", "Core", "c.jar", vec![transformer("core", "empty", &[])])],
            host(),
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::NoTargets(name) if name == "core:empty"));
    }

    #[test]
    fn test_foreign_transformer_rejected() {
        let err = Blackboard::accept(
            vec![discovered("core", "Core", "c.jar", vec![transformer("other", "x", &["a.A"])])],
            host(),
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::ForeignTransformer { .. }));
    }

    #[test]
    fn test_duplicate_transformer_rejected() {
        let err = Blackboard::accept(
            vec![discovered(
                "core",
                "Core",
                "c.jar",
                vec![transformer("core", "x", &["a.A"]), transformer("core", "x", &["a.B"])],
            )],
            host(),
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTransformer(name) if name == "core:x"));
    }

    #[test]
    fn test_environment_veto_aborts() {
        let vetoing = DiscoveredPlugin {
            plugin: Box::new(Fixture {
                metadata: PluginMetadata::builder("picky")
                    .version("1.0.0")
                    .name("Picky")
                    .build()
                    .unwrap(),
                transformers: vec![],
                veto: Some("needs the server".into()),
            }),
            type_name: "picky.Plugin".into(),
            origin: PluginOrigin::Classpath(PathBuf::from("classes")),
        };

        let err = Blackboard::accept(vec![vetoing], host()).unwrap_err();
        match err {
            RegistryError::IncompatibleEnvironment { plugin, reason } => {
                assert_eq!(plugin, "picky");
                assert_eq!(reason, "needs the server");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
