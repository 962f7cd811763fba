#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use graft_classfile::{AccessFlags, ClassFile, ConstantPool, Member};
use graft_core::{ClassDescriptor, PluginMetadata, TransformerData};
use graft_engine::{Blackboard, EngineConfig, TransformEngine};
use graft_plugin::{
    DiscoveredPlugin, LaunchPlugin, PluginOrigin, StaticHost, TransformError, Transformer,
    TransformerConfiguration,
};

pub type Log = Arc<Mutex<Vec<String>>>;

/// Bytes of an empty public class with one private `int value` field.
pub fn class_bytes(internal_name: &str) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let this_class = pool.add_class(internal_name).unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    let name = pool.add_utf8("value").unwrap();
    let descriptor = pool.add_utf8("I").unwrap();
    ClassFile {
        minor_version: 0,
        major_version: 61,
        constant_pool: pool,
        access: AccessFlags::PUBLIC | AccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: vec![Member {
            access: AccessFlags::PRIVATE,
            name_index: name,
            descriptor_index: descriptor,
            attributes: Vec::new(),
        }],
        methods: Vec::new(),
        attributes: Vec::new(),
    }
    .to_bytes()
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Leaves the class alone.
    Observe,
    /// Sets the class `final` flag.
    Finalize,
    /// Returns an error.
    Fail,
}

pub struct Recording {
    data: TransformerData,
    targets: Vec<ClassDescriptor>,
    behavior: Behavior,
    log: Log,
    configuration: Option<TransformerConfiguration>,
}

impl Recording {
    pub fn new(plugin: &str, name: &str, targets: &[&str], behavior: Behavior, log: &Log) -> Self {
        Self::with_default(plugin, name, targets, behavior, log, true)
    }

    pub fn with_default(
        plugin: &str,
        name: &str,
        targets: &[&str],
        behavior: Behavior,
        log: &Log,
        enabled_by_default: bool,
    ) -> Self {
        Self {
            data: TransformerData::builder(plugin, name)
                .enabled_by_default(enabled_by_default)
                .build()
                .unwrap(),
            targets: targets.iter().map(|t| ClassDescriptor::of(t).unwrap()).collect(),
            behavior,
            log: Arc::clone(log),
            configuration: None,
        }
    }

    pub fn shared(self) -> Arc<dyn Transformer> {
        Arc::new(self)
    }

    pub fn with_configuration(mut self, configuration: TransformerConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }
}

impl Transformer for Recording {
    fn data(&self) -> &TransformerData {
        &self.data
    }

    fn targets(&self) -> Vec<ClassDescriptor> {
        self.targets.clone()
    }

    fn configuration(&self) -> Option<&TransformerConfiguration> {
        self.configuration.as_ref()
    }

    fn transform(&self, class: &mut ClassFile) -> Result<(), TransformError> {
        self.log.lock().unwrap().push(self.data.registry_name());
        match self.behavior {
            Behavior::Observe => Ok(()),
            Behavior::Finalize => {
                class.access.insert(AccessFlags::FINAL);
                Ok(())
            }
            Behavior::Fail => Err(TransformError::Rejected("refusing".into())),
        }
    }
}

pub struct Fixture {
    metadata: PluginMetadata,
    transformers: Vec<Arc<dyn Transformer>>,
}

impl LaunchPlugin for Fixture {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn transformers(&self) -> Vec<Arc<dyn Transformer>> {
        self.transformers.clone()
    }
}

pub fn plugin(id: &str, transformers: Vec<Arc<dyn Transformer>>) -> DiscoveredPlugin {
    DiscoveredPlugin {
        plugin: Box::new(Fixture {
            metadata: PluginMetadata::builder(id)
                .version("1.0.0")
                .name(id.to_uppercase())
                .build()
                .unwrap(),
            transformers,
        }),
        type_name: format!("com.example.{id}.Plugin"),
        origin: PluginOrigin::Archive(PathBuf::from(format!("plugins/{id}.jar"))),
    }
}

pub fn blackboard(root: &Path, plugins: Vec<DiscoveredPlugin>) -> Blackboard {
    Blackboard::accept(plugins, Arc::new(StaticHost::new(root))).unwrap()
}

/// An engine over `plugins` with configuration loaded from `root`.
pub fn engine(root: &Path, plugins: Vec<DiscoveredPlugin>) -> TransformEngine {
    let board = blackboard(root, plugins);
    let config = board.load_config(root).unwrap();
    let mut engine = TransformEngine::new();
    engine.accept(board, config);
    engine
}

/// An engine with an explicit configuration, bypassing the documents.
pub fn engine_with(
    root: &Path,
    plugins: Vec<DiscoveredPlugin>,
    edit: impl FnOnce(&mut EngineConfig),
) -> TransformEngine {
    let board = blackboard(root, plugins);
    let mut config = board.load_config(root).unwrap();
    edit(&mut config);
    let mut engine = TransformEngine::new();
    engine.accept(board, config);
    engine
}
