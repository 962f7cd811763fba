//! Prefabs as transformers.

use graft_classfile::ClassFile;
use graft_core::{ClassDescriptor, TransformerData};
use graft_plugin::{TransformError, Transformer, TransformerConfiguration};

/// A reusable rewrite that knows which classes it touches.
pub trait Prefab: Send + Sync {
    fn target_classes(&self) -> Vec<ClassDescriptor>;

    fn apply(&self, class: &mut ClassFile) -> Result<(), TransformError>;
}

/// Wraps a [`Prefab`] with transformer identity.
#[derive(Debug)]
pub struct PrefabTransformer<P> {
    data: TransformerData,
    prefab: P,
    configuration: Option<TransformerConfiguration>,
}

impl<P: Prefab> PrefabTransformer<P> {
    pub fn new(data: TransformerData, prefab: P) -> Self {
        Self {
            data,
            prefab,
            configuration: None,
        }
    }

    pub fn with_configuration(mut self, configuration: TransformerConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn prefab(&self) -> &P {
        &self.prefab
    }
}

impl<P: Prefab> Transformer for PrefabTransformer<P> {
    fn data(&self) -> &TransformerData {
        &self.data
    }

    fn targets(&self) -> Vec<ClassDescriptor> {
        self.prefab.target_classes()
    }

    fn configuration(&self) -> Option<&TransformerConfiguration> {
        self.configuration.as_ref()
    }

    fn transform(&self, class: &mut ClassFile) -> Result<(), TransformError> {
        self.prefab.apply(class)
    }
}
