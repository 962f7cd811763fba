//! Mixed field and method access targets as one prefab.

use graft_classfile::ClassFile;
use graft_core::ClassDescriptor;
use graft_plugin::TransformError;

use crate::field_access::FieldAccess;
use crate::method_access::MethodAccess;
use crate::target::TargetDescriptor;
use crate::transformer::Prefab;

#[derive(Debug, Clone, Default)]
pub struct Access {
    fields: FieldAccess,
    methods: MethodAccess,
}

impl Access {
    pub fn new(targets: impl IntoIterator<Item = TargetDescriptor>) -> Self {
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        for target in targets {
            match target {
                TargetDescriptor::Field(target) => fields.push(target),
                TargetDescriptor::Method(target) => methods.push(target),
            }
        }
        Self {
            fields: FieldAccess::new(fields),
            methods: MethodAccess::new(methods),
        }
    }
}

impl Prefab for Access {
    fn target_classes(&self) -> Vec<ClassDescriptor> {
        let mut classes = self.fields.target_classes();
        for class in self.methods.target_classes() {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }
        classes
    }

    fn apply(&self, class: &mut ClassFile) -> Result<(), TransformError> {
        self.fields.apply(class)?;
        self.methods.apply(class)
    }
}
