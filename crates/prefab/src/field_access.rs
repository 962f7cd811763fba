//! Field-access prefab: public fields and getter thunks.

use graft_classfile::opcode::{ALOAD, GETFIELD, GETSTATIC};
use graft_classfile::{ClassFile, ClassFileError, CodeBody, ConstantPool, Insn};
use graft_core::ClassDescriptor;
use graft_plugin::TransformError;
use tracing::debug;

use crate::roles::{self, Roles};
use crate::target::FieldTarget;
use crate::thunk;
use crate::transformer::Prefab;

impl Roles for FieldTarget {
    fn owner(&self) -> &ClassDescriptor {
        FieldTarget::owner(self)
    }

    fn accessor_owner(&self) -> &ClassDescriptor {
        FieldTarget::accessor_owner(self)
    }
}

/// Widens target fields to public and turns their accessors into getters.
#[derive(Debug, Clone, Default)]
pub struct FieldAccess {
    targets: Vec<FieldTarget>,
}

impl FieldAccess {
    pub fn new(targets: impl IntoIterator<Item = FieldTarget>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    pub fn targets(&self) -> &[FieldTarget] {
        &self.targets
    }
}

impl Prefab for FieldAccess {
    fn target_classes(&self) -> Vec<ClassDescriptor> {
        roles::classes(&self.targets)
    }

    fn apply(&self, class: &mut ClassFile) -> Result<(), TransformError> {
        let descriptor = class.descriptor()?;
        let bindings = roles::resolve(&self.targets, &descriptor);
        if bindings.is_empty() {
            return Ok(());
        }

        for target in &bindings.owned {
            let field = target.field();
            match class.find_field(field.name(), &field.descriptor()) {
                Some(index) => {
                    if class.fields[index].access.widen_to_public() {
                        debug!(class = %descriptor, field = %field.name(), "Widened field to public");
                    }
                }
                None => debug!(class = %descriptor, field = %field.name(), "Target field not declared"),
            }
        }

        for target in &bindings.accessors {
            let Some(index) = thunk::find_accessor(class, target.accessor())? else {
                continue;
            };
            let body = getter(target, &mut class.constant_pool)?;
            thunk::install(class, index, &body)?;
            debug!(class = %descriptor, target = %target, "Installed field accessor");
        }

        Ok(())
    }
}

/// Body reading the target field and returning it.
pub(crate) fn getter(target: &FieldTarget, pool: &mut ConstantPool) -> Result<CodeBody, ClassFileError> {
    let field = target.field();
    let accessor = target.accessor();
    let field_ref = pool.add_field_ref(
        &target.owner().internal_name(),
        field.name(),
        &field.descriptor(),
    )?;

    let mut body = CodeBody::new(field.field_type().slot_size(), thunk::accessor_locals(accessor));
    if field.is_static() {
        body.instructions.push(Insn::Field {
            opcode: GETSTATIC,
            index: field_ref,
        });
    } else {
        let receiver = u16::from(!accessor.is_static());
        body.instructions.push(Insn::Var {
            opcode: ALOAD,
            index: receiver,
        });
        body.instructions.push(Insn::Field {
            opcode: GETFIELD,
            index: field_ref,
        });
        body.max_stack = body.max_stack.max(1);
    }
    body.instructions.push(Insn::ret(field.field_type()));
    Ok(body)
}
