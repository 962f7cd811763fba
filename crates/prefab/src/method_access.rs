//! Method-access prefab: public methods and forwarding thunks.

use graft_classfile::opcode::{INVOKESTATIC, INVOKEVIRTUAL};
use graft_classfile::{ClassFile, ClassFileError, CodeBody, ConstantPool, Insn};
use graft_core::ClassDescriptor;
use graft_plugin::TransformError;
use tracing::debug;

use crate::roles::{self, Roles};
use crate::target::MethodTarget;
use crate::thunk;
use crate::transformer::Prefab;

impl Roles for MethodTarget {
    fn owner(&self) -> &ClassDescriptor {
        MethodTarget::owner(self)
    }

    fn accessor_owner(&self) -> &ClassDescriptor {
        MethodTarget::accessor_owner(self)
    }
}

/// Widens target methods to public and turns their accessors into forwarders.
#[derive(Debug, Clone, Default)]
pub struct MethodAccess {
    targets: Vec<MethodTarget>,
}

impl MethodAccess {
    pub fn new(targets: impl IntoIterator<Item = MethodTarget>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    pub fn targets(&self) -> &[MethodTarget] {
        &self.targets
    }
}

impl Prefab for MethodAccess {
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
            let method = target.method();
            match class.find_method(method.name(), &method.descriptor()) {
                Some(index) => {
                    if class.methods[index].access.widen_to_public() {
                        debug!(class = %descriptor, method = %method.name(), "Widened method to public");
                    }
                }
                None => debug!(class = %descriptor, method = %method.name(), "Target method not declared"),
            }
        }

        for target in &bindings.accessors {
            let Some(index) = thunk::find_accessor(class, target.accessor())? else {
                continue;
            };
            let body = forwarder(target, &mut class.constant_pool)?;
            thunk::install(class, index, &body)?;
            debug!(class = %descriptor, target = %target, "Installed method accessor");
        }

        Ok(())
    }
}

/// Body forwarding the accessor's arguments to the target method.
pub(crate) fn forwarder(target: &MethodTarget, pool: &mut ConstantPool) -> Result<CodeBody, ClassFileError> {
    let method = target.method();
    let accessor = target.accessor();
    let method_ref = pool.add_method_ref(
        &target.owner().internal_name(),
        method.name(),
        &method.descriptor(),
        target.interface_owner(),
    )?;

    let forwarded = accessor.argument_slots();
    let mut body = CodeBody::new(
        forwarded.max(method.return_type().slot_size()),
        thunk::accessor_locals(accessor),
    );

    let mut slot = u16::from(!accessor.is_static());
    for argument in accessor.arguments() {
        body.instructions.push(Insn::load(argument, slot));
        slot += argument.slot_size();
    }

    body.instructions.push(if method.is_static() {
        Insn::Method {
            opcode: INVOKESTATIC,
            index: method_ref,
        }
    } else if target.interface_owner() {
        Insn::InvokeInterface {
            index: method_ref,
            count: (1 + method.argument_slots()) as u8,
        }
    } else {
        Insn::Method {
            opcode: INVOKEVIRTUAL,
            index: method_ref,
        }
    });
    body.instructions.push(Insn::ret(method.return_type()));
    Ok(body)
}
