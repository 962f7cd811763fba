//! Shared accessor body installation.

use graft_classfile::{AccessFlags, ClassFile, CodeBody};
use graft_core::MethodDescriptor;
use graft_plugin::TransformError;
use tracing::debug;

/// Index of the method matching `accessor`, checking its staticness.
pub(crate) fn find_accessor(
    class: &ClassFile,
    accessor: &MethodDescriptor,
) -> Result<Option<usize>, TransformError> {
    let Some(index) = class.find_method(accessor.name(), &accessor.descriptor()) else {
        debug!(accessor = %accessor, "Accessor not declared in class");
        return Ok(None);
    };
    if class.methods[index].is_static() != accessor.is_static() {
        return Err(TransformError::Rejected(format!(
            "accessor {accessor} does not match the staticness of the declared method"
        )));
    }
    Ok(Some(index))
}

/// Local slots used by the accessor's receiver and arguments.
pub(crate) fn accessor_locals(accessor: &MethodDescriptor) -> u16 {
    u16::from(!accessor.is_static()) + accessor.argument_slots()
}

/// Replaces the body of method `index` and makes it concrete.
pub(crate) fn install(class: &mut ClassFile, index: usize, body: &CodeBody) -> Result<(), TransformError> {
    let access = &mut class.methods[index].access;
    access.remove(AccessFlags::ABSTRACT);
    access.remove(AccessFlags::NATIVE);
    class.set_code(index, body)?;
    Ok(())
}
