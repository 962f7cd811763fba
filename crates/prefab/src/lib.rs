//! Graft Prefab - reusable transformers.
//!
//! - [`FieldAccess`] widens fields to public and generates getter thunks.
//! - [`MethodAccess`] widens methods to public and generates forwarding thunks.
//! - [`MethodPatches`] edits existing method bodies instruction by instruction.
//!
//! Each prefab resolves, from the class header alone, which role the class
//! plays for every target before editing any member.

mod access;
mod field_access;
mod method_access;
mod method_patch;
mod roles;
mod target;
mod thunk;
mod transformer;

#[cfg(test)]
mod fixtures;

pub use access::Access;
pub use field_access::FieldAccess;
pub use method_access::MethodAccess;
pub use method_patch::{InsnRewriter, MethodKey, MethodPatch, MethodPatches, PatchFn, rewrite_body};
pub use target::{FieldTarget, MethodTarget, TargetDescriptor};
pub use transformer::{Prefab, PrefabTransformer};
