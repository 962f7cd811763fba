//! Targeted method-body patches.
//!
//! Unlike the access prefabs, a patch keeps the original body and edits its
//! instruction list in place, for surgical changes such as swapping a
//! constant or redirecting a single call.

use graft_classfile::{ClassFile, CodeBody, ConstantPool, Insn};
use graft_core::{ClassDescriptor, MethodDescriptor};
use graft_plugin::TransformError;
use tracing::debug;

use crate::transformer::Prefab;

/// Edits a decoded method body.
pub type PatchFn =
    Box<dyn Fn(&mut CodeBody, &mut ConstantPool) -> Result<(), TransformError> + Send + Sync>;

/// Per-instruction callback: `Some` replaces the instruction, `None` keeps it.
pub trait InsnRewriter: Send + Sync {
    fn rewrite(
        &self,
        insn: &Insn,
        pool: &mut ConstantPool,
    ) -> Result<Option<Vec<Insn>>, TransformError>;
}

impl<F> InsnRewriter for F
where
    F: Fn(&Insn, &mut ConstantPool) -> Result<Option<Vec<Insn>>, TransformError> + Send + Sync,
{
    fn rewrite(
        &self,
        insn: &Insn,
        pool: &mut ConstantPool,
    ) -> Result<Option<Vec<Insn>>, TransformError> {
        self(insn, pool)
    }
}

/// Runs `rewriter` over every instruction of `body`.
pub fn rewrite_body(
    body: &mut CodeBody,
    pool: &mut ConstantPool,
    rewriter: &dyn InsnRewriter,
) -> Result<(), TransformError> {
    let mut rewritten = Vec::with_capacity(body.instructions.len());
    for insn in body.instructions.drain(..) {
        match rewriter.rewrite(&insn, pool)? {
            Some(replacement) => rewritten.extend(replacement),
            None => rewritten.push(insn),
        }
    }
    body.instructions = rewritten;
    Ok(())
}

/// Exact method identity: owner class, name and binary descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    owner: ClassDescriptor,
    name: String,
    descriptor: String,
}

impl MethodKey {
    pub fn new(owner: ClassDescriptor, method: &MethodDescriptor) -> Self {
        Self {
            owner,
            name: method.name().to_string(),
            descriptor: method.descriptor(),
        }
    }

    pub fn owner(&self) -> &ClassDescriptor {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

/// Patches keyed by exact method signature, applied in registration order.
#[derive(Default)]
pub struct MethodPatches {
    patches: Vec<(MethodKey, PatchFn)>,
}

impl MethodPatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a patch over the whole body.
    pub fn patch(
        mut self,
        owner: ClassDescriptor,
        method: &MethodDescriptor,
        patch: impl Fn(&mut CodeBody, &mut ConstantPool) -> Result<(), TransformError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.patches
            .push((MethodKey::new(owner, method), Box::new(patch)));
        self
    }

    /// Adds a per-instruction rewrite.
    pub fn rewrite(
        self,
        owner: ClassDescriptor,
        method: &MethodDescriptor,
        rewriter: impl InsnRewriter + 'static,
    ) -> Self {
        self.patch(owner, method, move |body, pool| {
            rewrite_body(body, pool, &rewriter)
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &MethodKey> {
        self.patches.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

impl std::fmt::Debug for MethodPatches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Single-method convenience over [`MethodPatches`].
pub struct MethodPatch;

impl MethodPatch {
    pub fn single(
        owner: ClassDescriptor,
        method: &MethodDescriptor,
        patch: impl Fn(&mut CodeBody, &mut ConstantPool) -> Result<(), TransformError>
        + Send
        + Sync
        + 'static,
    ) -> MethodPatches {
        MethodPatches::new().patch(owner, method, patch)
    }
}

impl Prefab for MethodPatches {
    fn target_classes(&self) -> Vec<ClassDescriptor> {
        let mut out: Vec<ClassDescriptor> = Vec::new();
        for key in self.keys() {
            if !out.contains(key.owner()) {
                out.push(key.owner().clone());
            }
        }
        out
    }

    fn apply(&self, class: &mut ClassFile) -> Result<(), TransformError> {
        let descriptor = class.descriptor()?;

        for (key, patch) in self.patches.iter().filter(|(key, _)| key.owner == descriptor) {
            let Some(index) = class.find_method(&key.name, &key.descriptor) else {
                debug!(class = %descriptor, method = %key.name, "Patched method not declared");
                continue;
            };
            let Some(original) = class.code(index)? else {
                debug!(class = %descriptor, method = %key.name, "Patched method has no body");
                continue;
            };

            let mut body = original.clone();
            patch(&mut body, &mut class.constant_pool)?;
            if body != original {
                class.set_code(index, &body)?;
                debug!(class = %descriptor, method = %key.name, "Patched method body");
            }
        }

        Ok(())
    }
}
