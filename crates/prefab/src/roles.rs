//! Role resolution from the class header.

use graft_core::ClassDescriptor;

/// A target with an owner class and an accessor class.
pub(crate) trait Roles {
    fn owner(&self) -> &ClassDescriptor;
    fn accessor_owner(&self) -> &ClassDescriptor;
}

/// Targets for which the visited class plays each role.
///
/// A class may own one target's member and host another target's accessor,
/// or both for the same target; every binding is kept.
pub(crate) struct Bindings<'a, T> {
    pub(crate) owned: Vec<&'a T>,
    pub(crate) accessors: Vec<&'a T>,
}

impl<T> Bindings<'_, T> {
    pub(crate) fn is_empty(&self) -> bool {
        self.owned.is_empty() && self.accessors.is_empty()
    }
}

pub(crate) fn resolve<'a, T: Roles>(targets: &'a [T], class: &ClassDescriptor) -> Bindings<'a, T> {
    Bindings {
        owned: targets.iter().filter(|t| t.owner() == class).collect(),
        accessors: targets.iter().filter(|t| t.accessor_owner() == class).collect(),
    }
}

/// Owner and accessor classes of `targets`, first occurrence order.
pub(crate) fn classes<T: Roles>(targets: &[T]) -> Vec<ClassDescriptor> {
    let mut out: Vec<ClassDescriptor> = Vec::new();
    for target in targets {
        for class in [target.owner(), target.accessor_owner()] {
            if !out.contains(class) {
                out.push(class.clone());
            }
        }
    }
    out
}
