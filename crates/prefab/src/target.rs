//! Validated field and method access targets.

use std::fmt;

use graft_core::{ClassDescriptor, FieldDescriptor, MethodDescriptor, Result, ValidationError};

/// A field paired with the accessor method that should read it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldTarget {
    owner: ClassDescriptor,
    field: FieldDescriptor,
    accessor_owner: ClassDescriptor,
    accessor: MethodDescriptor,
}

impl FieldTarget {
    /// Validates that `accessor` can return `field`.
    ///
    /// The accessor must return the field's type. A static field is read by
    /// an accessor without arguments; an instance field by an accessor taking
    /// exactly one argument, the receiver, of the owner's type.
    pub fn new(
        owner: ClassDescriptor,
        field: FieldDescriptor,
        accessor_owner: ClassDescriptor,
        accessor: MethodDescriptor,
    ) -> Result<Self> {
        if accessor.return_type() != field.field_type() {
            return Err(ValidationError::InvalidTarget(format!(
                "accessor {accessor} returns {} but field {field} has type {}",
                accessor.return_type(),
                field.field_type()
            )));
        }

        if field.is_static() {
            if !accessor.arguments().is_empty() {
                return Err(ValidationError::InvalidTarget(format!(
                    "accessor {accessor} of static field {field} must take no arguments"
                )));
            }
        } else if accessor.arguments() != std::slice::from_ref(&owner) {
            return Err(ValidationError::InvalidTarget(format!(
                "accessor {accessor} of instance field {field} must take exactly one {owner} argument"
            )));
        }

        Ok(Self {
            owner,
            field,
            accessor_owner,
            accessor,
        })
    }

    pub fn owner(&self) -> &ClassDescriptor {
        &self.owner
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    pub fn accessor_owner(&self) -> &ClassDescriptor {
        &self.accessor_owner
    }

    pub fn accessor(&self) -> &MethodDescriptor {
        &self.accessor
    }
}

impl fmt::Display for FieldTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} via {}.{}",
            self.owner,
            self.field.name(),
            self.accessor_owner,
            self.accessor.name()
        )
    }
}

/// A method paired with the accessor that should forward to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodTarget {
    owner: ClassDescriptor,
    method: MethodDescriptor,
    accessor_owner: ClassDescriptor,
    accessor: MethodDescriptor,
    interface_owner: bool,
}

impl MethodTarget {
    /// Validates that `accessor` can forward to `method`.
    ///
    /// Return types must match. A static target takes the accessor's
    /// arguments unchanged; an instance target takes the receiver first,
    /// typed as the owner. A method cannot be its own accessor.
    pub fn new(
        owner: ClassDescriptor,
        method: MethodDescriptor,
        accessor_owner: ClassDescriptor,
        accessor: MethodDescriptor,
    ) -> Result<Self> {
        if accessor.return_type() != method.return_type() {
            return Err(ValidationError::InvalidTarget(format!(
                "accessor {accessor} returns {} but {method} returns {}",
                accessor.return_type(),
                method.return_type()
            )));
        }

        let forwarded = if method.is_static() {
            accessor.arguments()
        } else {
            match accessor.arguments().split_first() {
                Some((receiver, rest)) if *receiver == owner => rest,
                _ => {
                    return Err(ValidationError::InvalidTarget(format!(
                        "accessor {accessor} of instance method {method} must take a {owner} receiver first"
                    )));
                }
            }
        };
        if forwarded != method.arguments() {
            return Err(ValidationError::InvalidTarget(format!(
                "accessor {accessor} arguments do not match {method}"
            )));
        }

        if owner == accessor_owner
            && method.name() == accessor.name()
            && method.descriptor() == accessor.descriptor()
        {
            return Err(ValidationError::InvalidTarget(format!(
                "{owner}.{} cannot be its own accessor",
                method.name()
            )));
        }

        Ok(Self {
            owner,
            method,
            accessor_owner,
            accessor,
            interface_owner: false,
        })
    }

    /// Marks the owner as an interface so instance calls use `invokeinterface`.
    pub fn with_interface_owner(mut self) -> Self {
        self.interface_owner = true;
        self
    }

    pub fn owner(&self) -> &ClassDescriptor {
        &self.owner
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn accessor_owner(&self) -> &ClassDescriptor {
        &self.accessor_owner
    }

    pub fn accessor(&self) -> &MethodDescriptor {
        &self.accessor
    }

    pub fn interface_owner(&self) -> bool {
        self.interface_owner
    }
}

impl fmt::Display for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} via {}.{}",
            self.owner,
            self.method.name(),
            self.accessor_owner,
            self.accessor.name()
        )
    }
}

/// Either kind of access target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetDescriptor {
    Field(FieldTarget),
    Method(MethodTarget),
}

impl TargetDescriptor {
    pub fn field(
        owner: ClassDescriptor,
        field: FieldDescriptor,
        accessor_owner: ClassDescriptor,
        accessor: MethodDescriptor,
    ) -> Result<Self> {
        FieldTarget::new(owner, field, accessor_owner, accessor).map(Self::Field)
    }

    pub fn method(
        owner: ClassDescriptor,
        method: MethodDescriptor,
        accessor_owner: ClassDescriptor,
        accessor: MethodDescriptor,
    ) -> Result<Self> {
        MethodTarget::new(owner, method, accessor_owner, accessor).map(Self::Method)
    }

    pub fn owner(&self) -> &ClassDescriptor {
        match self {
            Self::Field(target) => target.owner(),
            Self::Method(target) => target.owner(),
        }
    }

    pub fn accessor_owner(&self) -> &ClassDescriptor {
        match self {
            Self::Field(target) => target.accessor_owner(),
            Self::Method(target) => target.accessor_owner(),
        }
    }
}

impl From<FieldTarget> for TargetDescriptor {
    fn from(target: FieldTarget) -> Self {
        Self::Field(target)
    }
}

impl From<MethodTarget> for TargetDescriptor {
    fn from(target: MethodTarget) -> Self {
        Self::Method(target)
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(target) => target.fmt(f),
            Self::Method(target) => target.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use graft_core::PrimitiveType;

    use super::*;

    fn class(name: &str) -> ClassDescriptor {
        ClassDescriptor::of(name).unwrap()
    }

    fn int() -> ClassDescriptor {
        ClassDescriptor::from_primitive(PrimitiveType::Int)
    }

    #[test]
    fn test_field_accessor_return_type_must_match() {
        let field = FieldDescriptor::new("count", int(), true).unwrap();
        let accessor = MethodDescriptor::new("getCount", vec![], class("java.lang.String"), true).unwrap();
        let result = FieldTarget::new(class("a.Owner"), field, class("a.Access"), accessor);
        assert!(matches!(result, Err(ValidationError::InvalidTarget(_))));
    }

    #[test]
    fn test_static_field_zero_arg_accessor_builds() {
        let field = FieldDescriptor::new("count", int(), true).unwrap();
        let accessor = MethodDescriptor::new("getCount", vec![], int(), true).unwrap();
        assert!(FieldTarget::new(class("a.Owner"), field, class("a.Access"), accessor).is_ok());
    }

    #[test]
    fn test_instance_field_zero_arg_accessor_fails() {
        let field = FieldDescriptor::new("count", int(), false).unwrap();
        let accessor = MethodDescriptor::new("getCount", vec![], int(), true).unwrap();
        assert!(FieldTarget::new(class("a.Owner"), field, class("a.Access"), accessor).is_err());
    }

    #[test]
    fn test_instance_field_receiver_accessor_builds() {
        let field = FieldDescriptor::new("count", int(), false).unwrap();
        let accessor = MethodDescriptor::new("getCount", vec![class("a.Owner")], int(), true).unwrap();
        assert!(FieldTarget::new(class("a.Owner"), field, class("a.Access"), accessor).is_ok());

        let wrong = MethodDescriptor::new("getCount", vec![class("a.Other")], int(), true).unwrap();
        let field = FieldDescriptor::new("count", int(), false).unwrap();
        assert!(FieldTarget::new(class("a.Owner"), field, class("a.Access"), wrong).is_err());
    }

    #[test]
    fn test_method_target_argument_alignment() {
        let owner = class("a.Owner");
        let method = MethodDescriptor::new("compute", vec![int()], int(), false).unwrap();

        let good = MethodDescriptor::new("callCompute", vec![owner.clone(), int()], int(), true).unwrap();
        assert!(MethodTarget::new(owner.clone(), method.clone(), class("a.Access"), good).is_ok());

        let missing_receiver = MethodDescriptor::new("callCompute", vec![int()], int(), true).unwrap();
        assert!(MethodTarget::new(owner.clone(), method.clone(), class("a.Access"), missing_receiver).is_err());

        let wrong_return = MethodDescriptor::new("callCompute", vec![owner.clone(), int()], class("java.lang.Object"), true).unwrap();
        assert!(MethodTarget::new(owner, method, class("a.Access"), wrong_return).is_err());
    }

    #[test]
    fn test_static_method_target_takes_same_arguments() {
        let method = MethodDescriptor::new("hash", vec![int(), int()], int(), true).unwrap();
        let accessor = MethodDescriptor::new("callHash", vec![int(), int()], int(), true).unwrap();
        assert!(MethodTarget::new(class("a.Owner"), method, class("a.Access"), accessor).is_ok());
    }

    #[test]
    fn test_method_cannot_access_itself() {
        let method = MethodDescriptor::new("hash", vec![int()], int(), true).unwrap();
        let result = MethodTarget::new(class("a.Owner"), method.clone(), class("a.Owner"), method);
        assert!(matches!(result, Err(ValidationError::InvalidTarget(_))));
    }
}
