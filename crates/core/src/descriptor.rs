//! Canonical identity objects for classes, fields and methods.
//!
//! Every class name form (`java/lang/String`, `java.lang.String`,
//! `Ljava/lang/String;`) resolves to one interned [`ClassDescriptor`], so two
//! descriptors are equal exactly when they point at the same allocation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, ValidationError};

static INTERNER: Lazy<DashMap<Box<str>, ClassDescriptor>> = Lazy::new(DashMap::new);

/// JVM primitive types, including `void` for method returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveType {
    const ALL: [PrimitiveType; 9] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Char,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
        PrimitiveType::Void,
    ];

    /// Returns the source-level keyword (`int`, `boolean`, ...).
    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Void => "void",
        }
    }

    /// Returns the binary-format descriptor character (`I`, `Z`, ...).
    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
            PrimitiveType::Void => 'V',
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == keyword)
    }

    pub fn from_descriptor_char(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.descriptor_char() == c)
    }

    /// Number of local variable / operand stack slots a value occupies.
    pub fn slot_size(self) -> u16 {
        match self {
            PrimitiveType::Long | PrimitiveType::Double => 2,
            PrimitiveType::Void => 0,
            _ => 1,
        }
    }
}

struct Inner {
    /// Canonical dotted name, with one `[]` suffix per array dimension.
    name: Box<str>,
    /// Element type name without array suffixes.
    element: Box<str>,
    element_primitive: Option<PrimitiveType>,
    dimensions: u8,
}

/// Interned identity of a class, primitive or array type.
#[derive(Clone)]
pub struct ClassDescriptor(Arc<Inner>);

impl ClassDescriptor {
    /// Resolves any dotted, slashed or binary-format name to its canonical descriptor.
    pub fn of(name: &str) -> Result<Self> {
        let name = name.trim();
        if is_descriptor_form(name) {
            return Self::from_descriptor(name);
        }
        let (element, dimensions) = dotted_parts(name)?;
        Ok(Self::intern(&element, dimensions))
    }

    /// Resolves `name` like [`of`](Self::of), but only to a descriptor that is
    /// already interned. The intern table never grows through this call.
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        let (element, dimensions) = if is_descriptor_form(name) {
            descriptor_parts(name)?
        } else {
            dotted_parts(name).ok()?
        };
        INTERNER
            .get(canonical_key(&element, dimensions).as_str())
            .map(|found| found.value().clone())
    }

    /// Resolves a slashed internal name (`java/lang/String`) or an array descriptor.
    pub fn from_internal_name(name: &str) -> Result<Self> {
        if name.starts_with('[') {
            Self::from_descriptor(name)
        } else {
            Self::of(name)
        }
    }

    /// Resolves a complete binary-format field descriptor (`I`, `[J`, `Lfoo/Bar;`).
    pub fn from_descriptor(descriptor: &str) -> Result<Self> {
        let (descriptor_type, rest) = parse_field_type(descriptor)?;
        if !rest.is_empty() {
            return Err(ValidationError::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(descriptor_type)
    }

    pub fn from_primitive(primitive: PrimitiveType) -> Self {
        Self::intern(primitive.keyword(), 0)
    }

    fn intern(element: &str, dimensions: u8) -> Self {
        let canonical = canonical_key(element, dimensions);
        if let Some(found) = INTERNER.get(canonical.as_str()) {
            return found.value().clone();
        }

        let key: Box<str> = canonical.into_boxed_str();
        INTERNER
            .entry(key.clone())
            .or_insert_with(|| {
                ClassDescriptor(Arc::new(Inner {
                    name: key,
                    element: element.into(),
                    element_primitive: PrimitiveType::from_keyword(element),
                    dimensions,
                }))
            })
            .value()
            .clone()
    }

    /// Canonical dotted name (`java.lang.String`, `int`, `int[]`).
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the primitive tag, for non-array primitive descriptors only.
    pub fn primitive(&self) -> Option<PrimitiveType> {
        if self.0.dimensions == 0 {
            self.0.element_primitive
        } else {
            None
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive().is_some()
    }

    pub fn is_void(&self) -> bool {
        self.primitive() == Some(PrimitiveType::Void)
    }

    pub fn is_array(&self) -> bool {
        self.0.dimensions > 0
    }

    pub fn dimensions(&self) -> u8 {
        self.0.dimensions
    }

    /// Name as used in `CONSTANT_Class` entries.
    pub fn internal_name(&self) -> String {
        if self.is_array() {
            self.descriptor()
        } else if self.is_primitive() {
            self.0.name.to_string()
        } else {
            self.0.name.replace('.', "/")
        }
    }

    /// Binary-format field descriptor.
    pub fn descriptor(&self) -> String {
        let mut out = "[".repeat(self.0.dimensions as usize);
        match self.0.element_primitive {
            Some(primitive) => out.push(primitive.descriptor_char()),
            None => {
                out.push('L');
                out.push_str(&self.0.element.replace('.', "/"));
                out.push(';');
            }
        }
        out
    }

    /// Local variable / operand stack slots taken by a value of this type.
    pub fn slot_size(&self) -> u16 {
        self.primitive().map(PrimitiveType::slot_size).unwrap_or(1)
    }
}

impl PartialEq for ClassDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ClassDescriptor {}

impl Hash for ClassDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl PartialOrd for ClassDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassDescriptor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.name.cmp(&other.0.name)
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassDescriptor({})", self.0.name)
    }
}

impl From<PrimitiveType> for ClassDescriptor {
    fn from(primitive: PrimitiveType) -> Self {
        Self::from_primitive(primitive)
    }
}

impl Serialize for ClassDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ClassDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::of(&name).map_err(serde::de::Error::custom)
    }
}

/// Parses one field type off the front of `input`, returning the remainder.
pub fn parse_field_type(input: &str) -> Result<(ClassDescriptor, &str)> {
    let invalid = || ValidationError::InvalidDescriptor(input.to_string());

    let dimensions = input.bytes().take_while(|b| *b == b'[').count();
    let dimensions = u8::try_from(dimensions).map_err(|_| invalid())?;
    let rest = &input[dimensions as usize..];

    let mut chars = rest.chars();
    let tag = chars.next().ok_or_else(invalid)?;
    if tag == 'L' {
        let end = rest.find(';').ok_or_else(invalid)?;
        let element = rest[1..end].replace('/', ".");
        if !is_valid_class_name(&element) || PrimitiveType::from_keyword(&element).is_some() {
            return Err(invalid());
        }
        return Ok((ClassDescriptor::intern(&element, dimensions), &rest[end + 1..]));
    }

    let primitive = PrimitiveType::from_descriptor_char(tag).ok_or_else(invalid)?;
    if primitive == PrimitiveType::Void && dimensions > 0 {
        return Err(ValidationError::VoidType(format!("array '{input}'")));
    }
    Ok((
        ClassDescriptor::intern(primitive.keyword(), dimensions),
        &rest[tag.len_utf8()..],
    ))
}

fn is_descriptor_form(name: &str) -> bool {
    name.starts_with('[') || (name.starts_with('L') && name.ends_with(';'))
}

/// Element name and array depth of a dotted or slashed name (`a/b/C[]`).
fn dotted_parts(name: &str) -> Result<(String, u8)> {
    let mut element = name;
    let mut dimensions = 0u8;
    while let Some(stripped) = element.strip_suffix("[]") {
        element = stripped;
        dimensions = dimensions
            .checked_add(1)
            .ok_or_else(|| ValidationError::InvalidDescriptor(name.to_string()))?;
    }

    let element = element.replace('/', ".");
    if !is_valid_class_name(&element) {
        return Err(ValidationError::InvalidDescriptor(name.to_string()));
    }
    if dimensions > 0 && element == "void" {
        return Err(ValidationError::VoidType(format!("array '{name}'")));
    }
    Ok((element, dimensions))
}

/// Element name and array depth of a complete binary-format descriptor.
fn descriptor_parts(descriptor: &str) -> Option<(String, u8)> {
    let dimensions = descriptor.bytes().take_while(|b| *b == b'[').count();
    let dimensions = u8::try_from(dimensions).ok()?;
    let rest = &descriptor[dimensions as usize..];

    if let Some(inner) = rest.strip_prefix('L').and_then(|r| r.strip_suffix(';')) {
        let element = inner.replace('/', ".");
        let valid = is_valid_class_name(&element) && PrimitiveType::from_keyword(&element).is_none();
        return valid.then_some((element, dimensions));
    }

    let mut chars = rest.chars();
    let primitive = PrimitiveType::from_descriptor_char(chars.next()?)?;
    if chars.next().is_some() || (primitive == PrimitiveType::Void && dimensions > 0) {
        return None;
    }
    Some((primitive.keyword().to_string(), dimensions))
}

fn canonical_key(element: &str, dimensions: u8) -> String {
    let mut canonical = String::with_capacity(element.len() + 2 * dimensions as usize);
    canonical.push_str(element);
    for _ in 0..dimensions {
        canonical.push_str("[]");
    }
    canonical
}

fn is_valid_class_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && !segment
                    .chars()
                    .any(|c| matches!(c, ';' | '[' | ']' | '/' | '<' | '>') || c.is_whitespace())
        })
}

fn is_valid_member_name(name: &str) -> bool {
    if name == "<init>" || name == "<clinit>" {
        return true;
    }
    !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, '.' | ';' | '[' | '/' | '<' | '>') || c.is_whitespace())
}

/// Identity of a field: name, type and staticness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    name: String,
    field_type: ClassDescriptor,
    is_static: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: ClassDescriptor, is_static: bool) -> Result<Self> {
        let name = name.into();
        if !is_valid_member_name(&name) || name.starts_with('<') {
            return Err(ValidationError::InvalidDescriptor(name));
        }
        if field_type.is_void() {
            return Err(ValidationError::VoidType(format!("field '{name}'")));
        }
        Ok(Self {
            name,
            field_type,
            is_static,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &ClassDescriptor {
        &self.field_type
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Binary-format descriptor of the field's type.
    pub fn descriptor(&self) -> String {
        self.field_type.descriptor()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            f.write_str("static ")?;
        }
        write!(f, "{} {}", self.field_type, self.name)
    }
}

/// Identity of a method: name, ordered arguments, return type and staticness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    name: String,
    arguments: Vec<ClassDescriptor>,
    return_type: ClassDescriptor,
    is_static: bool,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        arguments: Vec<ClassDescriptor>,
        return_type: ClassDescriptor,
        is_static: bool,
    ) -> Result<Self> {
        let name = name.into();
        if !is_valid_member_name(&name) {
            return Err(ValidationError::InvalidDescriptor(name));
        }
        if arguments.iter().any(ClassDescriptor::is_void) {
            return Err(ValidationError::VoidType(format!("argument of method '{name}'")));
        }
        Ok(Self {
            name,
            arguments,
            return_type,
            is_static,
        })
    }

    /// Builds a method descriptor from a binary-format signature such as `(ILjava/lang/String;)V`.
    pub fn parse(name: impl Into<String>, descriptor: &str, is_static: bool) -> Result<Self> {
        let invalid = || ValidationError::InvalidDescriptor(descriptor.to_string());

        let mut rest = descriptor.strip_prefix('(').ok_or_else(invalid)?;
        let mut arguments = Vec::new();
        while !rest.starts_with(')') {
            if rest.is_empty() {
                return Err(invalid());
            }
            let (argument, remainder) = parse_field_type(rest)?;
            arguments.push(argument);
            rest = remainder;
        }
        let return_type = ClassDescriptor::from_descriptor(&rest[1..])?;

        Self::new(name, arguments, return_type, is_static)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[ClassDescriptor] {
        &self.arguments
    }

    pub fn return_type(&self) -> &ClassDescriptor {
        &self.return_type
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Binary-format method descriptor.
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for argument in &self.arguments {
            out.push_str(&argument.descriptor());
        }
        out.push(')');
        out.push_str(&self.return_type.descriptor());
        out
    }

    /// Local variable slots taken by the declared arguments (excluding `this`).
    pub fn argument_slots(&self) -> u16 {
        self.arguments.iter().map(ClassDescriptor::slot_size).sum()
    }

    /// Returns true when `other` has the same name and argument list.
    pub fn same_signature(&self, other: &MethodDescriptor) -> bool {
        self.name == other.name && self.arguments == other.arguments
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            f.write_str("static ")?;
        }
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{argument}")?;
        }
        f.write_str(")")
    }
}
