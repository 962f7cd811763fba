//! The constant pool.

use crate::error::{ClassFileError, Result};
use crate::mutf8;
use crate::reader::{Input, PResult, bytes, i4, u1, u2, u4};
use crate::writer::ByteWriter;

/// A `CONSTANT_Utf8` entry: its decoded text plus the exact bytes written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf8Constant {
    text: String,
    raw: Vec<u8>,
}

impl Utf8Constant {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            raw: mutf8::encode(text),
        }
    }

    pub(crate) fn from_raw(raw: &[u8]) -> Result<Self> {
        Ok(Self {
            text: mutf8::decode(raw)?,
            raw: raw.to_vec(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// One constant pool entry, tagged as in JVMS §4.4.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(Utf8Constant),
    Integer(i32),
    /// Raw IEEE-754 bits, so NaN payloads survive a round trip.
    Float(u32),
    Long(i64),
    Double(u64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// Slot 0 and the second slot of a long or double.
    Unusable,
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A symbolic field or method reference resolved from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// The `constant_pool_count` value: number of slots including slot 0.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => None,
            Some(constant) => Some(constant),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| (i as u16, c))
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(Constant::Utf8(value)) => Ok(value.as_str()),
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal name of a `CONSTANT_Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(Constant::Class { name_index }) => self.utf8(*name_index),
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "Class",
            }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index) {
            Some(Constant::NameAndType {
                name_index,
                descriptor_index,
            }) => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolves a field, method or interface method reference.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        match self.get(index) {
            Some(
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                },
            ) => {
                let owner = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(MemberRef {
                    owner,
                    name,
                    descriptor,
                })
            }
            _ => Err(ClassFileError::BadConstant {
                index,
                expected: "member reference",
            }),
        }
    }

    /// Adds `constant`, reusing an identical existing entry.
    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        if let Some(index) = self.entries.iter().position(|c| *c == constant) {
            return Ok(index as u16);
        }

        let wide = constant.is_wide();
        let needed = if wide { 2 } else { 1 };
        if self.entries.len() + needed > u16::MAX as usize {
            return Err(ClassFileError::PoolOverflow);
        }

        let index = self.entries.len() as u16;
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.add(Constant::Utf8(Utf8Constant::new(value)))
    }

    pub fn add_class(&mut self, internal_name: &str) -> Result<u16> {
        let name_index = self.add_utf8(internal_name)?;
        self.add(Constant::Class { name_index })
    }

    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let string_index = self.add_utf8(value)?;
        self.add(Constant::String { string_index })
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16> {
        self.add(Constant::Integer(value))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        if interface {
            self.add(Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            })
        } else {
            self.add(Constant::MethodRef {
                class_index,
                name_and_type_index,
            })
        }
    }

    /// Whether the entry at `index` is a `Utf8` constant equal to `value`.
    pub fn utf8_eq(&self, index: u16, value: &str) -> bool {
        self.utf8(index).is_ok_and(|v| v == value)
    }

    pub(crate) fn parse(input: Input<'_>) -> PResult<'_, Self> {
        let (mut input, count) = u2(input)?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        while entries.len() < count as usize {
            let (rest, constant) = parse_constant(input)?;
            input = rest;
            let wide = constant.is_wide();
            entries.push(constant);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        Ok((input, Self { entries }))
    }

    pub(crate) fn write(&self, out: &mut ByteWriter) {
        out.emit_u16(self.entries.len() as u16);
        for constant in &self.entries {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(value) => {
                    out.emit_u8(1);
                    out.emit_u16(value.raw().len() as u16);
                    out.emit_bytes(value.raw());
                }
                Constant::Integer(v) => {
                    out.emit_u8(3);
                    out.emit_i32(*v);
                }
                Constant::Float(bits) => {
                    out.emit_u8(4);
                    out.emit_u32(*bits);
                }
                Constant::Long(v) => {
                    out.emit_u8(5);
                    out.emit_bytes(&v.to_be_bytes());
                }
                Constant::Double(bits) => {
                    out.emit_u8(6);
                    out.emit_bytes(&bits.to_be_bytes());
                }
                Constant::Class { name_index } => {
                    out.emit_u8(7);
                    out.emit_u16(*name_index);
                }
                Constant::String { string_index } => {
                    out.emit_u8(8);
                    out.emit_u16(*string_index);
                }
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                } => {
                    out.emit_u8(9);
                    out.emit_u16(*class_index);
                    out.emit_u16(*name_and_type_index);
                }
                Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    out.emit_u8(10);
                    out.emit_u16(*class_index);
                    out.emit_u16(*name_and_type_index);
                }
                Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    out.emit_u8(11);
                    out.emit_u16(*class_index);
                    out.emit_u16(*name_and_type_index);
                }
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    out.emit_u8(12);
                    out.emit_u16(*name_index);
                    out.emit_u16(*descriptor_index);
                }
                Constant::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    out.emit_u8(15);
                    out.emit_u8(*reference_kind);
                    out.emit_u16(*reference_index);
                }
                Constant::MethodType { descriptor_index } => {
                    out.emit_u8(16);
                    out.emit_u16(*descriptor_index);
                }
                Constant::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.emit_u8(17);
                    out.emit_u16(*bootstrap_method_attr_index);
                    out.emit_u16(*name_and_type_index);
                }
                Constant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.emit_u8(18);
                    out.emit_u16(*bootstrap_method_attr_index);
                    out.emit_u16(*name_and_type_index);
                }
                Constant::Module { name_index } => {
                    out.emit_u8(19);
                    out.emit_u16(*name_index);
                }
                Constant::Package { name_index } => {
                    out.emit_u8(20);
                    out.emit_u16(*name_index);
                }
            }
        }
    }
}

fn parse_constant(input: Input<'_>) -> PResult<'_, Constant> {
    let (input, tag) = u1(input)?;

    match tag {
        1 => {
            let (input, len) = u2(input)?;
            let (input, raw) = bytes(input, len as usize)?;
            let value = Utf8Constant::from_raw(raw).map_err(|_| {
                nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
            })?;
            Ok((input, Constant::Utf8(value)))
        }
        3 => {
            let (input, v) = i4(input)?;
            Ok((input, Constant::Integer(v)))
        }
        4 => {
            let (input, v) = u4(input)?;
            Ok((input, Constant::Float(v)))
        }
        5 => {
            let (input, hi) = u4(input)?;
            let (input, lo) = u4(input)?;
            Ok((input, Constant::Long((((hi as u64) << 32) | lo as u64) as i64)))
        }
        6 => {
            let (input, hi) = u4(input)?;
            let (input, lo) = u4(input)?;
            Ok((input, Constant::Double(((hi as u64) << 32) | lo as u64)))
        }
        7 => {
            let (input, name_index) = u2(input)?;
            Ok((input, Constant::Class { name_index }))
        }
        8 => {
            let (input, string_index) = u2(input)?;
            Ok((input, Constant::String { string_index }))
        }
        9 | 10 | 11 | 12 | 17 | 18 => {
            let (input, a) = u2(input)?;
            let (input, b) = u2(input)?;
            let constant = match tag {
                9 => Constant::FieldRef {
                    class_index: a,
                    name_and_type_index: b,
                },
                10 => Constant::MethodRef {
                    class_index: a,
                    name_and_type_index: b,
                },
                11 => Constant::InterfaceMethodRef {
                    class_index: a,
                    name_and_type_index: b,
                },
                12 => Constant::NameAndType {
                    name_index: a,
                    descriptor_index: b,
                },
                17 => Constant::Dynamic {
                    bootstrap_method_attr_index: a,
                    name_and_type_index: b,
                },
                _ => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: a,
                    name_and_type_index: b,
                },
            };
            Ok((input, constant))
        }
        15 => {
            let (input, reference_kind) = u1(input)?;
            let (input, reference_index) = u2(input)?;
            Ok((
                input,
                Constant::MethodHandle {
                    reference_kind,
                    reference_index,
                },
            ))
        }
        16 => {
            let (input, descriptor_index) = u2(input)?;
            Ok((input, Constant::MethodType { descriptor_index }))
        }
        19 => {
            let (input, name_index) = u2(input)?;
            Ok((input, Constant::Module { name_index }))
        }
        20 => {
            let (input, name_index) = u2(input)?;
            Ok((input, Constant::Package { name_index }))
        }
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.add_field_ref("com/example/Foo", "bar", "I").unwrap();
        let b = pool.add_field_ref("com/example/Foo", "bar", "I").unwrap();
        assert_eq!(a, b);

        let member = pool.member_ref(a).unwrap();
        assert_eq!(member.owner, "com/example/Foo");
        assert_eq!(member.name, "bar");
        assert_eq!(member.descriptor, "I");
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.add(Constant::Long(42)).unwrap();
        let next = pool.add_utf8("after").unwrap();
        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert!(pool.get(2).is_none());
        assert_eq!(pool.count(), 4);
    }

    #[test]
    fn test_parse_and_write_round_trip() {
        let mut pool = ConstantPool::new();
        pool.add_string("hello\0world").unwrap();
        pool.add(Constant::Double(1.5f64.to_bits())).unwrap();
        pool.add_method_ref("a/B", "c", "()V", true).unwrap();

        let mut out = ByteWriter::new();
        pool.write(&mut out);
        let bytes = out.into_bytes();

        let (rest, parsed) = ConstantPool::parse(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, pool);
    }

    #[test]
    fn test_utf8_keeps_original_bytes() {
        // Lone high surrogate, then an overlong `a`.
        let raw = [0xED, 0xA0, 0x80, 0xC1, 0xA1];
        let mut input = vec![0x00, 0x02, 0x01, 0x00, raw.len() as u8];
        input.extend_from_slice(&raw);

        let (_, pool) = ConstantPool::parse(&input).unwrap();
        assert_eq!(pool.utf8(1).unwrap(), "\u{FFFD}a");

        let mut out = ByteWriter::new();
        pool.write(&mut out);
        assert_eq!(out.into_bytes(), input);
    }

    #[test]
    fn test_wrong_kind_is_reported() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.add_utf8("x").unwrap();
        assert!(matches!(
            pool.class_name(utf8),
            Err(ClassFileError::BadConstant { expected: "Class", .. })
        ));
    }
}
