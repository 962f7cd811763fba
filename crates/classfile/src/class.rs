//! Class-file structure: parse, edit, write.

use graft_core::ClassDescriptor;

use crate::access::AccessFlags;
use crate::code::CodeBody;
use crate::constant::ConstantPool;
use crate::error::{ClassFileError, Result};
use crate::reader::{self, Input, PResult, bytes, u2, u4};
use crate::writer::ByteWriter;

const MAGIC: u32 = 0xCAFE_BABE;

/// An attribute kept as its raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub access: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl Member {
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// Position of the attribute called `name`.
    pub fn attribute_position(&self, pool: &ConstantPool, name: &str) -> Option<usize> {
        attribute_position(&self.attributes, pool, name)
    }
}

/// A parsed class file.
///
/// Method bodies stay encoded until [`ClassFile::code`] decodes one; only
/// bodies passed back through [`ClassFile::set_code`] are re-encoded, so an
/// unedited class writes back byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

fn attribute_position(attributes: &[Attribute], pool: &ConstantPool, name: &str) -> Option<usize> {
    attributes.iter().position(|a| pool.utf8_eq(a.name_index, name))
}

fn parse_attribute(input: Input<'_>) -> PResult<'_, Attribute> {
    let (input, name_index) = u2(input)?;
    let (input, len) = u4(input)?;
    let (input, info) = bytes(input, len as usize)?;
    Ok((
        input,
        Attribute {
            name_index,
            info: info.to_vec(),
        },
    ))
}

fn parse_attributes(input: Input<'_>) -> PResult<'_, Vec<Attribute>> {
    let (input, count) = u2(input)?;
    reader::repeat(input, count as usize, parse_attribute)
}

fn parse_member(input: Input<'_>) -> PResult<'_, Member> {
    let (input, access) = u2(input)?;
    let (input, name_index) = u2(input)?;
    let (input, descriptor_index) = u2(input)?;
    let (input, attributes) = parse_attributes(input)?;
    Ok((
        input,
        Member {
            access: AccessFlags::from_bits(access),
            name_index,
            descriptor_index,
            attributes,
        },
    ))
}

fn parse_members(input: Input<'_>) -> PResult<'_, Vec<Member>> {
    let (input, count) = u2(input)?;
    reader::repeat(input, count as usize, parse_member)
}

fn write_attributes(attributes: &[Attribute], out: &mut ByteWriter) {
    out.emit_u16(attributes.len() as u16);
    for attribute in attributes {
        out.emit_u16(attribute.name_index);
        out.emit_blob_u32(&attribute.info);
    }
}

fn write_members(members: &[Member], out: &mut ByteWriter) {
    out.emit_u16(members.len() as u16);
    for member in members {
        out.emit_u16(member.access.bits());
        out.emit_u16(member.name_index);
        out.emit_u16(member.descriptor_index);
        write_attributes(&member.attributes, out);
    }
}

impl ClassFile {
    /// Parses a complete class file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (_, magic) = u4(data).map_err(|e| reader::to_error(data, e))?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }

        let (rest, class) = Self::parse_body(&data[4..]).map_err(|e| reader::to_error(data, e))?;
        if !rest.is_empty() {
            return Err(ClassFileError::Malformed(format!(
                "{} trailing bytes after class file",
                rest.len()
            )));
        }

        // Surface mis-tagged pool entries early.
        class.name()?;
        Ok(class)
    }

    fn parse_body(input: Input<'_>) -> PResult<'_, Self> {
        let (input, minor_version) = u2(input)?;
        let (input, major_version) = u2(input)?;
        let (input, constant_pool) = ConstantPool::parse(input)?;
        let (input, access) = u2(input)?;
        let (input, this_class) = u2(input)?;
        let (input, super_class) = u2(input)?;
        let (input, interface_count) = u2(input)?;
        let (input, interfaces) = reader::repeat(input, interface_count as usize, u2)?;
        let (input, fields) = parse_members(input)?;
        let (input, methods) = parse_members(input)?;
        let (input, attributes) = parse_attributes(input)?;

        Ok((
            input,
            Self {
                minor_version,
                major_version,
                constant_pool,
                access: AccessFlags::from_bits(access),
                this_class,
                super_class,
                interfaces,
                fields,
                methods,
                attributes,
            },
        ))
    }

    /// Encodes the class file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = ByteWriter::with_capacity(4096);
        out.emit_u32(MAGIC);
        out.emit_u16(self.minor_version);
        out.emit_u16(self.major_version);
        self.constant_pool.write(&mut out);
        out.emit_u16(self.access.bits());
        out.emit_u16(self.this_class);
        out.emit_u16(self.super_class);
        out.emit_u16(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            out.emit_u16(*interface);
        }
        write_members(&self.fields, &mut out);
        write_members(&self.methods, &mut out);
        write_attributes(&self.attributes, &mut out);
        out.into_bytes()
    }

    /// Internal name of this class, e.g. `com/example/Foo`.
    pub fn name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    pub fn descriptor(&self) -> Result<ClassDescriptor> {
        Ok(ClassDescriptor::from_internal_name(self.name()?)?)
    }

    /// Internal name of the superclass; `None` only for `java/lang/Object`.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|i| self.constant_pool.class_name(*i))
            .collect()
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    pub fn member_name(&self, member: &Member) -> Result<&str> {
        self.constant_pool.utf8(member.name_index)
    }

    pub fn member_descriptor(&self, member: &Member) -> Result<&str> {
        self.constant_pool.utf8(member.descriptor_index)
    }

    fn find_member(&self, members: &[Member], name: &str, descriptor: &str) -> Option<usize> {
        let pool = &self.constant_pool;
        members.iter().position(|m| {
            pool.utf8_eq(m.name_index, name) && pool.utf8_eq(m.descriptor_index, descriptor)
        })
    }

    /// Index of the field with this name and descriptor.
    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.find_member(&self.fields, name, descriptor)
    }

    /// Index of the method with this name and descriptor.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.find_member(&self.methods, name, descriptor)
    }

    /// Appends a member built from names, returning its index.
    pub fn add_method(&mut self, access: AccessFlags, name: &str, descriptor: &str) -> Result<usize> {
        let name_index = self.constant_pool.add_utf8(name)?;
        let descriptor_index = self.constant_pool.add_utf8(descriptor)?;
        self.methods.push(Member {
            access,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        Ok(self.methods.len() - 1)
    }

    /// Decodes the body of the method at `index`; `None` for abstract and native methods.
    pub fn code(&self, index: usize) -> Result<Option<CodeBody>> {
        let method = self.method_at(index)?;
        match method.attribute_position(&self.constant_pool, "Code") {
            Some(position) => {
                CodeBody::decode(&method.attributes[position].info, &self.constant_pool).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Encodes `body` as the `Code` attribute of the method at `index`, adding one if absent.
    pub fn set_code(&mut self, index: usize, body: &CodeBody) -> Result<()> {
        let position = self.method_at(index)?.attribute_position(&self.constant_pool, "Code");
        let info = body.encode(&mut self.constant_pool)?;

        match position {
            Some(position) => self.methods[index].attributes[position].info = info,
            None => {
                let name_index = self.constant_pool.add_utf8("Code")?;
                self.methods[index]
                    .attributes
                    .insert(0, Attribute { name_index, info });
            }
        }
        Ok(())
    }

    fn method_at(&self, index: usize) -> Result<&Member> {
        self.methods
            .get(index)
            .ok_or_else(|| ClassFileError::Malformed(format!("no method at index {index}")))
    }

    /// Position of the class attribute called `name`.
    pub fn attribute_position(&self, name: &str) -> Option<usize> {
        attribute_position(&self.attributes, &self.constant_pool, name)
    }
}
