//! Class-level annotations in `RuntimeVisibleAnnotations` and `RuntimeInvisibleAnnotations`.

use crate::class::{Attribute, ClassFile};
use crate::error::Result;
use crate::reader::{self, Input, PResult, u1, u2};
use crate::writer::ByteWriter;

/// Annotation stamped on every class the engine rewrote.
pub const TRANSFORMED_MARKER: &str = "Lgraft/runtime/Transformed;";

const INVISIBLE: &str = "RuntimeInvisibleAnnotations";
const VISIBLE: &str = "RuntimeVisibleAnnotations";

fn skip_element_value(input: Input<'_>) -> PResult<'_, ()> {
    let (input, tag) = u1(input)?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            let (input, _) = u2(input)?;
            Ok((input, ()))
        }
        b'e' => {
            let (input, _) = u2(input)?;
            let (input, _) = u2(input)?;
            Ok((input, ()))
        }
        b'@' => {
            let (input, _) = annotation(input)?;
            Ok((input, ()))
        }
        b'[' => {
            let (input, count) = u2(input)?;
            let (input, _) = reader::repeat(input, count as usize, skip_element_value)?;
            Ok((input, ()))
        }
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Parses one annotation, returning its type index.
fn annotation(input: Input<'_>) -> PResult<'_, u16> {
    let (input, type_index) = u2(input)?;
    let (input, pairs) = u2(input)?;
    let (input, _) = reader::repeat(input, pairs as usize, |i| {
        let (i, _name) = u2(i)?;
        skip_element_value(i)
    })?;
    Ok((input, type_index))
}

/// Whether `bytes` is a class carrying [`TRANSFORMED_MARKER`].
pub fn is_marked(bytes: &[u8]) -> Result<bool> {
    ClassFile::parse(bytes)?.has_annotation(TRANSFORMED_MARKER)
}

fn annotation_types(input: Input<'_>) -> PResult<'_, Vec<u16>> {
    let (input, count) = u2(input)?;
    reader::repeat(input, count as usize, annotation)
}

impl ClassFile {
    /// Descriptors of the class annotations, visible ones first.
    pub fn annotations(&self) -> Result<Vec<&str>> {
        let mut out = Vec::new();
        for name in [VISIBLE, INVISIBLE] {
            let Some(position) = self.attribute_position(name) else {
                continue;
            };
            let info = &self.attributes[position].info;
            let (_, types) = annotation_types(info).map_err(|e| reader::to_error(info, e))?;
            for index in types {
                out.push(self.constant_pool.utf8(index)?);
            }
        }
        Ok(out)
    }

    pub fn has_annotation(&self, descriptor: &str) -> Result<bool> {
        Ok(self.annotations()?.contains(&descriptor))
    }

    /// Adds a class-retention annotation without elements.
    ///
    /// Returns `false` when an annotation of that type is already present.
    pub fn add_invisible_annotation(&mut self, descriptor: &str) -> Result<bool> {
        if self.has_annotation(descriptor)? {
            return Ok(false);
        }

        let type_index = self.constant_pool.add_utf8(descriptor)?;
        match self.attribute_position(INVISIBLE) {
            Some(position) => {
                let info = &mut self.attributes[position].info;
                let count = u16::from_be_bytes([info[0], info[1]]) + 1;
                info[..2].copy_from_slice(&count.to_be_bytes());
                info.extend_from_slice(&type_index.to_be_bytes());
                info.extend_from_slice(&0u16.to_be_bytes());
            }
            None => {
                let name_index = self.constant_pool.add_utf8(INVISIBLE)?;
                let mut info = ByteWriter::with_capacity(6);
                info.emit_u16(1);
                info.emit_u16(type_index);
                info.emit_u16(0);
                self.attributes.push(Attribute {
                    name_index,
                    info: info.into_bytes(),
                });
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::access::AccessFlags;
    use crate::constant::ConstantPool;

    use super::*;

    fn class() -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class("com/example/Marked").unwrap();
        let super_class = pool.add_class("java/lang/Object").unwrap();
        ClassFile {
            minor_version: 0,
            major_version: 61,
            constant_pool: pool,
            access: AccessFlags::PUBLIC,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn test_add_annotation_once() {
        let mut class = class();
        assert!(class.add_invisible_annotation("Lgraft/Marker;").unwrap());
        assert!(!class.add_invisible_annotation("Lgraft/Marker;").unwrap());

        let reparsed = ClassFile::parse(&class.to_bytes()).unwrap();
        assert_eq!(reparsed.annotations().unwrap(), vec!["Lgraft/Marker;"]);
    }

    #[test]
    fn test_append_to_existing_attribute() {
        let mut class = class();
        let name_index = class.constant_pool.add_utf8(INVISIBLE).unwrap();
        let existing = class.constant_pool.add_utf8("Lcom/example/Existing;").unwrap();
        let value_name = class.constant_pool.add_utf8("value").unwrap();
        let value = class.constant_pool.add_integer(4).unwrap();

        let mut info = ByteWriter::new();
        info.emit_u16(1);
        info.emit_u16(existing);
        info.emit_u16(1);
        info.emit_u16(value_name);
        info.emit_u8(b'I');
        info.emit_u16(value);
        class.attributes.push(Attribute {
            name_index,
            info: info.into_bytes(),
        });

        assert!(class.add_invisible_annotation("Lgraft/Marker;").unwrap());
        assert_eq!(class.attributes.len(), 1);
        assert_eq!(
            class.annotations().unwrap(),
            vec!["Lcom/example/Existing;", "Lgraft/Marker;"]
        );
    }

    #[test]
    fn test_is_marked() {
        let mut class = class();
        assert!(!is_marked(&class.to_bytes()).unwrap());
        class.add_invisible_annotation(TRANSFORMED_MARKER).unwrap();
        assert!(is_marked(&class.to_bytes()).unwrap());
    }
}
