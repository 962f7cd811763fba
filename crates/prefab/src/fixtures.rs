//! Class builders for unit tests.

use graft_classfile::{AccessFlags, ClassFile, CodeBody, ConstantPool, Member};
use graft_core::ClassDescriptor;

pub(crate) fn class(name: &str) -> ClassDescriptor {
    ClassDescriptor::of(name).unwrap()
}

pub(crate) struct ClassBuilder {
    file: ClassFile,
}

impl ClassBuilder {
    pub(crate) fn new(internal_name: &str) -> Self {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(internal_name).unwrap();
        let super_class = pool.add_class("java/lang/Object").unwrap();
        Self {
            file: ClassFile {
                minor_version: 0,
                major_version: 52,
                constant_pool: pool,
                access: AccessFlags::PUBLIC | AccessFlags::SUPER,
                this_class,
                super_class,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            },
        }
    }

    pub(crate) fn interface(mut self) -> Self {
        self.file.access = AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT;
        self
    }

    pub(crate) fn field(mut self, access: AccessFlags, name: &str, descriptor: &str) -> Self {
        let name_index = self.file.constant_pool.add_utf8(name).unwrap();
        let descriptor_index = self.file.constant_pool.add_utf8(descriptor).unwrap();
        self.file.fields.push(Member {
            access,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        self
    }

    pub(crate) fn method(
        mut self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        body: Option<CodeBody>,
    ) -> Self {
        let index = self.file.add_method(access, name, descriptor).unwrap();
        if let Some(body) = body {
            self.file.set_code(index, &body).unwrap();
        }
        self
    }

    pub(crate) fn build(self) -> ClassFile {
        ClassFile::parse(&self.file.to_bytes()).unwrap()
    }
}

/// Raw code array of method `index`.
pub(crate) fn code_bytes(file: &ClassFile, index: usize) -> Vec<u8> {
    let method = &file.methods[index];
    let position = method.attribute_position(&file.constant_pool, "Code").unwrap();
    let info = &method.attributes[position].info;
    let length = u32::from_be_bytes([info[4], info[5], info[6], info[7]]) as usize;
    info[8..8 + length].to_vec()
}
