//! Graft Classfile - JVM class-file model built on nom.
//!
//! A [`ClassFile`] keeps everything it does not understand as raw bytes and
//! decodes method bodies only on request, so classes pass through unedited
//! parts unchanged.

mod access;
mod annotation;
mod class;
mod code;
mod constant;
mod error;
mod frames;
mod mutf8;
pub mod opcode;
mod reader;
mod writer;

pub use access::AccessFlags;
pub use annotation::{TRANSFORMED_MARKER, is_marked};
pub use class::{Attribute, ClassFile, Member};
pub use code::{CodeBody, Insn, Label, LineNumber, LocalVariable, TryCatchBlock};
pub use constant::{Constant, ConstantPool, MemberRef, Utf8Constant};
pub use error::{ClassFileError, Result};
pub use frames::{Frame, FrameKind, VerificationType};
pub use writer::ByteWriter;
