//! Class-file error types.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for class-file parsing, editing and encoding.
#[derive(Debug, Error, Diagnostic)]
pub enum ClassFileError {
    #[error("Not a class file: bad magic {0:#010x}")]
    #[diagnostic(code(graft::classfile::magic))]
    BadMagic(u32),

    #[error("Truncated class data at offset {0}")]
    #[diagnostic(code(graft::classfile::truncated))]
    Truncated(usize),

    #[error("Malformed class data: {0}")]
    #[diagnostic(code(graft::classfile::malformed))]
    Malformed(String),

    #[error("Constant pool index {index} is not a valid {expected} entry")]
    #[diagnostic(code(graft::classfile::constant))]
    BadConstant { index: u16, expected: &'static str },

    #[error("Unknown opcode {opcode:#04x} at offset {offset}")]
    #[diagnostic(code(graft::classfile::opcode))]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("Branch offset {0} does not fit in a conditional jump")]
    #[diagnostic(code(graft::classfile::branch))]
    BranchOverflow(i64),

    #[error("Label {0} is never placed in the instruction list")]
    #[diagnostic(code(graft::classfile::label))]
    UnplacedLabel(u32),

    #[error("Constant pool is full")]
    #[diagnostic(code(graft::classfile::pool_overflow))]
    PoolOverflow,

    #[error("Method code is too large ({0} bytes)")]
    #[diagnostic(code(graft::classfile::code_too_large))]
    CodeTooLarge(usize),

    #[error("Invalid descriptor: {0}")]
    #[diagnostic(code(graft::classfile::descriptor))]
    Descriptor(#[from] graft_core::ValidationError),
}

/// Result type for class-file operations.
pub type Result<T> = std::result::Result<T, ClassFileError>;
