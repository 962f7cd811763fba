//! CLI command implementations.

pub mod discover;
pub mod init;
pub mod inspect;
pub mod transform;
