//! Big-endian byte emission.

/// Growable buffer for encoding class-file structures.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current length of the encoded data.
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn emit_i16(&mut self, value: i16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emits a `u4` length prefix followed by `bytes`.
    pub fn emit_blob_u32(&mut self, bytes: &[u8]) {
        self.emit_u32(bytes.len() as u32);
        self.emit_bytes(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_emission() {
        let mut writer = ByteWriter::new();
        writer.emit_u16(0xCAFE);
        writer.emit_u32(0xBABE_0001);
        writer.emit_i16(-2);
        assert_eq!(
            writer.into_bytes(),
            vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x01, 0xFF, 0xFE]
        );
    }
}
