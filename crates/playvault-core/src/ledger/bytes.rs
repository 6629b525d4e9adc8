//! Byte buffer utilities for the fixed-format binary files.
//!
//! `ByteBuffer` is a position-tracking reader for the sequential streams
//! the stable client writes. The streams have no random access, so every
//! read failure reports the position at which the stream desynchronized.

use crate::error::{Error, Result};

/// String discriminator: no string follows.
const STR_EMPTY: u8 = 0x00;
/// String discriminator: ULEB128 length plus UTF-8 bytes follow.
const STR_PRESENT: u8 = 0x0B;

/// A position-tracking byte reader for little-endian binary streams.
pub struct ByteBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes remaining from the current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Skips the specified number of bytes.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Reads the specified number of bytes and advances the position.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .ok_or_else(|| self.desync("position overflow"))?;

        if end > self.data.len() {
            return Err(self.desync(&format!(
                "read of {} bytes exceeds buffer length {}",
                count,
                self.data.len()
            )));
        }

        let result = &self.data[self.pos..end];
        self.pos = end;
        Ok(result)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_bytes(8)?;
        Ok(i64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.read_bytes(8)?;
        Ok(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Reads a ULEB128-encoded unsigned integer.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(self.desync("ULEB128 value exceeds 64 bits"));
            }
        }
    }

    /// Reads a length-discriminated string.
    ///
    /// One leading byte: `0x00` means empty, `0x0B` means a ULEB128 byte
    /// count followed by UTF-8 data. Any other discriminator is treated as
    /// an empty string without consuming further bytes; the stable client
    /// has been observed writing stray discriminators and recovering here
    /// keeps the stream aligned.
    pub fn read_string(&mut self) -> Result<String> {
        match self.read_u8()? {
            STR_EMPTY => Ok(String::new()),
            STR_PRESENT => {
                let len = self.read_uleb128()? as usize;
                let bytes = self.read_bytes(len)?;
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            _ => Ok(String::new()),
        }
    }

    fn desync(&self, message: &str) -> Error {
        Error::StructuralDecode {
            position: self.pos,
            message: message.to_string(),
        }
    }
}

/// Writer counterpart used by fixtures and tests.
#[derive(Debug, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_uleb128(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.data.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    pub fn write_string(&mut self, value: &str) {
        if value.is_empty() {
            self.write_u8(STR_EMPTY);
        } else {
            self.write_u8(STR_PRESENT);
            self.write_uleb128(value.len() as u64);
            self.data.extend_from_slice(value.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x78, 0x56, 0x34, 0x12, 0x01];
        let mut buf = ByteBuffer::new(&data);
        assert_eq!(buf.read_i32().unwrap(), 0x12345678);
        assert!(buf.read_bool().unwrap());
        assert!(buf.is_exhausted());
    }

    #[test]
    fn test_read_past_end_is_structural() {
        let mut buf = ByteBuffer::new(&[0x01]);
        let err = buf.read_i32().unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::StructuralDecode { .. }
        ));
    }

    #[test]
    fn test_uleb128_roundtrip() {
        for value in [0u64, 1, 127, 128, 300, 16384, u32::MAX as u64] {
            let mut writer = ByteWriter::new();
            writer.write_uleb128(value);
            let data = writer.into_inner();
            let mut buf = ByteBuffer::new(&data);
            assert_eq!(buf.read_uleb128().unwrap(), value);
        }
    }

    #[test]
    fn test_string_roundtrip() {
        let mut writer = ByteWriter::new();
        writer.write_string("hello world");
        writer.write_string("");
        let data = writer.into_inner();
        let mut buf = ByteBuffer::new(&data);
        assert_eq!(buf.read_string().unwrap(), "hello world");
        assert_eq!(buf.read_string().unwrap(), "");
    }

    #[test]
    fn test_unknown_discriminator_reads_empty() {
        // 0x42 is neither empty nor present; only the discriminator byte
        // is consumed.
        let data = [0x42, 0x99];
        let mut buf = ByteBuffer::new(&data);
        assert_eq!(buf.read_string().unwrap(), "");
        assert_eq!(buf.position(), 1);
    }
}
