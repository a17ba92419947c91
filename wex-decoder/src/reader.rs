// WEX - wex-decoder
// Module: WEX Byte Reader
//
// Copyright (c) 2025 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! A bounds-checked cursor over a byte slice.

use wex_error::{codes, Error, Result};
use wex_format::binary;

const ERR_UNEXPECTED_END: Error = Error::parse(codes::UNEXPECTED_END, "unexpected end");

/// A cursor over a byte slice with LEB128 and IEEE-754 readers.
///
/// Every read advances the position; running past the end fails with
/// "unexpected end".
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader over `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// The current byte position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self.bytes.get(self.pos).ok_or(ERR_UNEXPECTED_END)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.bytes.get(self.pos).copied().ok_or(ERR_UNEXPECTED_END)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(ERR_UNEXPECTED_END)?;
        let slice = self.bytes.get(self.pos..end).ok_or(ERR_UNEXPECTED_END)?;
        self.pos = end;
        Ok(slice)
    }

    /// Reads a LEB128 `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let (value, len) = binary::read_leb128_u32(self.bytes, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    /// Reads a signed LEB128 `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        let (value, len) = binary::read_leb128_i32(self.bytes, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    /// Reads a signed LEB128 `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        let (value, len) = binary::read_leb128_i64(self.bytes, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    /// Reads a signed 33-bit LEB128 integer (block type encoding).
    pub fn read_s33(&mut self) -> Result<i64> {
        let (value, len) = binary::read_leb128_s33(self.bytes, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    /// Reads a little-endian `f32`.
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian `f64`.
    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.read_bytes(8)?;
        Ok(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Reads a length-prefixed UTF-8 name.
    pub fn read_name(&mut self) -> Result<String> {
        let (name, len) = binary::read_name(self.bytes, self.pos)?;
        self.pos += len;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_position() {
        let mut reader = Reader::new(&[0x01, 0x85, 0x02, 0xAA]);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u32().unwrap(), 261);
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn read_past_end_fails() {
        let mut reader = Reader::new(&[0x01]);
        reader.read_u8().unwrap();
        let err = reader.read_u8().unwrap_err();
        assert_eq!(err.message, "unexpected end");
    }
}
