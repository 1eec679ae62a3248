/*++

Licensed under the Apache-2.0 license.

File Name:

    cursor.rs

Abstract:

    Bounds-checked reader over an untrusted byte buffer.

--*/

use vboot_error::{VbootError, VbootResult};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Forward-only reader. Every access is checked against the end of the
/// buffer; running past it yields `PARSE_TRUNCATED`.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Cursor positioned at `pos`.
    pub fn at(buf: &'a [u8], pos: usize) -> VbootResult<Self> {
        if pos > buf.len() {
            return Err(VbootError::PARSE_TRUNCATED);
        }
        Ok(Self { buf, pos })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn bytes(&mut self, len: usize) -> VbootResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(VbootError::PARSE_TRUNCATED)?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> VbootResult<()> {
        self.bytes(len).map(|_| ())
    }

    pub fn u32_be(&mut self) -> VbootResult<u32> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a fixed layout structure.
    pub fn read<T: FromBytes + KnownLayout + Immutable>(&mut self) -> VbootResult<T> {
        let (value, _) =
            T::read_from_prefix(&self.buf[self.pos..]).map_err(|_| VbootError::PARSE_TRUNCATED)?;
        self.pos += core::mem::size_of::<T>();
        Ok(value)
    }

    /// NUL terminated string. The terminator is consumed.
    pub fn cstr(&mut self) -> VbootResult<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(VbootError::PARSE_TRUNCATED)?;
        self.pos += len + 1;
        Ok(&rest[..len])
    }

    /// Advance to the next 4-byte boundary.
    pub fn align4(&mut self) -> VbootResult<()> {
        let pad = align4(self.pos).ok_or(VbootError::PARSE_TRUNCATED)? - self.pos;
        self.skip(pad)
    }
}

/// Round up to a multiple of 4, `None` on overflow.
pub fn align4(val: usize) -> Option<usize> {
    val.checked_add(3).map(|v| v & !3)
}
