//! Positionable reader over an immutable byte buffer.
//!
//! All offsets are absolute positions from the start of the buffer. Reads
//! past the end fail with [`Error::OutOfBounds`] and leave the position
//! untouched.

use byteorder::ByteOrder;

use crate::error::{Error, Result};

/// Read cursor over a borrowed buffer.
///
/// Cursors are cheap to create and carry their own position, so several can
/// walk the same buffer independently.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Cursor positioned at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        let mut cursor = Self::new(data);
        cursor.seek(offset)?;
        Ok(cursor)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Move to an absolute offset. Positioning exactly at the end is allowed.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::OutOfBounds {
                offset,
                requested: 0,
                len: self.data.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Move by `count` bytes forward.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Move back by `count` bytes.
    pub fn rewind(&mut self, count: usize) -> Result<()> {
        let offset = self.offset.checked_sub(count).ok_or(Error::OutOfBounds {
            offset: self.offset,
            requested: count,
            len: self.data.len(),
        })?;
        self.seek(offset)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Unread tail of the buffer, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::OutOfBounds {
                offset: self.offset,
                requested: count,
                len: self.data.len(),
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16<E: ByteOrder>(&mut self) -> Result<u16> {
        Ok(E::read_u16(self.take(2)?))
    }

    pub fn read_u32<E: ByteOrder>(&mut self) -> Result<u32> {
        Ok(E::read_u32(self.take(4)?))
    }

    pub fn read_u64<E: ByteOrder>(&mut self) -> Result<u64> {
        Ok(E::read_u64(self.take(8)?))
    }

    /// Read an unsigned integer stored in `width` bytes (1 to 8).
    pub fn read_uint<E: ByteOrder>(&mut self, width: usize) -> Result<u64> {
        Ok(E::read_uint(self.take(width)?, width))
    }
}
