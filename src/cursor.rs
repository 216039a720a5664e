// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A position-tracking bit reader over a borrowed byte buffer

use crate::Error;
use bitstream_io::{BigEndian, BitRead, BitReader, FromBitStream, FromBitStreamWith};
use std::io::{Cursor, SeekFrom};

/// A big-endian bit cursor over an immutable byte buffer
///
/// The cursor borrows its buffer and never copies it,
/// so byte ranges it has passed over can be handed out
/// as sub-slices of the original data.
///
/// # Example
/// ```
/// use flac_extract::cursor::BitCursor;
///
/// let data: &[u8] = &[0b101_001_10, 0b1_0000000];
/// let mut c = BitCursor::new(data);
/// assert_eq!(c.read_bits(3).unwrap(), 0b101);
/// assert_eq!(c.read_unary().unwrap(), 2);
/// assert_eq!(c.read_signed(3).unwrap(), -3);
/// assert!(c.has_next());
/// ```
pub struct BitCursor<'a> {
    data: &'a [u8],
    reader: BitReader<Cursor<&'a [u8]>, BigEndian>,
}

impl<'a> BitCursor<'a> {
    /// Creates a cursor at the start of the given buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            reader: BitReader::endian(Cursor::new(data), BigEndian),
        }
    }

    /// Creates a cursor at the given byte offset of the buffer
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedStream`] if the offset
    /// lies beyond the end of the buffer.
    pub fn at(data: &'a [u8], position: usize) -> Result<Self, Error> {
        let mut cursor = Self::new(data);
        cursor.seek(position)?;
        Ok(cursor)
    }

    /// The whole underlying buffer
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Reads an unsigned value of up to 32 bits, most-significant bit first
    pub fn read_bits(&mut self, bits: u32) -> Result<u32, Error> {
        match bits {
            0 => Ok(0),
            bits => Ok(self.reader.read_var(bits)?),
        }
    }

    /// Reads a two's complement signed value of up to 64 bits
    ///
    /// A 0 bit read yields 0 without consuming anything.
    pub fn read_signed(&mut self, bits: u32) -> Result<i64, Error> {
        match bits {
            0 => Ok(0),
            bits => Ok(self.reader.read_signed_var(bits)?),
        }
    }

    /// Reads a single bit
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool, Error> {
        Ok(self.reader.read_bit()?)
    }

    /// Counts 0 bits up to and including a terminating 1 bit
    #[inline]
    pub fn read_unary(&mut self) -> Result<u32, Error> {
        Ok(self.reader.read_unary::<1>()?)
    }

    /// Parses a value from the cursor's current position
    #[inline]
    pub fn parse<F: FromBitStream>(&mut self) -> Result<F, F::Error> {
        self.reader.parse()
    }

    /// Parses a value from the cursor's current position with some context
    #[inline]
    pub fn parse_with<'c, F: FromBitStreamWith<'c>>(
        &mut self,
        context: &F::Context,
    ) -> Result<F, F::Error> {
        self.reader.parse_with(context)
    }

    /// Whether the cursor is on a byte boundary
    #[inline]
    pub fn byte_aligned(&self) -> bool {
        self.reader.byte_aligned()
    }

    /// Discards any unread bits of the current partial byte
    #[inline]
    pub fn align(&mut self) {
        self.reader.byte_align()
    }

    /// The index of the next unread byte
    ///
    /// A partially consumed byte counts as read.
    pub fn position(&mut self) -> usize {
        // seeking on an in-memory cursor cannot fail
        self.reader
            .position_in_bits()
            .map(|bits| bits.div_ceil(8) as usize)
            .unwrap_or(self.data.len())
    }

    /// Moves to the given byte offset, discarding any partial byte
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedStream`] if the offset
    /// lies beyond the end of the buffer.
    pub fn seek(&mut self, position: usize) -> Result<(), Error> {
        if position > self.data.len() {
            return Err(Error::TruncatedStream);
        }
        self.reader.seek_bits(SeekFrom::Start(position as u64 * 8))?;
        Ok(())
    }

    /// Whether any unconsumed bytes remain
    pub fn has_next(&mut self) -> bool {
        !self.reader.byte_aligned() || self.position() < self.data.len()
    }

    /// Takes the next `len` bytes as a sub-slice of the buffer
    ///
    /// The cursor is byte-aligned first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedStream`] if fewer than
    /// `len` bytes remain.
    pub fn take_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        self.align();
        let start = self.position();
        let bytes = start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or(Error::TruncatedStream)?;
        self.seek(start + len)?;
        Ok(bytes)
    }
}
