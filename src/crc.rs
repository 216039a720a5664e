// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CRC-8 and CRC-16 checksums used by FLAC frames

/// A running checksum over a sequence of bytes
pub trait Checksum: Default {
    /// The finished checksum value
    type Output: Eq;

    /// Updates checksum with a single byte
    fn update(&mut self, byte: u8);

    /// Returns our current checksum value
    fn value(&self) -> Self::Output;

    /// Updates checksum with all the given bytes
    fn update_all(&mut self, bytes: &[u8]) {
        bytes.iter().for_each(|b| self.update(*b))
    }

    /// Whether the checksum matches the expected value
    fn valid(&self, expected: Self::Output) -> bool {
        self.value() == expected
    }
}

/// Calculates a checksum over the whole of the given bytes
///
/// # Example
/// ```
/// use flac_extract::crc::{Crc16, Crc8, checksum};
///
/// assert_eq!(u8::from(checksum::<Crc8>(b"123456789")), 0xF4);
/// assert_eq!(u16::from(checksum::<Crc16>(b"123456789")), 0xFEE8);
/// ```
pub fn checksum<C: Checksum>(bytes: &[u8]) -> C {
    let mut c = C::default();
    c.update_all(bytes);
    c
}

/// CRC-8 with polynomial x⁸ + x² + x¹ + x⁰, as used by frame headers
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Crc8(u8);

impl Checksum for Crc8 {
    type Output = u8;

    #[inline]
    fn update(&mut self, byte: u8) {
        self.0 = CRC8_TABLE[usize::from(self.0 ^ byte)];
    }

    #[inline]
    fn value(&self) -> u8 {
        self.0
    }
}

impl From<Crc8> for u8 {
    #[inline]
    fn from(Crc8(crc): Crc8) -> Self {
        crc
    }
}

/// CRC-16 with polynomial x¹⁶ + x¹⁵ + x² + x⁰, as used by whole frames
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Crc16(u16);

impl Checksum for Crc16 {
    type Output = u16;

    #[inline]
    fn update(&mut self, byte: u8) {
        self.0 = (self.0 << 8) ^ CRC16_TABLE[usize::from((self.0 >> 8) as u8 ^ byte)];
    }

    #[inline]
    fn value(&self) -> u16 {
        self.0
    }
}

impl From<Crc16> for u16 {
    #[inline]
    fn from(Crc16(crc): Crc16) -> Self {
        crc
    }
}

const CRC8_TABLE: [u8; 256] = {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = match crc & 0x80 {
                0 => crc << 1,
                _ => (crc << 1) ^ 0x07,
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

const CRC16_TABLE: [u16; 256] = {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = match crc & 0x8000 {
                0 => crc << 1,
                _ => (crc << 1) ^ 0x8005,
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};
