// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Builders for small FLAC streams used as test fixtures

#![allow(dead_code)]

use bitstream_io::{BigEndian, BitWrite, BitWriter};
use flac_extract::crc::{Checksum, Crc8, Crc16, checksum};

pub type Writer = BitWriter<Vec<u8>, BigEndian>;

/// Builds a byte-aligned buffer from the given writes
pub fn written(f: impl FnOnce(&mut Writer)) -> Vec<u8> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    f(&mut w);
    w.byte_align().unwrap();
    w.into_writer()
}

/// A metadata block with header
pub fn block(block_type: u8, last: bool, payload: &[u8]) -> Vec<u8> {
    written(|w| {
        w.write_bit(last).unwrap();
        w.write::<7, u8>(block_type).unwrap();
        w.write::<24, u32>(payload.len() as u32).unwrap();
        w.write_bytes(payload).unwrap();
    })
}

/// A STREAMINFO payload for a stream of fixed-size blocks
pub fn streaminfo(
    block_size: u16,
    channels: u8,
    bits_per_sample: u8,
    total_samples: u64,
    md5: [u8; 16],
) -> Vec<u8> {
    written(|w| {
        w.write::<16, u16>(block_size).unwrap();
        w.write::<16, u16>(block_size).unwrap();
        w.write::<24, u32>(0).unwrap();
        w.write::<24, u32>(0).unwrap();
        w.write::<20, u32>(44100).unwrap();
        w.write::<3, u8>(channels - 1).unwrap();
        w.write::<5, u8>(bits_per_sample - 1).unwrap();
        w.write::<36, u64>(total_samples).unwrap();
        w.write_bytes(&md5).unwrap();
    })
}

/// Channel assignment codes
pub const MONO: u8 = 0b0000;
pub const STEREO: u8 = 0b0001;
pub const LEFT_SIDE: u8 = 0b1000;
pub const SIDE_RIGHT: u8 = 0b1001;
pub const MID_SIDE: u8 = 0b1010;

/// A whole frame with a 16 bits-per-sample header
///
/// The block size is given explicitly in an 8 bit field
/// and the sample rate is taken from STREAMINFO.
/// Both checksums are calculated.
pub fn frame(
    number: u8,
    block_size: u16,
    channels: u8,
    subframes: impl FnOnce(&mut Writer),
) -> Vec<u8> {
    let mut header = written(|w| {
        w.write::<15, u16>(0b111111111111100).unwrap();
        w.write_bit(false).unwrap();
        w.write::<4, u8>(0b0110).unwrap();
        w.write::<4, u8>(0b0000).unwrap();
        w.write::<4, u8>(channels).unwrap();
        w.write::<3, u8>(0b100).unwrap();
        w.write::<1, u8>(0).unwrap();
        w.write::<8, u8>(number).unwrap();
        w.write::<8, u16>(block_size - 1).unwrap();
    });
    header.push(checksum::<Crc8>(&header).value());

    let mut w = BitWriter::endian(header, BigEndian);
    subframes(&mut w);
    w.byte_align().unwrap();
    let mut frame = w.into_writer();
    let crc16 = checksum::<Crc16>(&frame).value();
    frame.extend(crc16.to_be_bytes());
    frame
}

/// A subframe header with no wasted bits
pub fn subframe_header(w: &mut Writer, type_code: u8) {
    w.write_bit(false).unwrap();
    w.write::<6, u8>(type_code).unwrap();
    w.write_bit(false).unwrap();
}

/// A VERBATIM subframe
pub fn verbatim(w: &mut Writer, bits: u32, samples: &[i32]) {
    subframe_header(w, 1);
    for s in samples {
        w.write_signed_var(bits, *s).unwrap();
    }
}

/// A single-partition Rice-coded residual
pub fn rice_residual(w: &mut Writer, parameter: u32, residuals: &[i32]) {
    w.write::<2, u8>(0).unwrap();
    w.write::<4, u8>(0).unwrap();
    w.write_var::<u32>(4, parameter).unwrap();
    for r in residuals {
        let unsigned = ((r << 1) ^ (r >> 31)) as u32;
        w.write_unary::<1>(unsigned >> parameter).unwrap();
        if parameter > 0 {
            w.write_var(parameter, unsigned & ((1 << parameter) - 1))
                .unwrap();
        }
    }
}

/// A complete 16 bits-per-sample file of the given frames
pub fn flac_file(channels: u8, block_size: u16, md5: [u8; 16], frames: &[Vec<u8>]) -> Vec<u8> {
    let total = u64::from(block_size) * frames.len() as u64;
    let mut file = b"fLaC".to_vec();
    file.extend(block(
        0,
        true,
        &streaminfo(block_size, channels, 16, total, md5),
    ));
    frames.iter().for_each(|f| file.extend(f));
    file
}

/// MD5 of samples as interleaved 16-bit little-endian PCM
pub fn pcm_md5(channels: &[&[i32]]) -> [u8; 16] {
    let mut pcm = Vec::new();
    for i in 0..channels[0].len() {
        for c in channels {
            pcm.extend((c[i] as i16).to_le_bytes());
        }
    }
    md5::compute(pcm).0
}
