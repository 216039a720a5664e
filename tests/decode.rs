// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod common;

use bitstream_io::BitWrite;
use common::*;
use flac_extract::decode::{Verified, verify};
use flac_extract::stream::ChannelAssignment;
use flac_extract::subframe::Subframe;
use flac_extract::{Error, Options, extract};

fn decode_single(channels: u8, block_size: u16, subframes: impl FnOnce(&mut Writer)) -> Vec<Vec<i32>> {
    let data = flac_file(
        if channels < 8 { channels + 1 } else { 2 },
        block_size,
        [0; 16],
        &[frame(0, block_size, channels, subframes)],
    );

    let flac = extract(&data, Options::default().frames(true).verify_crc(true)).unwrap();
    let frames = flac.frames().unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].verify());
    assert!(frames[0].verify_header());
    frames[0].decode().unwrap()
}

#[test]
fn test_constant() {
    let decoded = decode_single(MONO, 4, |w| {
        w.write_bit(false).unwrap();
        w.write::<6, u8>(0).unwrap();
        w.write_bit(true).unwrap();
        w.write_unary::<1>(1).unwrap(); // 2 wasted bits
        w.write_signed_var(14, -3i32).unwrap();
    });

    assert_eq!(decoded, [[-12; 4]]);
}

#[test]
fn test_verbatim() {
    let decoded = decode_single(STEREO, 3, |w| {
        verbatim(w, 16, &[1, -2, 300]);
        verbatim(w, 16, &[-32768, 0, 32767]);
    });

    assert_eq!(
        decoded,
        [vec![1, -2, 300], vec![-32768, 0, 32767]]
    );
}

#[test]
fn test_fixed_order_0() {
    let decoded = decode_single(MONO, 5, |w| {
        subframe_header(w, 8);
        rice_residual(w, 2, &[5, -5, 0, 1, -100]);
    });

    assert_eq!(decoded, [[5, -5, 0, 1, -100]]);
}

#[test]
fn test_fixed_order_2() {
    let decoded = decode_single(MONO, 6, |w| {
        subframe_header(w, 8 + 2);
        w.write_signed_var(16, 1i32).unwrap();
        w.write_signed_var(16, 2i32).unwrap();
        rice_residual(w, 1, &[0, -1, 1, 0]);
    });

    assert_eq!(decoded, [[1, 2, 3, 3, 4, 5]]);
}

#[test]
fn test_lpc_zero_coefficient() {
    // with a 0 coefficient and no shift, samples are their residuals
    let decoded = decode_single(MONO, 5, |w| {
        subframe_header(w, 32);
        w.write_signed_var(16, 7i32).unwrap();
        w.write::<4, u8>(0).unwrap(); // 1 bit precision
        w.write_signed_var(5, 0i32).unwrap();
        w.write_signed_var(1, 0i32).unwrap();
        rice_residual(w, 3, &[0, -1, 1, -2]);
    });

    assert_eq!(decoded, [[7, 0, -1, 1, -2]]);
}

#[test]
fn test_lpc_partitions() {
    // order 2 LPC averaging the last two samples,
    // with residuals in 2 partitions, the second escaped
    let decoded = decode_single(MONO, 8, |w| {
        subframe_header(w, 32 + 1);
        w.write_signed_var(16, 100i32).unwrap();
        w.write_signed_var(16, 200i32).unwrap();
        w.write::<4, u8>(2).unwrap(); // 3 bit precision
        w.write_signed_var(5, 1i32).unwrap();
        w.write_signed_var(3, 1i32).unwrap();
        w.write_signed_var(3, 1i32).unwrap();

        w.write::<2, u8>(1).unwrap(); // 5 bit parameters
        w.write::<4, u8>(1).unwrap(); // 2 partitions of 4
        // first partition holds 4 - 2 residuals
        w.write::<5, u8>(0).unwrap();
        w.write_unary::<1>(0).unwrap();
        w.write_unary::<1>(0).unwrap();
        // second partition escaped with 8 bit residuals
        w.write::<5, u8>(0b11111).unwrap();
        w.write::<5, u8>(8).unwrap();
        for r in [1i8, -1, 10, -128] {
            w.write_signed_var(8, r).unwrap();
        }
    });

    assert_eq!(decoded, [[100, 200, 150, 175, 163, 168, 175, 43]]);
}

#[test]
fn test_stereo_decorrelation() {
    let left = [10, 20];
    let right = [7, 25];

    // left-side
    let decoded = decode_single(LEFT_SIDE, 2, |w| {
        verbatim(w, 16, &left);
        verbatim(w, 17, &[3, -5]);
    });
    assert_eq!(decoded, [left, right]);

    // side-right
    let decoded = decode_single(SIDE_RIGHT, 2, |w| {
        verbatim(w, 17, &[3, -5]);
        verbatim(w, 16, &right);
    });
    assert_eq!(decoded, [left, right]);

    // mid-side, with mid as the floored average
    let decoded = decode_single(MID_SIDE, 2, |w| {
        verbatim(w, 16, &[8, 22]);
        verbatim(w, 17, &[3, -5]);
    });
    assert_eq!(decoded, [left, right]);
}

#[test]
fn test_side_channel_extra_bit() {
    // a side channel difference which needs all 17 bits
    let decoded = decode_single(LEFT_SIDE, 1, |w| {
        verbatim(w, 16, &[32767]);
        verbatim(w, 17, &[65535]);
    });
    assert_eq!(decoded, [[32767], [-32768]]);
}

#[test]
fn test_subframes_kept() {
    let data = flac_file(
        1,
        4,
        [0; 16],
        &[frame(0, 4, MONO, |w| {
            subframe_header(w, 0);
            w.write_signed_var(16, 9i32).unwrap();
        })],
    );

    let flac = extract(&data, Options::default().frames(true)).unwrap();
    let first = &flac.frames().unwrap()[0];
    assert_eq!(first.header.block_size, 4);
    assert_eq!(first.header.sample_rate, 44100);
    assert_eq!(first.header.bits_per_sample, 16);
    assert_eq!(
        first.header.channel_assignment,
        ChannelAssignment::Independent(1)
    );
    assert_eq!(
        first.subframes(),
        [Subframe::Constant {
            sample: 9,
            wasted_bits: 0
        }]
    );
    assert_eq!(first.header_len(), 7);
    assert_eq!(first.data().len() + 2, data.len() - flac.frames_offset());
}

#[test]
fn test_multiple_frames() {
    let frames: Vec<Vec<u8>> = (0..3)
        .map(|n| {
            frame(n, 2, MONO, |w| {
                verbatim(w, 16, &[i32::from(n), -i32::from(n)]);
            })
        })
        .collect();
    let data = flac_file(1, 2, [0; 16], &frames);

    let flac = extract(&data, Options::default().frames(true).verify_crc(true)).unwrap();
    let frames = flac.frames().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(
        frames.iter().map(|f| f.header.number).collect::<Vec<_>>(),
        [0, 1, 2]
    );

    let decoded = flac.decode_all().unwrap();
    assert_eq!(
        decoded
            .iter()
            .flat_map(|s| s.iter())
            .collect::<Vec<_>>(),
        [0, 0, 1, -1, 2, -2]
    );
}

#[test]
fn test_frames_not_requested() {
    let data = flac_file(
        1,
        1,
        [0; 16],
        &[frame(0, 1, MONO, |w| verbatim(w, 16, &[1]))],
    );

    let flac = extract(&data, Options::default()).unwrap();
    assert!(flac.frames().is_none());
    assert!(flac.decode_all().unwrap().is_empty());
}

#[test]
fn test_md5_verification() {
    let left = [1, -1, 1000, -1000];
    let right = [0, 5, -32768, 32767];
    let frames = [frame(0, 4, STEREO, |w| {
        verbatim(w, 16, &left);
        verbatim(w, 16, &right);
    })];

    let md5 = pcm_md5(&[&left, &right]);
    assert_eq!(
        verify(&flac_file(2, 4, md5, &frames)).unwrap(),
        Verified::MD5Match
    );

    let mut bad_md5 = md5;
    bad_md5[0] ^= 1;
    assert_eq!(
        verify(&flac_file(2, 4, bad_md5, &frames)).unwrap(),
        Verified::MD5Mismatch
    );

    assert_eq!(
        verify(&flac_file(2, 4, [0; 16], &frames)).unwrap(),
        Verified::NoMD5
    );
}

#[test]
fn test_corrupted_sync() {
    let frames: Vec<Vec<u8>> = (0..2)
        .map(|n| frame(n, 1, MONO, |w| verbatim(w, 16, &[1])))
        .collect();
    let mut data = flac_file(1, 1, [0; 16], &frames);

    // break 2 bits of the second frame's sync code
    let second = data.len() - frames[1].len();
    data[second + 1] ^= 0b1100;

    assert!(matches!(
        extract(&data, Options::default().frames(true)),
        Err(Error::FrameSync)
    ));

    // metadata alone is still readable
    assert!(extract(&data, Options::default()).is_ok());
}

#[test]
fn test_crc_mismatch() {
    let mut data = flac_file(
        1,
        2,
        [0; 16],
        &[frame(0, 2, MONO, |w| verbatim(w, 16, &[1, 2]))],
    );
    let last = data.len() - 1;
    data[last] ^= 1;

    // checksums are only advisory unless requested
    let flac = extract(&data, Options::default().frames(true)).unwrap();
    let first = &flac.frames().unwrap()[0];
    assert!(first.verify_header());
    assert!(!first.verify());
    assert_eq!(first.decode().unwrap(), [[1, 2]]);

    assert!(matches!(
        extract(&data, Options::default().frames(true).verify_crc(true)),
        Err(Error::Crc16Mismatch)
    ));

    // corrupt the header's CRC-8 instead
    let mut data = flac_file(
        1,
        2,
        [0; 16],
        &[frame(0, 2, MONO, |w| verbatim(w, 16, &[1, 2]))],
    );
    // 2 bytes of CRC-16, 5 bytes of subframe, then the CRC-8
    let crc8 = data.len() - 2 - 5 - 1;
    data[crc8] ^= 0x80;
    assert!(matches!(
        extract(&data, Options::default().frames(true).verify_crc(true)),
        Err(Error::Crc8Mismatch)
    ));
}

#[test]
fn test_truncated_frame() {
    let data = flac_file(
        1,
        2,
        [0; 16],
        &[frame(0, 2, MONO, |w| verbatim(w, 16, &[1, 2]))],
    );

    for len in (data.len() - 8)..data.len() {
        assert!(matches!(
            extract(&data[0..len], Options::default().frames(true)),
            Err(Error::TruncatedStream)
        ));
    }
}

#[test]
fn test_sample_overflow() {
    use flac_extract::crc::{Checksum, Crc8, Crc16, checksum};

    // left-side where right = left - side leaves the 32 bit range
    let mut bytes = written(|w| {
        w.write::<15, u16>(0b111111111111100).unwrap();
        w.write_bit(false).unwrap();
        w.write::<4, u8>(0b0110).unwrap();
        w.write::<4, u8>(0b0000).unwrap();
        w.write::<4, u8>(LEFT_SIDE).unwrap();
        w.write::<3, u8>(0b111).unwrap(); // 32 bps
        w.write::<1, u8>(0).unwrap();
        w.write::<8, u8>(0).unwrap();
        w.write::<8, u8>(0).unwrap();
    });
    bytes.push(checksum::<Crc8>(&bytes).value());
    bytes.extend(written(|w| {
        verbatim(w, 32, &[i32::MIN]);
        subframe_header(w, 1);
        w.write_signed_var(33, 1i64).unwrap();
    }));
    let crc16 = checksum::<Crc16>(&bytes).value();
    bytes.extend(crc16.to_be_bytes());

    let data = flac_file(2, 1, [0; 16], &[bytes]);

    let flac = extract(&data, Options::default().frames(true).verify_crc(true)).unwrap();
    assert!(matches!(
        flac.frames().unwrap()[0].decode(),
        Err(Error::SampleOverflow)
    ));
}
