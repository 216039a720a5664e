// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling FLAC frames and their headers
//!
//! Frames follow the final metadata block and run
//! to the end of the stream, one after another.
//! Each frame is a header, one subframe per channel,
//! padding to the next whole byte and a CRC-16.

use crate::cursor::BitCursor;
use crate::metadata::Streaminfo;
use crate::subframe::Subframe;
use crate::{CodeField, Error};
use bitstream_io::{BitRead, FromBitStreamWith};

/// How a stream's frames are sized
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockingStrategy {
    /// Frames have a fixed block size and are numbered by frame
    Fixed,
    /// Frames may vary in size and are numbered by sample
    Variable,
}

/// A FLAC frame header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 15   | sync code | `0b111111111111100`
/// | 1    | `blocking_strategy` | fixed or variable block size
/// | 4    | block size | block size code
/// | 4    | sample rate | sample rate code
/// | 4    | channel assignment | channel assignment code
/// | 3    | bits-per-sample | sample size code
/// | 1    | reserved | ignored
/// | 8-56 | `number` | UTF-8 encoded frame or sample number
/// | 0-16 | block size | explicit block size, if indicated by code
/// | 0-16 | sample rate | explicit sample rate, if indicated by code
/// | 8    | `crc8` | CRC-8 of all preceding header bytes
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrameHeader {
    /// Whether the stream has fixed or variable block sizes
    pub blocking_strategy: BlockingStrategy,
    /// Frame number for fixed streams, first sample number for variable ones
    pub number: u64,
    /// Samples per channel in this frame
    pub block_size: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// How channels are stored
    pub channel_assignment: ChannelAssignment,
    /// Bits per output sample
    pub bits_per_sample: u32,
    /// The header's stored CRC-8
    pub crc8: u8,
}

impl FrameHeader {
    const SYNC_CODE: u16 = 0b111111111111100;
}

impl FromBitStreamWith<'_> for FrameHeader {
    type Error = Error;
    type Context = Streaminfo;

    fn from_reader<R: BitRead + ?Sized>(
        r: &mut R,
        streaminfo: &Streaminfo,
    ) -> Result<Self, Self::Error> {
        if r.read::<15, u16>()? != Self::SYNC_CODE {
            return Err(Error::FrameSync);
        }
        let blocking_strategy = match r.read_bit()? {
            false => BlockingStrategy::Fixed,
            true => BlockingStrategy::Variable,
        };
        let encoded_block_size = r.read::<4, u8>()?;
        let encoded_sample_rate = r.read::<4, u8>()?;
        let encoded_channels = r.read::<4, u8>()?;
        let encoded_bps = r.read::<3, u8>()?;
        r.skip(1)?;
        let number = read_utf8_number(r, blocking_strategy)?;

        Ok(Self {
            blocking_strategy,
            number,
            block_size: match encoded_block_size {
                0b0000 => return Err(Error::InvalidCode(CodeField::BlockSize)),
                0b0001 => 192,
                v @ 0b0010..=0b0101 => 576 << (v - 2),
                0b0110 => r.read::<8, u32>()? + 1,
                0b0111 => r.read::<16, u32>()? + 1,
                v => 1 << v,
            },
            sample_rate: match encoded_sample_rate {
                0b0000 => streaminfo.sample_rate,
                0b0001 => 88200,
                0b0010 => 176400,
                0b0011 => 192000,
                0b0100 => 8000,
                0b0101 => 16000,
                0b0110 => 22050,
                0b0111 => 24000,
                0b1000 => 32000,
                0b1001 => 44100,
                0b1010 => 48000,
                0b1011 => 96000,
                0b1100 => r.read::<8, u32>()? * 1000,
                0b1101 => r.read::<16, _>()?,
                0b1110 => r.read::<16, u32>()? * 10,
                _ => return Err(Error::InvalidCode(CodeField::SampleRate)),
            },
            channel_assignment: match encoded_channels {
                c @ 0b0000..=0b0111 => ChannelAssignment::Independent(c + 1),
                0b1000 => ChannelAssignment::LeftSide,
                0b1001 => ChannelAssignment::SideRight,
                0b1010 => ChannelAssignment::MidSide,
                _ => return Err(Error::InvalidCode(CodeField::ChannelAssignment)),
            },
            bits_per_sample: match encoded_bps {
                0b000 => u32::from(streaminfo.bits_per_sample.get()),
                0b001 => 8,
                0b010 => 12,
                0b100 => 16,
                0b101 => 20,
                0b110 => 24,
                0b111 => 32,
                _ => return Err(Error::InvalidCode(CodeField::SampleSize)),
            },
            crc8: r.read_to()?,
        })
    }
}

/// Reads a frame or sample number in its UTF-8 style encoding
///
/// The leading 1 bits of the first byte give the total byte count,
/// each following byte must be of the form `0b10xxxxxx`.
fn read_utf8_number<R: BitRead + ?Sized>(
    r: &mut R,
    blocking_strategy: BlockingStrategy,
) -> Result<u64, Error> {
    let max_bytes = match blocking_strategy {
        BlockingStrategy::Fixed => 6,
        BlockingStrategy::Variable => 7,
    };

    let first = r.read_to::<u8>()?;
    match first.leading_ones() {
        0 => Ok(first.into()),
        bytes @ 2.. if bytes <= max_bytes => {
            let mut number = u64::from(first & (0x7F >> bytes));
            for _ in 1..bytes {
                match r.read_to::<u8>()? {
                    b if b & 0b11_000000 == 0b10_000000 => {
                        number = (number << 6) | u64::from(b & 0b00_111111);
                    }
                    _ => return Err(Error::InvalidFrameNumber),
                }
            }
            Ok(number)
        }
        _ => Err(Error::InvalidFrameNumber),
    }
}

/// A channel's role in a frame
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Channel {
    /// The only channel of a mono stream
    Mono,
    /// Left
    Left,
    /// Right
    Right,
    /// Center
    Center,
    /// Front left
    FrontLeft,
    /// Front right
    FrontRight,
    /// Front center
    FrontCenter,
    /// Low-frequency effects
    Lfe,
    /// Back left
    BackLeft,
    /// Back right
    BackRight,
    /// Back center
    BackCenter,
    /// Middle left
    MiddleLeft,
    /// Middle right
    MiddleRight,
    /// Difference of left and right, stored with one extra bit
    Side,
    /// Average of left and right
    Mid,
}

/// How a frame's channels are stored
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelAssignment {
    /// From 1 to 8 channels, each stored as-is
    Independent(u8),
    /// Left channel and side channel
    LeftSide,
    /// Side channel and right channel
    SideRight,
    /// Mid channel and side channel
    MidSide,
}

impl ChannelAssignment {
    /// The roles of each stored subframe, in order
    pub fn channels(&self) -> &'static [Channel] {
        use Channel::*;

        match self {
            Self::Independent(1) => &[Mono],
            Self::Independent(2) => &[Left, Right],
            Self::Independent(3) => &[Left, Right, Center],
            Self::Independent(4) => &[FrontLeft, FrontRight, BackLeft, BackRight],
            Self::Independent(5) => &[FrontLeft, FrontRight, FrontCenter, BackLeft, BackRight],
            Self::Independent(6) => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackLeft,
                BackRight,
            ],
            Self::Independent(7) => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackCenter,
                MiddleLeft,
                MiddleRight,
            ],
            Self::Independent(_) => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                BackLeft,
                BackRight,
                MiddleLeft,
                MiddleRight,
            ],
            Self::LeftSide => &[Left, Side],
            Self::SideRight => &[Side, Right],
            Self::MidSide => &[Mid, Side],
        }
    }

    /// Number of channels
    #[inline]
    pub fn len(&self) -> usize {
        self.channels().len()
    }

    /// Always false, since every assignment has at least one channel
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A FLAC frame whose subframes are read but not yet reconstructed
///
/// The frame borrows its raw bytes from the source buffer
/// so that its checksums can be verified later.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame<'a> {
    /// The frame's header
    pub header: FrameHeader,
    /// The frame's stored CRC-16
    pub crc16: u16,
    subframes: Vec<Subframe>,
    data: &'a [u8],
    header_len: usize,
}

impl<'a> Frame<'a> {
    /// One subframe per channel assignment slot
    #[inline]
    pub fn subframes(&self) -> &[Subframe] {
        &self.subframes
    }

    /// The frame's bytes from its sync code up to its CRC-16
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The frame header's length in bytes, including its CRC-8
    #[inline]
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Whether the frame's bytes match its stored CRC-16
    pub fn verify(&self) -> bool {
        use crate::crc::{Checksum, Crc16, checksum};

        checksum::<Crc16>(self.data).valid(self.crc16)
    }

    /// Whether the header's bytes match its stored CRC-8
    pub fn verify_header(&self) -> bool {
        use crate::crc::{Checksum, Crc8, checksum};

        checksum::<Crc8>(&self.data[0..self.header_len - 1]).valid(self.header.crc8)
    }

    /// Checks both the header's CRC-8 and the frame's CRC-16
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crc8Mismatch`] or [`Error::Crc16Mismatch`]
    /// for the first checksum which does not match.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.verify_header() {
            Err(Error::Crc8Mismatch)
        } else if !self.verify() {
            Err(Error::Crc16Mismatch)
        } else {
            Ok(())
        }
    }
}

/// Reads a single frame from the cursor's current position
///
/// The cursor must be byte-aligned at the frame's sync code
/// and is left byte-aligned just after the frame's CRC-16.
///
/// # Errors
///
/// Returns an error if the frame is malformed or truncated.
/// No attempt is made to find a following frame.
pub fn read_frame<'a>(
    cursor: &mut BitCursor<'a>,
    streaminfo: &Streaminfo,
) -> Result<Frame<'a>, Error> {
    let start = cursor.position();
    let header: FrameHeader = cursor.parse_with(streaminfo)?;
    let header_len = cursor.position() - start;

    let subframes = header
        .channel_assignment
        .channels()
        .iter()
        .map(|channel| {
            let bits_per_sample = match channel {
                Channel::Side => header.bits_per_sample + 1,
                _ => header.bits_per_sample,
            };
            Subframe::read(cursor, bits_per_sample, header.block_size)
        })
        .collect::<Result<Vec<_>, _>>()?;

    cursor.align();
    let data = &cursor.data()[start..cursor.position()];
    // 16 bits always fit
    let crc16 = cursor.read_bits(16)? as u16;

    log::debug!(
        "frame {} at byte {start}: {} samples, {:?}",
        header.number,
        header.block_size,
        header.channel_assignment,
    );

    Ok(Frame {
        header,
        subframes,
        crc16,
        data,
        header_len,
    })
}

/// Reads frames from the cursor until the buffer is exhausted
///
/// # Errors
///
/// Returns the first error encountered.
/// A corrupt frame is never skipped.
pub fn read_frames<'a>(
    cursor: &mut BitCursor<'a>,
    streaminfo: &Streaminfo,
) -> Result<Vec<Frame<'a>>, Error> {
    let mut frames = Vec::new();
    while cursor.has_next() {
        frames.push(read_frame(cursor, streaminfo)?);
    }
    Ok(frames)
}
