// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A strict, zero-copy parser for FLAC bitstreams
//!
//! Given a whole FLAC file already in memory,
//! [`extract`] walks its metadata blocks and, optionally,
//! every one of its frames.
//! Metadata blocks and frames borrow from the input buffer
//! and are only decoded further when asked to:
//! [`metadata::MetadataBlock::decode`] turns a block's payload
//! into a typed structure, and [`stream::Frame::decode`]
//! reconstructs a frame's per-channel samples.
//!
//! Any malformed input aborts the whole call with an [`Error`].
//! The parser never skips ahead looking for the next valid frame.
//!
//! # Example
//!
//! ```
//! use flac_extract::{Error, Options, extract};
//!
//! let data: &[u8] = b"fLaC\x81\x00\x00\x00";  // a lone, empty PADDING block
//! let flac = extract(data, Options::default()).unwrap();
//! assert_eq!(flac.blocks().len(), 1);
//! assert_eq!(flac.frames_offset(), 8);
//! assert!(flac.frames().is_none());
//!
//! // frames are always decoded against a STREAMINFO block
//! assert!(matches!(
//!     extract(data, Options::default().frames(true)),
//!     Err(Error::MissingStreaminfo),
//! ));
//!
//! assert!(matches!(extract(b"RIFF", Options::default()), Err(Error::InvalidMagic)));
//! ```

pub mod audio;
pub mod crc;
pub mod cursor;
pub mod decode;
pub mod metadata;
pub mod stream;
pub mod subframe;

use cursor::BitCursor;
use metadata::{MetadataBlock, SeekTable, Streaminfo, VorbisComment};
use stream::Frame;

/// The magic number which begins every FLAC file
pub const FLAC_MAGIC: [u8; 4] = *b"fLaC";

/// A possible error when parsing or decoding FLAC data
#[derive(Debug)]
pub enum Error {
    /// An I/O error other than running out of data
    Io(std::io::Error),
    /// A string field is not valid UTF-8
    Utf8(std::string::FromUtf8Error),
    /// The buffer does not begin with `fLaC`
    InvalidMagic,
    /// A read went past the end of the buffer
    TruncatedStream,
    /// A frame does not begin with the frame sync code
    FrameSync,
    /// A reserved or undefined code in the given field
    InvalidCode(CodeField),
    /// An LPC subframe's coefficient precision field is all 1 bits
    InvalidCoefficientPrecision,
    /// A block size is not divisible by the residual partition count,
    /// or its first partition is smaller than the predictor order
    PartitionAlignment,
    /// Frames were requested from a stream without STREAMINFO
    MissingStreaminfo,
    /// STREAMINFO payload is not exactly 34 bytes
    InvalidStreaminfoSize,
    /// SEEKTABLE payload is not a whole number of seek points
    InvalidSeekTableSize,
    /// APPLICATION payload is too small for its ID
    InsufficientApplicationBlock,
    /// A VORBIS_COMMENT field is missing its `=` separator
    InvalidVorbisComment,
    /// A Vorbis comment key contains `=`
    InvalidTagKey,
    /// A metadata block's contents exceed 2²⁴ - 1 bytes
    ExcessiveBlockSize,
    /// A reserved metadata block type cannot be encoded
    ReservedMetadataBlock,
    /// A frame or sample number is incorrectly encoded
    InvalidFrameNumber,
    /// A subframe's leading padding bit is set
    InvalidSubframeHeader,
    /// A subframe's wasted bits consume its entire sample size
    ExcessiveWastedBits,
    /// A predictor order is larger than the block size
    InvalidPredictorOrder,
    /// An LPC subframe has a negative quantization shift
    NegativeLpcShift,
    /// A residual value does not fit in 32 bits
    ResidualOverflow,
    /// A reconstructed sample does not fit in 32 bits
    SampleOverflow,
    /// A frame header's CRC-8 does not match its contents
    Crc8Mismatch,
    /// A frame's CRC-16 does not match its contents
    Crc16Mismatch,
}

/// The frame or subframe field a reserved code was found in
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CodeField {
    /// The frame header's block size code
    BlockSize,
    /// The frame header's sample rate code
    SampleRate,
    /// The frame header's sample size code
    SampleSize,
    /// The frame header's channel assignment code
    ChannelAssignment,
    /// The subframe header's type code
    SubframeType,
    /// The residual's coding method
    ResidualCoding,
}

impl std::fmt::Display for CodeField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::BlockSize => "block size".fmt(f),
            Self::SampleRate => "sample rate".fmt(f),
            Self::SampleSize => "sample size".fmt(f),
            Self::ChannelAssignment => "channel assignment".fmt(f),
            Self::SubframeType => "subframe type".fmt(f),
            Self::ResidualCoding => "residual coding method".fmt(f),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::TruncatedStream,
            _ => Self::Io(error),
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(error: std::string::FromUtf8Error) -> Self {
        Self::Utf8(error)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
            Self::InvalidMagic => "missing FLAC tag".fmt(f),
            Self::TruncatedStream => "unexpected end of stream".fmt(f),
            Self::FrameSync => "invalid frame sync code".fmt(f),
            Self::InvalidCode(field) => write!(f, "invalid {field} code"),
            Self::InvalidCoefficientPrecision => "invalid LPC coefficient precision".fmt(f),
            Self::PartitionAlignment => "residual partitions do not fit block size".fmt(f),
            Self::MissingStreaminfo => "STREAMINFO block not found".fmt(f),
            Self::InvalidStreaminfoSize => "STREAMINFO block is not 34 bytes".fmt(f),
            Self::InvalidSeekTableSize => "invalid SEEKTABLE block size".fmt(f),
            Self::InsufficientApplicationBlock => "APPLICATION block too small for data".fmt(f),
            Self::InvalidVorbisComment => "VORBIS_COMMENT field missing '='".fmt(f),
            Self::InvalidTagKey => "VORBIS_COMMENT key must not contain '='".fmt(f),
            Self::ExcessiveBlockSize => "metadata block too large".fmt(f),
            Self::ReservedMetadataBlock => "reserved metadata block".fmt(f),
            Self::InvalidFrameNumber => "invalid frame number".fmt(f),
            Self::InvalidSubframeHeader => "invalid subframe header".fmt(f),
            Self::ExcessiveWastedBits => "excessive wasted bits in subframe".fmt(f),
            Self::InvalidPredictorOrder => "predictor order exceeds block size".fmt(f),
            Self::NegativeLpcShift => "negative LPC shift".fmt(f),
            Self::ResidualOverflow => "residual value too large".fmt(f),
            Self::SampleOverflow => "decoded sample too large".fmt(f),
            Self::Crc8Mismatch => "frame header CRC-8 mismatch".fmt(f),
            Self::Crc16Mismatch => "frame CRC-16 mismatch".fmt(f),
        }
    }
}

/// FLAC extraction options
///
/// By default, only metadata blocks are read
/// and no checksums are verified.
///
/// # Example
/// ```
/// use flac_extract::Options;
///
/// let options = Options::default().frames(true).verify_crc(true);
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct Options {
    frames: bool,
    verify_crc: bool,
}

impl Options {
    /// Whether to extract frames in addition to metadata blocks
    pub fn frames(self, frames: bool) -> Self {
        Self { frames, ..self }
    }

    /// Whether to check each frame's CRC-8 and CRC-16 while extracting
    ///
    /// Implies nothing unless frames are also extracted.
    pub fn verify_crc(self, verify_crc: bool) -> Self {
        Self { verify_crc, ..self }
    }
}

/// A parsed FLAC file
#[derive(Debug)]
pub struct Flac<'a> {
    blocks: Vec<MetadataBlock<'a>>,
    frames: Option<Vec<Frame<'a>>>,
    frames_offset: usize,
}

impl<'a> Flac<'a> {
    /// All metadata blocks, in file order
    #[inline]
    pub fn blocks(&self) -> &[MetadataBlock<'a>] {
        &self.blocks
    }

    /// All frames, if extracted
    #[inline]
    pub fn frames(&self) -> Option<&[Frame<'a>]> {
        self.frames.as_deref()
    }

    /// Byte offset of the first frame from the start of the file
    #[inline]
    pub fn frames_offset(&self) -> usize {
        self.frames_offset
    }

    /// The decoded STREAMINFO block, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the block is malformed.
    pub fn streaminfo(&self) -> Result<Option<Streaminfo>, Error> {
        use metadata::{Block, BlockType};

        self.blocks
            .iter()
            .find(|b| b.block_type() == BlockType::Streaminfo)
            .map(|b| match b.decode()? {
                Some(Block::Streaminfo(s)) => Ok(s),
                _ => Err(Error::MissingStreaminfo),
            })
            .transpose()
    }

    /// The decoded VORBIS_COMMENT block, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the block is malformed.
    pub fn vorbis_comment(&self) -> Result<Option<VorbisComment>, Error> {
        use metadata::{Block, BlockType};

        self.blocks
            .iter()
            .filter(|b| b.block_type() == BlockType::VorbisComment)
            .find_map(|b| match b.decode() {
                Ok(Some(Block::VorbisComment(c))) => Some(Ok(c)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
            .transpose()
    }

    /// The decoded SEEKTABLE block, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the block is malformed.
    pub fn seek_table(&self) -> Result<Option<SeekTable>, Error> {
        use metadata::{Block, BlockType};

        self.blocks
            .iter()
            .filter(|b| b.block_type() == BlockType::SeekTable)
            .find_map(|b| match b.decode() {
                Ok(Some(Block::SeekTable(s))) => Some(Ok(s)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
            .transpose()
    }
}

/// Parses a whole FLAC file from the given buffer
///
/// Metadata blocks are always read, frames only when
/// requested by `options`.
///
/// # Errors
///
/// Returns [`Error::InvalidMagic`] if the buffer does not begin with `fLaC`,
/// [`Error::MissingStreaminfo`] if frames are requested from
/// a file without a STREAMINFO block,
/// or any error encountered while walking the blocks or frames.
pub fn extract(data: &[u8], options: Options) -> Result<Flac<'_>, Error> {
    if data.get(0..4) != Some(FLAC_MAGIC.as_slice()) {
        return Err(Error::InvalidMagic);
    }

    let mut cursor = BitCursor::at(data, FLAC_MAGIC.len())?;
    let blocks = metadata::read_blocks(&mut cursor)?;
    let frames_offset = cursor.position();

    let mut flac = Flac {
        blocks,
        frames: None,
        frames_offset,
    };

    if options.frames {
        let Some(streaminfo) = flac.streaminfo()? else {
            log::warn!("cannot extract frames without STREAMINFO");
            return Err(Error::MissingStreaminfo);
        };

        let frames = stream::read_frames(&mut cursor, &streaminfo)?;
        if options.verify_crc {
            frames.iter().try_for_each(Frame::validate)?;
        }
        flac.frames = Some(frames);
    }

    Ok(flac)
}
