// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a FLAC file's metadata blocks
//!
//! Many items are capitalized simply because they were capitalized
//! in the original FLAC format documentation.
//!
//! # Metadata Blocks
//!
//! | Block Type | Purpose |
//! |-----------:|---------|
//! | STREAMINFO | stream parameters, required before any frames |
//! | PADDING | empty space reserved for later use |
//! | APPLICATION | data registered to a particular application |
//! | SEEKTABLE | sample offsets of particular frames |
//! | VORBIS_COMMENT | textual metadata such as track title |
//! | CUESHEET | CD track and index layout (not decoded) |
//! | PICTURE | embedded images such as cover art |
//!
//! Blocks are walked without decoding their payloads.
//! Each [`MetadataBlock`] borrows its payload from the source buffer
//! and [`MetadataBlock::decode`] parses it only when asked.

use crate::Error;
use crate::cursor::BitCursor;
use bitstream_io::{
    BigEndian, BitRead, BitReader, BitWrite, BitWriter, FromBitStream, FromBitStreamUsing,
    LittleEndian, ToBitStream,
};
use std::num::NonZero;

/// The largest payload a metadata block may hold (2²⁴ - 1 bytes)
pub const MAX_BLOCK_SIZE: u32 = (1 << 24) - 1;

/// A FLAC metadata block header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 1    | `last` | final metadata block in file |
/// | 7    | `block_type` | type of block |
/// | 24   | `size` | block size, in bytes |
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_extract::metadata::{BlockHeader, BlockType};
///
/// let data: &[u8] = &[0b1_0000000, 0x00, 0x00, 0x22];
/// let mut r = BitReader::endian(data, BigEndian);
/// assert_eq!(
///     r.parse::<BlockHeader>().unwrap(),
///     BlockHeader {
///         last: true,
///         block_type: BlockType::Streaminfo,
///         size: 0x22,
///     },
/// );
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
    /// Whether we are the final block
    pub last: bool,
    /// Our block type
    pub block_type: BlockType,
    /// Our block size, in bytes
    pub size: u32,
}

impl FromBitStream for BlockHeader {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        Ok(Self {
            last: r.read_bit()?,
            block_type: r.read::<7, u8>()?.into(),
            size: r.read::<24, _>()?,
        })
    }
}

impl ToBitStream for BlockHeader {
    type Error = Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        if matches!(self.block_type, BlockType::Reserved(_)) {
            return Err(Error::ReservedMetadataBlock);
        }
        if self.size > MAX_BLOCK_SIZE {
            return Err(Error::ExcessiveBlockSize);
        }
        w.write_bit(self.last)?;
        w.write::<7, u8>(self.block_type.code())?;
        w.write::<24, _>(self.size)?;
        Ok(())
    }
}

/// A type of FLAC metadata block
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockType {
    /// The STREAMINFO block
    Streaminfo,
    /// The PADDING block
    Padding,
    /// The APPLICATION block
    Application,
    /// The SEEKTABLE block
    SeekTable,
    /// The VORBIS_COMMENT block
    VorbisComment,
    /// The CUESHEET block
    Cuesheet,
    /// The PICTURE block
    Picture,
    /// A reserved block type, from 7 to 127
    Reserved(u8),
}

impl BlockType {
    /// Our 7-bit type code
    pub fn code(self) -> u8 {
        match self {
            Self::Streaminfo => 0,
            Self::Padding => 1,
            Self::Application => 2,
            Self::SeekTable => 3,
            Self::VorbisComment => 4,
            Self::Cuesheet => 5,
            Self::Picture => 6,
            Self::Reserved(code) => code,
        }
    }

    /// Our name as capitalized in the FLAC documentation
    pub fn name(self) -> &'static str {
        match self {
            Self::Streaminfo => "STREAMINFO",
            Self::Padding => "PADDING",
            Self::Application => "APPLICATION",
            Self::SeekTable => "SEEKTABLE",
            Self::VorbisComment => "VORBIS_COMMENT",
            Self::Cuesheet => "CUESHEET",
            Self::Picture => "PICTURE",
            Self::Reserved(_) => "RESERVED",
        }
    }
}

impl From<u8> for BlockType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Streaminfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::Cuesheet,
            6 => Self::Picture,
            code => Self::Reserved(code),
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

/// An undecoded metadata block borrowing its payload from the source
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MetadataBlock<'a> {
    block_type: BlockType,
    last: bool,
    data: &'a [u8],
}

impl<'a> MetadataBlock<'a> {
    /// Our block type
    #[inline]
    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// Whether we are flagged as the final metadata block
    #[inline]
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Our raw payload
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Decodes our payload into its typed form
    ///
    /// Returns `None` for CUESHEET blocks, which are not decoded.
    /// Decoding is pure, so this may be called any number of times.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed for its type.
    pub fn decode(&self) -> Result<Option<Block<'a>>, Error> {
        let data = self.data;

        Ok(Some(match self.block_type {
            BlockType::Streaminfo => match data.len() {
                Streaminfo::SIZE => Block::Streaminfo(BitReader::endian(data, BigEndian).parse()?),
                _ => return Err(Error::InvalidStreaminfoSize),
            },
            BlockType::Padding => Block::Padding(Padding { size: data.len() }),
            BlockType::Application => Block::Application(Application::decode(data)?),
            BlockType::SeekTable => Block::SeekTable(
                BitReader::endian(data, BigEndian).parse_using(data.len())?,
            ),
            BlockType::VorbisComment => {
                Block::VorbisComment(BitReader::endian(data, BigEndian).parse()?)
            }
            BlockType::Cuesheet => return Ok(None),
            BlockType::Picture => Block::Picture(Picture::decode(data)?),
            BlockType::Reserved(code) => Block::Reserved { code, data },
        }))
    }

    /// Builds the 4 byte header for a block with the given payload size
    ///
    /// # Errors
    ///
    /// Returns an error if the size is larger than a block can hold
    /// or if the block type is reserved.
    ///
    /// # Example
    /// ```
    /// use flac_extract::metadata::{BlockType, MetadataBlock};
    ///
    /// assert_eq!(
    ///     MetadataBlock::encode_header(BlockType::VorbisComment, true, 0x0102).unwrap(),
    ///     [0x84, 0x00, 0x01, 0x02],
    /// );
    /// assert!(MetadataBlock::encode_header(BlockType::Padding, false, 1 << 24).is_err());
    /// ```
    pub fn encode_header(block_type: BlockType, last: bool, size: usize) -> Result<[u8; 4], Error> {
        let header = BlockHeader {
            last,
            block_type,
            size: size.try_into().map_err(|_| Error::ExcessiveBlockSize)?,
        };

        let mut buf = [0; 4];
        BitWriter::endian(buf.as_mut_slice(), BigEndian).build(&header)?;
        Ok(buf)
    }
}

/// Walks the chain of metadata blocks
///
/// The cursor should be positioned just after the `fLaC` tag.
/// Reading stops after the block flagged as last,
/// leaving the cursor at the start of the first frame.
///
/// # Errors
///
/// Returns [`Error::TruncatedStream`] if a block header or payload
/// extends past the end of the buffer.
pub fn read_blocks<'a>(cursor: &mut BitCursor<'a>) -> Result<Vec<MetadataBlock<'a>>, Error> {
    let mut blocks = Vec::new();

    loop {
        let header: BlockHeader = cursor.parse()?;
        let data = cursor.take_bytes(header.size.try_into().map_err(|_| Error::TruncatedStream)?)?;

        log::debug!(
            "{} block of {} bytes{}",
            header.block_type,
            header.size,
            if header.last { " (last)" } else { "" }
        );

        blocks.push(MetadataBlock {
            block_type: header.block_type,
            last: header.last,
            data,
        });

        if header.last {
            break Ok(blocks);
        }
    }
}

/// A decoded metadata block
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Block<'a> {
    /// The STREAMINFO block
    Streaminfo(Streaminfo),
    /// The PADDING block
    Padding(Padding),
    /// The APPLICATION block
    Application(Application<'a>),
    /// The SEEKTABLE block
    SeekTable(SeekTable),
    /// The VORBIS_COMMENT block
    VorbisComment(VorbisComment),
    /// The PICTURE block
    Picture(Picture<'a>),
    /// A block of reserved type, left as raw bytes
    Reserved {
        /// The block's type code
        code: u8,
        /// The block's payload
        data: &'a [u8],
    },
}

impl Block<'_> {
    /// Our block type
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Streaminfo(_) => BlockType::Streaminfo,
            Self::Padding(_) => BlockType::Padding,
            Self::Application(_) => BlockType::Application,
            Self::SeekTable(_) => BlockType::SeekTable,
            Self::VorbisComment(_) => BlockType::VorbisComment,
            Self::Picture(_) => BlockType::Picture,
            Self::Reserved { code, .. } => BlockType::Reserved(*code),
        }
    }
}

/// A STREAMINFO metadata block
///
/// Always exactly 34 bytes. Frame headers fall back on its
/// sample rate and sample size when their own codes are 0.
///
/// | Bits | Field | Notes |
/// |-----:|-------|-------|
/// | 16   | `minimum_block_size` | samples per channel
/// | 16   | `maximum_block_size` | samples per channel
/// | 24   | `minimum_frame_size` | bytes, 0 if unknown
/// | 24   | `maximum_frame_size` | bytes, 0 if unknown
/// | 20   | `sample_rate` | Hz
/// | 3    | `channels` | stored minus 1
/// | 5    | `bits_per_sample` | stored minus 1
/// | 36   | `total_samples` | per channel, 0 if unknown
/// | 128  | `md5` | of the decoded PCM, all 0 if unknown
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_extract::metadata::Streaminfo;
/// use std::num::NonZero;
///
/// let data: &[u8] = &[
///     0x10, 0x00,
///     0x10, 0x00,
///     0x00, 0x00, 0x0c,
///     0x00, 0x00, 0x0c,
///     0b00001010, 0b11000100, 0b0100_000_0, 0b1111_0000,
///     0b00000000, 0b00000000, 0b00000000, 0b01010000,
///     0xf5, 0x3f, 0x86, 0x87, 0x6d, 0xcd, 0x77, 0x83,
///     0x22, 0x5c, 0x93, 0xba, 0x8a, 0x93, 0x8c, 0x7d,
/// ];
///
/// let mut r = BitReader::endian(data, BigEndian);
/// assert_eq!(
///     r.parse::<Streaminfo>().unwrap(),
///     Streaminfo {
///         minimum_block_size: 0x10_00,                    // 4096 samples
///         maximum_block_size: 0x10_00,                    // 4096 samples
///         minimum_frame_size: NonZero::new(0x00_00_0c),   // 12 bytes
///         maximum_frame_size: NonZero::new(0x00_00_0c),   // 12 bytes
///         sample_rate: 0b00001010_11000100_0100,          // 44100 Hz
///         channels: NonZero::new(0b000 + 1).unwrap(),     // 1 channel
///         bits_per_sample: NonZero::new(0b0_1111 + 1).unwrap(), // 16 bps
///         total_samples: NonZero::new(
///             0b0000_00000000_00000000_00000000_01010000  // 80 samples
///         ),
///         md5: Some([
///             0xf5, 0x3f, 0x86, 0x87, 0x6d, 0xcd, 0x77, 0x83,
///             0x22, 0x5c, 0x93, 0xba, 0x8a, 0x93, 0x8c, 0x7d,
///         ]),
///     },
/// );
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Streaminfo {
    /// Smallest block size, not counting the final frame
    pub minimum_block_size: u16,
    /// Largest block size
    pub maximum_block_size: u16,
    /// Smallest frame, in bytes, if known
    pub minimum_frame_size: Option<NonZero<u32>>,
    /// Largest frame, in bytes, if known
    pub maximum_frame_size: Option<NonZero<u32>>,
    /// Samples per second
    pub sample_rate: u32,
    /// Channel count, 1 to 8
    pub channels: NonZero<u8>,
    /// Sample size, 1 to 32 bits
    pub bits_per_sample: NonZero<u8>,
    /// Samples per channel across all frames, if known
    pub total_samples: Option<NonZero<u64>>,
    /// Checksum of the decoded PCM, if one was recorded
    pub md5: Option<[u8; 16]>,
}

impl Streaminfo {
    /// The size of a STREAMINFO payload, in bytes
    pub const SIZE: usize = 34;
}

impl FromBitStream for Streaminfo {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        Ok(Self {
            minimum_block_size: r.read_to()?,
            maximum_block_size: r.read_to()?,
            minimum_frame_size: r.read::<24, _>()?,
            maximum_frame_size: r.read::<24, _>()?,
            sample_rate: r.read::<20, _>()?,
            channels: r.read::<3, _>()?,
            bits_per_sample: r.read::<5, _>()?,
            total_samples: r.read::<36, _>()?,
            md5: r
                .read_to()
                .map(|md5: [u8; 16]| md5.iter().any(|b| *b != 0).then_some(md5))?,
        })
    }
}

/// A PADDING metadata block
///
/// The contents of a PADDING block are ignored,
/// only its length is kept.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Padding {
    /// The size of the padding, in bytes
    pub size: usize,
}

/// An APPLICATION metadata block
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 32   | `id` | registered application ID
/// | rest of block | `data` | application-specific data
///
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Application<'a> {
    /// A registered application ID
    pub id: u32,
    /// Application-specific data
    pub data: &'a [u8],
}

impl<'a> Application<'a> {
    fn decode(data: &'a [u8]) -> Result<Self, Error> {
        match data.split_first_chunk::<4>() {
            Some((id, data)) => Ok(Self {
                id: u32::from_be_bytes(*id),
                data,
            }),
            None => Err(Error::InsufficientApplicationBlock),
        }
    }
}

/// A SEEKTABLE metadata block
///
/// Its seek points occupy the entire block.
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_extract::metadata::{SeekTable, SeekPoint};
///
/// let data: &[u8] = &[
///     // seekpoint 0
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
///     0x00, 0x14,
///     // placeholder
///     0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
///     0x00, 0x00,
/// ];
///
/// let mut r = BitReader::endian(data, BigEndian);
/// let table = r.parse_using::<SeekTable>(data.len()).unwrap();
/// assert_eq!(
///     table.points,
///     vec![
///         SeekPoint {
///             sample_offset: 0x00,
///             byte_offset: 0x00,
///             frame_samples: 0x14,
///         },
///         SeekPoint {
///             sample_offset: SeekPoint::PLACEHOLDER,
///             byte_offset: 0x00,
///             frame_samples: 0x00,
///         },
///     ],
/// );
/// assert!(table.points[1].is_placeholder());
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SeekTable {
    /// The seek table's individual seek points
    pub points: Vec<SeekPoint>,
}

impl FromBitStreamUsing for SeekTable {
    type Context = usize;
    type Error = Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R, size: usize) -> Result<Self, Self::Error> {
        match (size / SeekPoint::SIZE, size % SeekPoint::SIZE) {
            (p, 0) => Ok(Self {
                points: (0..p).map(|_| r.parse()).collect::<Result<_, _>>()?,
            }),
            _ => Err(Error::InvalidSeekTableSize),
        }
    }
}

/// One 18 byte entry of a SEEKTABLE, all fields big-endian
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SeekPoint {
    /// First sample of the frame pointed to,
    /// or [`SeekPoint::PLACEHOLDER`] for an unused slot
    pub sample_offset: u64,
    /// Distance in bytes from [`crate::Flac::frames_offset`]
    /// to that frame's sync code
    pub byte_offset: u64,
    /// Block size of that frame
    pub frame_samples: u16,
}

impl SeekPoint {
    /// The sample offset of a placeholder point
    pub const PLACEHOLDER: u64 = u64::MAX;

    const SIZE: usize = 18;

    /// Whether this is a placeholder point
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.sample_offset == Self::PLACEHOLDER
    }
}

impl FromBitStream for SeekPoint {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        Ok(Self {
            sample_offset: r.read_to()?,
            byte_offset: r.read_to()?,
            frame_samples: r.read_to()?,
        })
    }
}

/// A VORBIS_COMMENT metadata block
///
/// The payload is a length-prefixed vendor string, a field count,
/// then that many length-prefixed `KEY=value` strings.
/// Every length and the count are 32-bit little-endian,
/// the only little-endian integers in a FLAC file.
///
/// Keys are stored upper-cased and matched case-insensitively,
/// values keep their original case.
/// Values for the same key are grouped together in the order
/// the key first appears.
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_extract::metadata::VorbisComment;
///
/// let data: &[u8] = &[
///     0x20, 0x00, 0x00, 0x00,  // 32 byte vendor string
///     0x72, 0x65, 0x66, 0x65, 0x72, 0x65, 0x6e, 0x63,
///     0x65, 0x20, 0x6c, 0x69, 0x62, 0x46, 0x4c, 0x41,
///     0x43, 0x20, 0x31, 0x2e, 0x34, 0x2e, 0x33, 0x20,
///     0x32, 0x30, 0x32, 0x33, 0x30, 0x36, 0x32, 0x33,
///     0x02, 0x00, 0x00, 0x00,  // 2 fields
///     0x0d, 0x00, 0x00, 0x00,  // 13 byte field 1
///     0x74, 0x69, 0x74, 0x6c, 0x65, 0x3d, 0x54, 0x65,  // "title=Testing"
///     0x73, 0x74, 0x69, 0x6e, 0x67,
///     0x10, 0x00, 0x00, 0x00,  // 16 byte field 2
///     0x41, 0x4c, 0x42, 0x55, 0x4d, 0x3d, 0x54, 0x65,  // "ALBUM=Test Album"
///     0x73, 0x74, 0x20, 0x41, 0x6c, 0x62, 0x75, 0x6d,
/// ];
///
/// let comment = BitReader::endian(data, BigEndian).parse::<VorbisComment>().unwrap();
/// assert_eq!(comment.vendor_string, "reference libFLAC 1.4.3 20230623");
/// assert_eq!(comment.field("Title"), Some("Testing"));
/// assert_eq!(comment.field(VorbisComment::ALBUM), Some("Test Album"));
/// assert_eq!(
///     comment.fields().map(|(k, _)| k).collect::<Vec<_>>(),
///     ["TITLE", "ALBUM"],
/// );
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VorbisComment {
    /// The vendor string
    pub vendor_string: String,
    fields: Vec<(String, Vec<String>)>,
}

impl Default for VorbisComment {
    fn default() -> Self {
        Self {
            vendor_string: concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
                .to_owned(),
            fields: vec![],
        }
    }
}

impl VorbisComment {
    /// Track title
    pub const TITLE: &str = "TITLE";

    /// Performer
    pub const ARTIST: &str = "ARTIST";

    /// Album or collection
    pub const ALBUM: &str = "ALBUM";

    /// Speaker layout bits for streams that stray from the default mapping
    pub const CHANNEL_MASK: &str = "WAVEFORMATEXTENSIBLE_CHANNEL_MASK";

    /// Given a field name, returns first matching value, if any
    ///
    /// Fields are matched case-insensitively
    pub fn field(&self, field: &str) -> Option<&str> {
        self.field_values(field).first().map(|s| s.as_str())
    }

    /// Given a field name, returns all matching values
    ///
    /// Fields are matched case-insensitively
    pub fn field_values(&self, field: &str) -> &[String] {
        let field = field.to_uppercase();

        self.fields
            .iter()
            .find(|(key, _)| *key == field)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// Iterates over all upper-cased keys and their values
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// The total number of key-value pairs
    pub fn len(&self) -> usize {
        self.fields.iter().map(|(_, values)| values.len()).sum()
    }

    /// Whether we have no key-value pairs at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Adds new instance of field with the given value
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTagKey`] if the field contains `=`.
    pub fn append_field<S>(&mut self, field: &str, value: S) -> Result<(), Error>
    where
        S: Into<String>,
    {
        if field.contains('=') {
            return Err(Error::InvalidTagKey);
        }

        let field = field.to_uppercase();
        match self.fields.iter_mut().find(|(key, _)| *key == field) {
            Some((_, values)) => values.push(value.into()),
            None => self.fields.push((field, vec![value.into()])),
        }
        Ok(())
    }

    /// Removes any matching instances of the given field
    ///
    /// Fields are matched case-insensitively
    pub fn remove_field(&mut self, field: &str) {
        let field = field.to_uppercase();
        self.fields.retain(|(key, _)| *key != field);
    }

    /// Encodes us as a VORBIS_COMMENT block payload
    ///
    /// This is the exact inverse of decoding,
    /// with each key's values written consecutively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExcessiveBlockSize`] if the payload
    /// is too large for a metadata block.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        w.build(self)?;
        let data = w.into_writer();
        match data.len() <= MAX_BLOCK_SIZE as usize {
            true => Ok(data),
            false => Err(Error::ExcessiveBlockSize),
        }
    }
}

impl FromBitStream for VorbisComment {
    type Error = Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        fn read_string<R: BitRead + ?Sized>(r: &mut R) -> Result<String, Error> {
            let size = r.read_as_to::<LittleEndian, u32>()?;
            Ok(String::from_utf8(
                r.read_to_vec(size.try_into().map_err(|_| Error::TruncatedStream)?)?,
            )?)
        }

        let mut comment = Self {
            vendor_string: read_string(r)?,
            fields: vec![],
        };

        for _ in 0..r.read_as_to::<LittleEndian, u32>()? {
            let field = read_string(r)?;
            let (key, value) = field.split_once('=').ok_or(Error::InvalidVorbisComment)?;
            comment.append_field(key, value)?;
        }

        Ok(comment)
    }
}

impl ToBitStream for VorbisComment {
    type Error = Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        fn write_string<W: BitWrite + ?Sized>(w: &mut W, s: &[u8]) -> Result<(), Error> {
            w.write_as_from::<LittleEndian, u32>(
                s.len().try_into().map_err(|_| Error::ExcessiveBlockSize)?,
            )?;
            w.write_bytes(s)?;
            Ok(())
        }

        write_string(w, self.vendor_string.as_bytes())?;
        w.write_as_from::<LittleEndian, u32>(
            self.len().try_into().map_err(|_| Error::ExcessiveBlockSize)?,
        )?;
        for (key, values) in self.fields.iter() {
            if key.contains('=') {
                return Err(Error::InvalidTagKey);
            }
            for value in values {
                write_string(w, format!("{key}={value}").as_bytes())?;
            }
        }
        Ok(())
    }
}

/// A PICTURE metadata block, holding embedded artwork
///
/// All integers are big-endian, and the two strings
/// are each preceded by their length in bytes.
///
/// | Bits | Field |
/// |-----:|-------|
/// | 32 | `picture_type` |
/// | 32 + string | `media_type`, ASCII |
/// | 32 + string | `description`, UTF-8 |
/// | 32 | `width` |
/// | 32 | `height` |
/// | 32 | `color_depth` |
/// | 32 | `colors_used`, 0 unless indexed |
/// | 32 + bytes | `data` |
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Picture<'a> {
    /// What the image depicts
    pub picture_type: PictureType,
    /// MIME type such as `image/jpeg`, or `-->` when `data` is a URL
    pub media_type: String,
    /// Free-form description
    pub description: String,
    /// Pixels across
    pub width: u32,
    /// Pixels down
    pub height: u32,
    /// Bits per pixel
    pub color_depth: u32,
    /// Palette size of an indexed image
    pub colors_used: Option<NonZero<u32>>,
    /// The encoded image, borrowed from the block
    pub data: &'a [u8],
}

impl<'a> Picture<'a> {
    fn decode(data: &'a [u8]) -> Result<Self, Error> {
        fn prefixed_field<R: BitRead + ?Sized>(r: &mut R) -> Result<String, Error> {
            let size = r.read_to::<u32>()?;
            Ok(String::from_utf8(r.read_to_vec(
                size.try_into().map_err(|_| Error::TruncatedStream)?,
            )?)?)
        }

        let mut r = BitReader::endian(data, BigEndian);
        let picture_type = r.read_to::<u32>()?.into();
        let media_type = prefixed_field(&mut r)?;
        let description = prefixed_field(&mut r)?;
        let width = r.read_to()?;
        let height = r.read_to()?;
        let color_depth = r.read_to()?;
        let colors_used = r.read::<32, _>()?;
        let size: usize = r
            .read_to::<u32>()?
            .try_into()
            .map_err(|_| Error::TruncatedStream)?;

        Ok(Self {
            picture_type,
            media_type,
            description,
            width,
            height,
            color_depth,
            colors_used,
            data: r.into_reader().get(0..size).ok_or(Error::TruncatedStream)?,
        })
    }
}

/// The subject of a PICTURE block, using the ID3v2 APIC codes
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PictureType {
    /// 0
    Other,
    /// 1, a 32×32 PNG icon
    Png32x32,
    /// 2, any other icon
    GeneralFileIcon,
    /// 3
    FrontCover,
    /// 4
    BackCover,
    /// 5
    LinerNotes,
    /// 6, the label on the physical media
    MediaLabel,
    /// 7
    LeadArtist,
    /// 8
    Artist,
    /// 9
    Conductor,
    /// 10
    Band,
    /// 11
    Composer,
    /// 12
    Lyricist,
    /// 13
    RecordingLocation,
    /// 14
    DuringRecording,
    /// 15
    DuringPerformance,
    /// 16, a still from a video
    ScreenCapture,
    /// 17
    Fish,
    /// 18
    Illustration,
    /// 19
    BandLogo,
    /// 20
    PublisherLogo,
    /// Any code above 20
    Reserved(u32),
}

impl PictureType {
    /// Every defined type, indexed by code
    const DEFINED: [Self; 21] = [
        Self::Other,
        Self::Png32x32,
        Self::GeneralFileIcon,
        Self::FrontCover,
        Self::BackCover,
        Self::LinerNotes,
        Self::MediaLabel,
        Self::LeadArtist,
        Self::Artist,
        Self::Conductor,
        Self::Band,
        Self::Composer,
        Self::Lyricist,
        Self::RecordingLocation,
        Self::DuringRecording,
        Self::DuringPerformance,
        Self::ScreenCapture,
        Self::Fish,
        Self::Illustration,
        Self::BandLogo,
        Self::PublisherLogo,
    ];

    /// Our 32-bit type code
    pub fn code(self) -> u32 {
        match self {
            Self::Reserved(code) => code,
            defined => Self::DEFINED
                .iter()
                .position(|t| *t == defined)
                .map_or(0, |i| i as u32),
        }
    }
}

impl From<u32> for PictureType {
    fn from(code: u32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::DEFINED.get(i))
            .copied()
            .unwrap_or(Self::Reserved(code))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lazy_decode() {
        let data: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0xAA, 0xBB];
        let block = MetadataBlock {
            block_type: BlockType::Application,
            last: true,
            data,
        };

        let expected = Block::Application(Application {
            id: 1,
            data: &[0xAA, 0xBB],
        });

        // decoding is repeatable and borrows from the source
        assert_eq!(block.decode().unwrap(), Some(expected.clone()));
        assert_eq!(block.decode().unwrap(), Some(expected));

        assert!(matches!(
            MetadataBlock {
                data: &data[0..3],
                ..block
            }
            .decode(),
            Err(Error::InsufficientApplicationBlock)
        ));
    }

    #[test]
    fn test_unsupported_blocks() {
        let cuesheet = MetadataBlock {
            block_type: BlockType::Cuesheet,
            last: false,
            data: &[0; 12],
        };
        assert_eq!(cuesheet.decode().unwrap(), None);

        let reserved = MetadataBlock {
            block_type: BlockType::from(100),
            last: false,
            data: &[1, 2, 3],
        };
        assert_eq!(reserved.block_type().name(), "RESERVED");
        assert_eq!(
            reserved.decode().unwrap(),
            Some(Block::Reserved {
                code: 100,
                data: &[1, 2, 3]
            })
        );
    }

    #[test]
    fn test_invalid_sizes() {
        let streaminfo = MetadataBlock {
            block_type: BlockType::Streaminfo,
            last: true,
            data: &[0; 33],
        };
        assert!(matches!(
            streaminfo.decode(),
            Err(Error::InvalidStreaminfoSize)
        ));

        let seektable = MetadataBlock {
            block_type: BlockType::SeekTable,
            last: true,
            data: &[0; 19],
        };
        assert!(matches!(
            seektable.decode(),
            Err(Error::InvalidSeekTableSize)
        ));
    }

    #[test]
    fn test_picture() {
        let mut data = vec![];
        let mut w = BitWriter::endian(&mut data, BigEndian);
        w.write_from::<u32>(3).unwrap();
        w.write_from::<u32>(9).unwrap();
        w.write_bytes(b"image/png").unwrap();
        w.write_from::<u32>(5).unwrap();
        w.write_bytes(b"cover").unwrap();
        w.write_from::<u32>(16).unwrap();
        w.write_from::<u32>(9).unwrap();
        w.write_from::<u32>(24).unwrap();
        w.write_from::<u32>(0).unwrap();
        w.write_from::<u32>(4).unwrap();
        w.write_bytes(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

        let block = MetadataBlock {
            block_type: BlockType::Picture,
            last: true,
            data: &data,
        };

        assert_eq!(
            block.decode().unwrap(),
            Some(Block::Picture(Picture {
                picture_type: PictureType::FrontCover,
                media_type: "image/png".to_owned(),
                description: "cover".to_owned(),
                width: 16,
                height: 9,
                color_depth: 24,
                colors_used: None,
                data: &[0x89, 0x50, 0x4e, 0x47],
            }))
        );

        // image data cut short
        let block = MetadataBlock {
            data: &data[0..data.len() - 1],
            ..block
        };
        assert!(matches!(block.decode(), Err(Error::TruncatedStream)));
    }

    #[test]
    fn test_picture_type_codes() {
        for code in 0u32..=22 {
            assert_eq!(PictureType::from(code).code(), code);
        }
        assert_eq!(PictureType::from(3), PictureType::FrontCover);
        assert_eq!(PictureType::from(20), PictureType::PublisherLogo);
        assert_eq!(PictureType::from(21), PictureType::Reserved(21));
    }

    #[test]
    fn test_vorbis_comment_fields() {
        let mut comment = VorbisComment::default();
        comment.append_field("artist", "Someone").unwrap();
        comment.append_field(VorbisComment::TITLE, "First").unwrap();
        comment.append_field("Artist", "Someone Else").unwrap();
        assert!(matches!(
            comment.append_field("BAD=KEY", "value"),
            Err(Error::InvalidTagKey)
        ));

        assert_eq!(comment.len(), 3);
        assert_eq!(comment.field("ARTIST"), Some("Someone"));
        assert_eq!(comment.field_values("artist"), ["Someone", "Someone Else"]);
        assert_eq!(comment.field("album"), None);

        comment.remove_field("aRtIsT");
        assert_eq!(comment.field("artist"), None);
        assert_eq!(comment.len(), 1);
    }

    #[test]
    fn test_vorbis_comment_missing_separator() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x00, // empty vendor string
            0x01, 0x00, 0x00, 0x00, // 1 field
            0x05, 0x00, 0x00, 0x00, // 5 byte field
            b'T', b'I', b'T', b'L', b'E',
        ];

        assert!(matches!(
            BitReader::endian(data, BigEndian).parse::<VorbisComment>(),
            Err(Error::InvalidVorbisComment)
        ));
    }
}
