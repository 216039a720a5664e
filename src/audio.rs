// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a frame's decoded PCM samples

use bitstream_io::{BitWrite, BitWriter, Endianness};

/// A frame's worth of decoded samples
///
/// # Example
/// ```
/// use flac_extract::audio::Samples;
/// use bitstream_io::{BigEndian, LittleEndian};
///
/// let samples = Samples::new(vec![vec![1, -2], vec![3, -4]], 16);
/// assert_eq!(samples.iter().collect::<Vec<_>>(), [1, 3, -2, -4]);
///
/// let mut buf = vec![0; samples.bytes_len()];
/// samples.to_buf::<LittleEndian>(&mut buf).unwrap();
/// assert_eq!(buf, [1, 0, 3, 0, 0xFE, 0xFF, 0xFC, 0xFF]);
///
/// samples.to_buf::<BigEndian>(&mut buf).unwrap();
/// assert_eq!(buf, [0, 1, 0, 3, 0xFF, 0xFE, 0xFF, 0xFC]);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Samples {
    // all samples, stacked by channel
    samples: Vec<i32>,

    // total number of channels
    channels: usize,

    // total length of each channel in samples
    channel_len: usize,

    // bits-per-sample
    bits_per_sample: u32,
}

impl Samples {
    /// Builds samples from a list of equal-length channels
    pub fn new(channels: Vec<Vec<i32>>, bits_per_sample: u32) -> Self {
        Self {
            channel_len: channels.first().map(|c| c.len()).unwrap_or(0),
            channels: channels.len(),
            samples: channels.into_iter().flatten().collect(),
            bits_per_sample,
        }
    }

    /// Returns PCM frame count
    #[inline]
    pub fn pcm_frames(&self) -> usize {
        self.channel_len
    }

    /// Returns number of channels
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Returns bits-per-sample
    #[inline]
    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    /// Returns bytes-per-sample
    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample.div_ceil(8) as usize
    }

    /// Returns total length of buffer in bytes
    #[inline]
    pub fn bytes_len(&self) -> usize {
        self.bytes_per_sample() * self.samples.len()
    }

    /// Iterates over all channels
    #[inline]
    pub fn channels(&self) -> impl Iterator<Item = &[i32]> {
        self.samples.chunks_exact(self.channel_len.max(1))
    }

    /// Iterates over any samples in interleaved order
    pub fn iter(&self) -> impl Iterator<Item = i32> {
        (0..self.samples.len()).map(|i| {
            let (sample, channel) = (i / self.channels, i % self.channels);
            self.samples[channel * self.channel_len + sample]
        })
    }

    /// Writes interleaved samples in the given endianness
    ///
    /// Each sample takes the smallest whole number of bytes
    /// which holds [`Samples::bits_per_sample`].
    ///
    /// # Errors
    ///
    /// Passes along any error from the writer.
    pub fn write<E: Endianness, W: std::io::Write>(&self, writer: W) -> std::io::Result<()> {
        let bits = self.bytes_per_sample() as u32 * 8;
        let mut w: BitWriter<W, E> = BitWriter::new(writer);
        self.iter().try_for_each(|sample| w.write_signed_var(bits, sample))
    }

    /// Fills buffer with interleaved samples in the given endianness
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is smaller than [`Samples::bytes_len`].
    pub fn to_buf<E: Endianness>(&self, buf: &mut [u8]) -> std::io::Result<()> {
        self.write::<E, _>(buf)
    }
}
