// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For reconstructing FLAC frames to PCM samples
//!
//! Reconstruction happens on demand, one frame at a time,
//! since every frame's subframes are independent of
//! any other frame once the frame boundaries are known.

use crate::audio::Samples;
use crate::stream::{ChannelAssignment, Frame};
use crate::subframe::Subframe;
use crate::{Error, Flac};

/// Coefficients of each fixed predictor order, most recent sample's first
const FIXED_COEFFICIENTS: [&[i64]; 5] = [&[], &[1], &[2, -1], &[3, -3, 1], &[4, -6, 4, -1]];

impl Subframe {
    /// Reconstructs a block of samples, with wasted bits restored
    ///
    /// # Errors
    ///
    /// Returns [`Error::SampleOverflow`] if a prediction
    /// no longer fits in 64 bits.
    ///
    /// # Example
    /// ```
    /// use flac_extract::subframe::Subframe;
    ///
    /// let subframe = Subframe::Fixed {
    ///     order: 2,
    ///     warm_up: vec![1, 2],
    ///     residual: vec![0, 0, 1],
    ///     wasted_bits: 1,
    /// };
    /// assert_eq!(subframe.reconstruct(5).unwrap(), [2, 4, 6, 8, 12]);
    /// ```
    pub fn reconstruct(&self, block_size: usize) -> Result<Vec<i64>, Error> {
        let (samples, wasted_bits) = match self {
            Self::Constant {
                sample,
                wasted_bits,
            } => return Ok(vec![sample << wasted_bits; block_size]),
            Self::Verbatim {
                samples,
                wasted_bits,
            } => return Ok(samples.iter().map(|s| s << wasted_bits).collect()),
            Self::Fixed {
                order,
                warm_up,
                residual,
                wasted_bits,
            } => (
                predict(
                    warm_up,
                    FIXED_COEFFICIENTS[usize::from(*order)],
                    0,
                    residual,
                )?,
                *wasted_bits,
            ),
            Self::Lpc {
                warm_up,
                shift,
                coefficients,
                residual,
                wasted_bits,
                ..
            } => (
                predict(warm_up, coefficients, *shift, residual)?,
                *wasted_bits,
            ),
        };

        Ok(match wasted_bits {
            0 => samples,
            w => samples.into_iter().map(|s| s << w).collect(),
        })
    }
}

/// Runs a linear predictor over the residuals
///
/// Each sample is the sum of coefficients times the most recent samples,
/// shifted right, plus the next residual.
fn predict(
    warm_up: &[i64],
    coefficients: &[i64],
    shift: u32,
    residual: &[i32],
) -> Result<Vec<i64>, Error> {
    let mut samples = Vec::with_capacity(warm_up.len() + residual.len());
    samples.extend_from_slice(warm_up);

    for r in residual {
        let prediction = coefficients
            .iter()
            .zip(samples.iter().rev())
            .try_fold(0i64, |sum, (c, s)| {
                c.checked_mul(*s).and_then(|p| sum.checked_add(p))
            })
            .ok_or(Error::SampleOverflow)?;

        samples.push(
            (prediction >> shift)
                .checked_add(i64::from(*r))
                .ok_or(Error::SampleOverflow)?,
        );
    }

    Ok(samples)
}

/// Combines two channels sample-by-sample
fn combine(
    x: &[i64],
    y: &[i64],
    f: impl Fn(i64, i64) -> Option<i64>,
) -> Result<Vec<i64>, Error> {
    x.iter()
        .zip(y)
        .map(|(x, y)| f(*x, *y).ok_or(Error::SampleOverflow))
        .collect()
}

impl Frame<'_> {
    /// Reconstructs one `Vec` of samples per output channel
    ///
    /// Stereo frames stored as left-side, side-right or mid-side
    /// are decorrelated back to left and right channels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SampleOverflow`] if any sample
    /// does not fit in 32 bits.
    pub fn decode(&self) -> Result<Vec<Vec<i32>>, Error> {
        let block_size = self.header.block_size as usize;

        let mut channels = self
            .subframes()
            .iter()
            .map(|s| s.reconstruct(block_size))
            .collect::<Result<Vec<_>, _>>()?;

        match self.header.channel_assignment {
            ChannelAssignment::Independent(_) => { /* nothing to do */ }
            ChannelAssignment::LeftSide => {
                channels[1] = combine(&channels[0], &channels[1], i64::checked_sub)?;
            }
            ChannelAssignment::SideRight => {
                channels[0] = combine(&channels[1], &channels[0], i64::checked_add)?;
            }
            ChannelAssignment::MidSide => {
                let right = combine(&channels[0], &channels[1], |mid, side| {
                    mid.checked_sub(side >> 1)
                })?;
                channels[0] = combine(&right, &channels[1], i64::checked_add)?;
                channels[1] = right;
            }
        }

        channels
            .into_iter()
            .map(|channel| {
                channel
                    .into_iter()
                    .map(|s| i32::try_from(s).map_err(|_| Error::SampleOverflow))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }

    /// Reconstructs the frame's samples for PCM output
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be decoded.
    pub fn samples(&self) -> Result<Samples, Error> {
        Ok(Samples::new(self.decode()?, self.header.bits_per_sample))
    }
}

impl Flac<'_> {
    /// Reconstructs every extracted frame, in order
    ///
    /// Returns nothing if frames were not extracted.
    ///
    /// # Errors
    ///
    /// Returns the first error of any frame.
    #[cfg(not(feature = "rayon"))]
    pub fn decode_all(&self) -> Result<Vec<Samples>, Error> {
        self.frames()
            .unwrap_or_default()
            .iter()
            .map(Frame::samples)
            .collect()
    }

    /// Reconstructs every extracted frame, in order
    ///
    /// Returns nothing if frames were not extracted.
    /// Frames are reconstructed in parallel.
    ///
    /// # Errors
    ///
    /// Returns an error of any frame.
    #[cfg(feature = "rayon")]
    pub fn decode_all(&self) -> Result<Vec<Samples>, Error> {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        self.frames()
            .unwrap_or_default()
            .par_iter()
            .map(Frame::samples)
            .collect()
    }
}

/// The result of a FLAC file verification
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verified {
    /// All frames decode and the stream's MD5 matches
    MD5Match,
    /// All frames decode, but the stream's MD5 does not match
    MD5Mismatch,
    /// All frames decode, but the stream has no MD5 to check
    NoMD5,
}

/// Verifies a whole FLAC file
///
/// Every frame's CRC-8 and CRC-16 are checked,
/// every frame is decoded and the decoded samples
/// are checked against the MD5 sum in STREAMINFO, if any.
///
/// # Errors
///
/// Returns any error from extracting or decoding the file.
pub fn verify(data: &[u8]) -> Result<Verified, Error> {
    use bitstream_io::LittleEndian;

    let flac = crate::extract(data, crate::Options::default().frames(true).verify_crc(true))?;

    let Some(md5) = flac.streaminfo()?.and_then(|s| s.md5) else {
        // still decode everything so errors are reported
        flac.decode_all()?;
        return Ok(Verified::NoMD5);
    };

    let mut context = md5::Context::new();
    for samples in flac.decode_all()? {
        samples.write::<LittleEndian, _>(&mut context)?;
    }

    Ok(match context.compute().0 == md5 {
        true => Verified::MD5Match,
        false => Verified::MD5Mismatch,
    })
}
