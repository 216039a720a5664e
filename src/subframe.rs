// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For reading FLAC subframes and their residuals
//!
//! | Bits | Field | Meaning |
//! |-----:|------:|---------|
//! | 1    | padding | always 0
//! | 6    | type | subframe type code
//! | 1    | wasted bits flag | whether wasted bits follow
//! | unary | wasted bits | wasted bits count (-1), if flagged
//! | | subframe data | depends on type
//!
//! | Type Code | Subframe |
//! |----------:|----------|
//! | 0 | CONSTANT |
//! | 1 | VERBATIM |
//! | 8 to 12 | FIXED, order 0 to 4 |
//! | 32 to 63 | LPC, order 1 to 32 |

use crate::cursor::BitCursor;
use crate::{CodeField, Error};

/// A single channel's subframe, before reconstruction
///
/// Samples are stored without their wasted bits,
/// which are restored during reconstruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Subframe {
    /// A single sample repeated for the whole block
    Constant {
        /// The repeated sample
        sample: i64,
        /// Low zero bits removed from every sample
        wasted_bits: u32,
    },
    /// Every sample stored as-is
    Verbatim {
        /// The stored samples
        samples: Vec<i64>,
        /// Low zero bits removed from every sample
        wasted_bits: u32,
    },
    /// Samples predicted by a fixed polynomial
    Fixed {
        /// Predictor order, from 0 to 4
        order: u8,
        /// The first `order` samples
        warm_up: Vec<i64>,
        /// Prediction errors for the remaining samples
        residual: Vec<i32>,
        /// Low zero bits removed from every sample
        wasted_bits: u32,
    },
    /// Samples predicted by quantized linear prediction coefficients
    Lpc {
        /// Predictor order, from 1 to 32
        order: u8,
        /// The first `order` samples
        warm_up: Vec<i64>,
        /// Coefficient precision in bits
        precision: u32,
        /// Right shift applied to each prediction
        shift: u32,
        /// Coefficients, most recent sample's first
        coefficients: Vec<i64>,
        /// Prediction errors for the remaining samples
        residual: Vec<i32>,
        /// Low zero bits removed from every sample
        wasted_bits: u32,
    },
}

impl Subframe {
    /// Reads a subframe from the cursor's current position
    ///
    /// `bits_per_sample` is the channel's sample size,
    /// which is one bit larger for side channels.
    ///
    /// # Errors
    ///
    /// Returns an error if the subframe is malformed or truncated.
    pub fn read(
        cursor: &mut BitCursor<'_>,
        bits_per_sample: u32,
        block_size: u32,
    ) -> Result<Self, Error> {
        if cursor.read_bit()? {
            return Err(Error::InvalidSubframeHeader);
        }
        let type_code = cursor.read_bits(6)?;
        let wasted_bits = match cursor.read_bit()? {
            false => 0,
            true => cursor.read_unary()? + 1,
        };
        if wasted_bits >= bits_per_sample {
            return Err(Error::ExcessiveWastedBits);
        }
        let bits = bits_per_sample - wasted_bits;

        match type_code {
            0 => Ok(Self::Constant {
                sample: cursor.read_signed(bits)?,
                wasted_bits,
            }),
            1 => Ok(Self::Verbatim {
                samples: (0..block_size)
                    .map(|_| cursor.read_signed(bits))
                    .collect::<Result<_, _>>()?,
                wasted_bits,
            }),
            8..=12 => {
                let order = type_code - 8;
                let warm_up = read_warm_up(cursor, bits, order, block_size)?;

                Ok(Self::Fixed {
                    order: order as u8,
                    warm_up,
                    residual: read_residual(cursor, block_size, order)?,
                    wasted_bits,
                })
            }
            32..=63 => {
                let order = type_code - 31;
                let warm_up = read_warm_up(cursor, bits, order, block_size)?;
                let precision = match cursor.read_bits(4)? {
                    0b1111 => return Err(Error::InvalidCoefficientPrecision),
                    p => p + 1,
                };
                let shift = u32::try_from(cursor.read_signed(5)?)
                    .map_err(|_| Error::NegativeLpcShift)?;
                let coefficients = (0..order)
                    .map(|_| cursor.read_signed(precision))
                    .collect::<Result<_, _>>()?;

                Ok(Self::Lpc {
                    order: order as u8,
                    warm_up,
                    precision,
                    shift,
                    coefficients,
                    residual: read_residual(cursor, block_size, order)?,
                    wasted_bits,
                })
            }
            _ => Err(Error::InvalidCode(CodeField::SubframeType)),
        }
    }

    /// Low zero bits removed from every sample
    pub fn wasted_bits(&self) -> u32 {
        match self {
            Self::Constant { wasted_bits, .. }
            | Self::Verbatim { wasted_bits, .. }
            | Self::Fixed { wasted_bits, .. }
            | Self::Lpc { wasted_bits, .. } => *wasted_bits,
        }
    }
}

fn read_warm_up(
    cursor: &mut BitCursor<'_>,
    bits: u32,
    order: u32,
    block_size: u32,
) -> Result<Vec<i64>, Error> {
    if order > block_size {
        return Err(Error::InvalidPredictorOrder);
    }
    (0..order).map(|_| cursor.read_signed(bits)).collect()
}

/// Reads `block_size - order` residuals split across partitions
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 2    | coding method | 4 or 5 bit Rice parameters
/// | 4    | partition order | 2ⁿ partitions
/// | | partition₀ | `block_size / 2ⁿ - order` residuals
/// | | partition₁ | `block_size / 2ⁿ` residuals
/// | | | ⋮
fn read_residual(cursor: &mut BitCursor<'_>, block_size: u32, order: u32) -> Result<Vec<i32>, Error> {
    let (parameter_bits, escape) = match cursor.read_bits(2)? {
        0 => (4, 0b1111),
        1 => (5, 0b11111),
        _ => return Err(Error::InvalidCode(CodeField::ResidualCoding)),
    };
    let partition_order = cursor.read_bits(4)?;

    if block_size % (1 << partition_order) != 0 {
        return Err(Error::PartitionAlignment);
    }
    let partition_len = block_size >> partition_order;
    let first_len = partition_len
        .checked_sub(order)
        .ok_or(Error::PartitionAlignment)?;

    let mut residual: Vec<i32> = Vec::with_capacity((block_size - order) as usize);

    for len in std::iter::once(first_len)
        .chain(std::iter::repeat_n(partition_len, (1 << partition_order) - 1))
    {
        match cursor.read_bits(parameter_bits)? {
            p if p == escape => {
                let width = cursor.read_bits(5)?;
                for _ in 0..len {
                    residual.push(
                        cursor
                            .read_signed(width)?
                            .try_into()
                            .map_err(|_| Error::ResidualOverflow)?,
                    );
                }
            }
            parameter => {
                for _ in 0..len {
                    residual.push(read_rice(cursor, parameter)?);
                }
            }
        }
    }

    Ok(residual)
}

/// Reads a single Rice-coded residual
fn read_rice(cursor: &mut BitCursor<'_>, parameter: u32) -> Result<i32, Error> {
    let msb = u64::from(cursor.read_unary()?);
    let lsb = u64::from(cursor.read_bits(parameter)?);
    let unsigned = (msb << parameter) | lsb;
    let signed = ((unsigned >> 1) as i64) ^ -((unsigned & 1) as i64);
    signed.try_into().map_err(|_| Error::ResidualOverflow)
}
