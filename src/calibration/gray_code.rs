//! Gray code bit math and per-axis bit-plane pattern lists.

use crate::error::{CalibrationError, Result};
use serde::{Deserialize, Serialize};

/// Largest projector axis length whose indices still fit a `u16` coordinate.
pub const MAX_AXIS_LENGTH: u32 = 1 << 16;

/// Projector axis encoded by a set of stripe patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Vertical stripes, decode the projector column (X).
    Column,
    /// Horizontal stripes, decode the projector row (Y).
    Row,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Column => write!(f, "column"),
            Axis::Row => write!(f, "row"),
        }
    }
}

/// Convert binary value to reflected Gray code.
pub fn binary_to_gray(binary: u32) -> u32 {
    binary ^ (binary >> 1)
}

/// Convert Gray code back to binary.
pub fn gray_to_binary(gray: u32) -> u32 {
    let mut binary = gray;
    let mut mask = gray >> 1;
    while mask != 0 {
        binary ^= mask;
        mask >>= 1;
    }
    binary
}

/// Number of bit-planes needed to address `length` positions, i.e. the
/// smallest `b` with `2^b >= length`.
///
/// Counted by shifting `length - 1` down to zero so exact powers of two
/// don't pick up an extra plane.
pub fn bit_plane_count(length: u32) -> u32 {
    let mut bits = 0;
    let mut remaining = length.saturating_sub(1);
    while remaining > 0 {
        remaining >>= 1;
        bits += 1;
    }
    bits
}

/// Bit-planes for one projector axis.
///
/// Plane `j` (0 = most significant) holds, for every position `p`, bit
/// `bits - 1 - j` of `binary_to_gray(p)`.
#[derive(Debug, Clone)]
pub struct PatternList {
    axis: Axis,
    length: u32,
    planes: Vec<Vec<u8>>,
}

impl PatternList {
    pub fn new(axis: Axis, length: u32) -> Self {
        let bits = bit_plane_count(length);
        let planes = (0..bits)
            .map(|plane| {
                let shift = bits - 1 - plane;
                (0..length)
                    .map(|p| ((binary_to_gray(p) >> shift) & 1) as u8)
                    .collect()
            })
            .collect();

        Self {
            axis,
            length,
            planes,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Number of positions along the axis.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Number of bit-planes (may be zero for a one-pixel axis).
    pub fn bits(&self) -> u32 {
        self.planes.len() as u32
    }

    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index).map(Vec::as_slice)
    }

    /// Reassemble the Gray code stored at `position`, MSB-first.
    pub fn gray_code_at(&self, position: u32) -> Option<u32> {
        if position >= self.length {
            return None;
        }
        let p = position as usize;
        Some(
            self.planes
                .iter()
                .fold(0u32, |code, plane| (code << 1) | u32::from(plane[p])),
        )
    }
}

/// A single pattern in the projection sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSpec {
    /// Axis the stripes encode.
    pub axis: Axis,
    /// Bit-plane index, 0 = most significant.
    pub bit_index: u32,
    /// Whether this is the photometric negative.
    pub inverted: bool,
}

/// Projector resolution and the bit-plane counts derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternConfig {
    pub projector_width: u32,
    pub projector_height: u32,
    /// Bit-planes for the column (X) axis.
    pub column_bits: u32,
    /// Bit-planes for the row (Y) axis.
    pub row_bits: u32,
}

impl PatternConfig {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CalibrationError::ZeroResolution {
                what: "projector",
                width,
                height,
            });
        }
        if width > MAX_AXIS_LENGTH {
            return Err(CalibrationError::ResolutionTooLarge {
                axis: Axis::Column,
                length: width,
            });
        }
        if height > MAX_AXIS_LENGTH {
            return Err(CalibrationError::ResolutionTooLarge {
                axis: Axis::Row,
                length: height,
            });
        }

        Ok(Self {
            projector_width: width,
            projector_height: height,
            column_bits: bit_plane_count(width),
            row_bits: bit_plane_count(height),
        })
    }

    pub fn bits(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Column => self.column_bits,
            Axis::Row => self.row_bits,
        }
    }

    /// Total captured frames needed: a positive and a negative per bit-plane.
    pub fn total_frames(&self) -> usize {
        ((self.column_bits + self.row_bits) * 2) as usize
    }

    /// The projection order: column planes first, then row planes, each
    /// plane as (positive, negative).
    pub fn pattern_sequence(&self) -> Vec<PatternSpec> {
        let mut patterns = Vec::with_capacity(self.total_frames());

        for axis in [Axis::Column, Axis::Row] {
            for bit_index in 0..self.bits(axis) {
                for inverted in [false, true] {
                    patterns.push(PatternSpec {
                        axis,
                        bit_index,
                        inverted,
                    });
                }
            }
        }

        patterns
    }
}
