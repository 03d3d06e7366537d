//! Gray code pattern decoder.

use super::capture::CaptureSet;
use super::gray_code::{gray_to_binary, Axis, PatternConfig};
use super::mask::Mask;
use crate::error::{CalibrationError, Result};
use bytemuck::{Pod, Zeroable};
use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decoded projector pixel, stored as a 2-channel unsigned pair.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ProjectorCoord {
    pub x: u16,
    pub y: u16,
}

/// How the illumination mask affects the decoded map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskPolicy {
    /// Decode and keep every pixel; the mask is not consulted.
    #[default]
    Ignore,
    /// Decode every pixel, but mark pixels outside the mask invalid.
    Flag,
    /// Pixels outside the mask are written as (0, 0) and marked invalid.
    Suppress,
}

/// Per-camera-pixel projector coordinates produced by one decode pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondenceMap {
    pub camera_width: u32,
    pub camera_height: u32,
    pub projector_width: u32,
    pub projector_height: u32,
    /// Decoded projector coordinate per camera pixel, row-major.
    pub coords: Vec<ProjectorCoord>,
    /// False where the mask policy or an out-of-range code rejected the pixel.
    pub valid: Vec<bool>,
}

impl CorrespondenceMap {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.camera_width && y < self.camera_height)
            .then(|| (y as usize) * (self.camera_width as usize) + x as usize)
    }

    /// Decoded coordinate at camera pixel (x, y), regardless of validity.
    pub fn get(&self, x: u32, y: u32) -> Option<ProjectorCoord> {
        self.index(x, y).and_then(|i| self.coords.get(i).copied())
    }

    /// Decoded coordinate at camera pixel (x, y) if it is valid.
    pub fn get_valid(&self, x: u32, y: u32) -> Option<ProjectorCoord> {
        self.index(x, y)
            .filter(|&i| self.valid.get(i).copied().unwrap_or(false))
            .and_then(|i| self.coords.get(i).copied())
    }

    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        self.index(x, y)
            .is_some_and(|i| self.valid.get(i).copied().unwrap_or(false))
    }

    /// Count valid correspondences.
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Bilinearly interpolated projector coordinate at a sub-pixel camera position.
    ///
    /// Returns `None` outside the image or when any of the four neighbours is invalid.
    pub fn sample(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if self.camera_width == 0 || self.camera_height == 0 {
            return None;
        }
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let max_x = (self.camera_width - 1) as f32;
        let max_y = (self.camera_height - 1) as f32;
        if x > max_x || y > max_y {
            return None;
        }

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.camera_width - 1);
        let y1 = (y0 + 1).min(self.camera_height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let c00 = self.get_valid(x0, y0)?;
        let c10 = self.get_valid(x1, y0)?;
        let c01 = self.get_valid(x0, y1)?;
        let c11 = self.get_valid(x1, y1)?;

        let lerp = |a: u16, b: u16, c: u16, d: u16| {
            let top = f32::from(a) * (1.0 - fx) + f32::from(b) * fx;
            let bottom = f32::from(c) * (1.0 - fx) + f32::from(d) * fx;
            top * (1.0 - fy) + bottom * fy
        };

        Some((
            lerp(c00.x, c10.x, c01.x, c11.x),
            lerp(c00.y, c10.y, c01.y, c11.y),
        ))
    }

    /// Map sub-pixel camera points (e.g. detected chessboard corners) to projector space.
    pub fn map_points(&self, points: &[(f32, f32)]) -> Vec<Option<(f32, f32)>> {
        points.iter().map(|&(x, y)| self.sample(x, y)).collect()
    }

    /// Split into separate X and Y floating-point maps.
    pub fn to_float_maps(&self) -> (Vec<f32>, Vec<f32>) {
        self.coords
            .iter()
            .map(|c| (f32::from(c.x), f32::from(c.y)))
            .unzip()
    }
}

/// Raw intensity slices for one axis, gathered once per decode pass.
struct AxisFrames<'a> {
    positive: Vec<&'a [u8]>,
    negative: Vec<&'a [u8]>,
    length: u32,
}

impl<'a> AxisFrames<'a> {
    fn new(positive: &'a [GrayImage], negative: &'a [GrayImage], length: u32) -> Self {
        Self {
            positive: positive.iter().map(|f| f.as_raw().as_slice()).collect(),
            negative: negative.iter().map(|f| f.as_raw().as_slice()).collect(),
            length,
        }
    }

    /// Decode one pixel; returns the index clamped into range and whether it was in range.
    fn decode(&self, index: usize) -> (u16, bool) {
        let bits = self.positive.len();
        let mut gray: u32 = 0;

        for (k, (positive, negative)) in self.positive.iter().zip(&self.negative).enumerate() {
            // Strict comparison: a zero difference decodes as 0. Kept as-is; the
            // bias toward 0 on ties has no known justification.
            let diff = i16::from(positive[index]) - i16::from(negative[index]);
            if diff > 0 {
                gray |= 1 << (bits - 1 - k);
            }
        }

        let binary = gray_to_binary(gray);
        if binary < self.length {
            (binary as u16, true)
        } else {
            ((self.length - 1) as u16, false)
        }
    }
}

/// Decode a capture set into a camera-resolution correspondence map.
///
/// Every camera pixel is decoded independently, in parallel over rows. With
/// [`MaskPolicy::Ignore`] or no mask every pixel yields a coordinate; a pixel is
/// only marked invalid when its code falls outside the projector resolution.
pub fn decode(
    config: &PatternConfig,
    captures: &CaptureSet,
    mask: Option<&Mask>,
    policy: MaskPolicy,
) -> Result<CorrespondenceMap> {
    let (camera_width, camera_height) = captures.dimensions();
    if camera_width == 0 || camera_height == 0 {
        return Err(CalibrationError::ZeroResolution {
            what: "camera",
            width: camera_width,
            height: camera_height,
        });
    }

    for axis in [Axis::Column, Axis::Row] {
        let (positive, negative) = captures.axis(axis);
        let expected = config.bits(axis) as usize;
        if positive.len() != expected || negative.len() != expected {
            return Err(CalibrationError::CaptureCount {
                expected: config.total_frames(),
                actual: captures.column_positive.len()
                    + captures.column_negative.len()
                    + captures.row_positive.len()
                    + captures.row_negative.len(),
            });
        }
    }

    // Capture set fields are public, so sizes may have changed since `load`.
    let column_frames = captures.column_positive.len() * 2;
    let frame_lists = [
        (0, &captures.column_positive),
        (1, &captures.column_negative),
        (column_frames, &captures.row_positive),
        (column_frames + 1, &captures.row_negative),
    ];
    for (offset, frames) in frame_lists {
        for (k, frame) in frames.iter().enumerate() {
            if frame.dimensions() != (camera_width, camera_height) {
                return Err(CalibrationError::FrameSize {
                    index: offset + 2 * k,
                    expected: (camera_width, camera_height),
                    actual: frame.dimensions(),
                });
            }
        }
    }

    let mask = match (policy, mask) {
        (MaskPolicy::Ignore, _) => None,
        (_, Some(mask)) => {
            let pixels = (camera_width as usize) * (camera_height as usize);
            if mask.dimensions() != (camera_width, camera_height) || mask.data.len() != pixels {
                return Err(CalibrationError::MaskSize {
                    expected: (camera_width, camera_height),
                    actual: mask.dimensions(),
                });
            }
            Some(mask.data.as_slice())
        }
        (_, None) => {
            log::warn!("Mask policy {:?} requested without a mask; no pixels gated", policy);
            None
        }
    };

    let columns = AxisFrames::new(
        &captures.column_positive,
        &captures.column_negative,
        config.projector_width,
    );
    let rows = AxisFrames::new(
        &captures.row_positive,
        &captures.row_negative,
        config.projector_height,
    );

    log::info!(
        "Decoding {}x{} camera pixels ({} column bits, {} row bits, mask {:?})",
        camera_width,
        camera_height,
        config.column_bits,
        config.row_bits,
        policy
    );

    let width = camera_width as usize;
    let pixel_count = width * camera_height as usize;
    let mut coords = vec![ProjectorCoord::default(); pixel_count];
    let mut valid = vec![false; pixel_count];

    let out_of_range: usize = coords
        .par_chunks_mut(width)
        .zip(valid.par_chunks_mut(width))
        .enumerate()
        .map(|(y, (coord_row, valid_row))| {
            let mut rejected = 0;
            for (x, (coord, is_valid)) in coord_row.iter_mut().zip(valid_row.iter_mut()).enumerate() {
                let index = y * width + x;
                let in_mask = mask.map_or(true, |m| m[index] != 0);

                if !in_mask && policy == MaskPolicy::Suppress {
                    *coord = ProjectorCoord::default();
                    *is_valid = false;
                    continue;
                }

                let (px, x_ok) = columns.decode(index);
                let (py, y_ok) = rows.decode(index);
                if !(x_ok && y_ok) {
                    rejected += 1;
                }

                *coord = ProjectorCoord { x: px, y: py };
                *is_valid = x_ok && y_ok && in_mask;
            }
            rejected
        })
        .sum();

    if out_of_range > 0 {
        log::warn!(
            "{} pixels decoded outside the {}x{} projector and were clamped",
            out_of_range,
            config.projector_width,
            config.projector_height
        );
    }

    let map = CorrespondenceMap {
        camera_width,
        camera_height,
        projector_width: config.projector_width,
        projector_height: config.projector_height,
        coords,
        valid,
    };
    log::info!("Decoded {} valid correspondences", map.valid_count());

    Ok(map)
}
