//! Organizes an ordered list of captured frames into per-axis positive/negative sets.

use super::gray_code::{Axis, PatternConfig};
use crate::error::{CalibrationError, Result};
use image::{DynamicImage, GrayImage};
use rayon::prelude::*;

/// Captured frames for one decode pass, already reduced to single-channel intensity.
///
/// Replaced wholesale on every decode cycle.
#[derive(Debug, Clone)]
pub struct CaptureSet {
    pub camera_width: u32,
    pub camera_height: u32,
    pub column_positive: Vec<GrayImage>,
    pub column_negative: Vec<GrayImage>,
    pub row_positive: Vec<GrayImage>,
    pub row_negative: Vec<GrayImage>,
}

impl CaptureSet {
    /// Split `frames` into the four parallel sequences.
    ///
    /// Expected order: for each column bit-plane (positive, negative), then the
    /// same for each row bit-plane. Length and every frame's size are checked
    /// before anything is indexed.
    pub fn load(
        config: &PatternConfig,
        camera_size: (u32, u32),
        frames: &[DynamicImage],
    ) -> Result<Self> {
        let (camera_width, camera_height) = camera_size;
        if camera_width == 0 || camera_height == 0 {
            return Err(CalibrationError::ZeroResolution {
                what: "camera",
                width: camera_width,
                height: camera_height,
            });
        }

        let expected = config.total_frames();
        if frames.len() != expected {
            return Err(CalibrationError::CaptureCount {
                expected,
                actual: frames.len(),
            });
        }

        for (index, frame) in frames.iter().enumerate() {
            let actual = (frame.width(), frame.height());
            if actual != camera_size {
                return Err(CalibrationError::FrameSize {
                    index,
                    expected: camera_size,
                    actual,
                });
            }
        }

        // Intensity conversion happens once here, never inside the per-pixel loop.
        let mut intensity: Vec<GrayImage> = frames.par_iter().map(DynamicImage::to_luma8).collect();

        let column_frames = (config.column_bits * 2) as usize;
        let row_frames = intensity.split_off(column_frames);
        let (column_positive, column_negative) = split_pairs(intensity);
        let (row_positive, row_negative) = split_pairs(row_frames);

        log::debug!(
            "Loaded {} column and {} row capture pairs at {}x{}",
            column_positive.len(),
            row_positive.len(),
            camera_width,
            camera_height
        );

        Ok(Self {
            camera_width,
            camera_height,
            column_positive,
            column_negative,
            row_positive,
            row_negative,
        })
    }

    /// Positive and negative frames for one axis.
    pub fn axis(&self, axis: Axis) -> (&[GrayImage], &[GrayImage]) {
        match axis {
            Axis::Column => (&self.column_positive, &self.column_negative),
            Axis::Row => (&self.row_positive, &self.row_negative),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.camera_width, self.camera_height)
    }
}

/// Split an interleaved (positive, negative, positive, ...) list.
fn split_pairs(frames: Vec<GrayImage>) -> (Vec<GrayImage>, Vec<GrayImage>) {
    let mut positive = Vec::with_capacity(frames.len() / 2);
    let mut negative = Vec::with_capacity(frames.len() / 2);
    for (index, frame) in frames.into_iter().enumerate() {
        if index % 2 == 0 {
            positive.push(frame);
        } else {
            negative.push(frame);
        }
    }
    (positive, negative)
}
