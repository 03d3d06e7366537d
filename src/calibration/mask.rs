//! Projector illumination mask from white/black reference captures.

use crate::error::{CalibrationError, Result};
use image::{DynamicImage, GrayImage};

/// Per-camera-pixel validity: 1 where projector light is observable, 0 elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    /// One 0/1 value per pixel, row-major.
    pub data: Vec<u8>,
}

impl Mask {
    /// Mask with every pixel set.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![1; (width as usize) * (height as usize)],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.data
            .get((y as usize) * (self.width as usize) + x as usize)
            .is_some_and(|&v| v != 0)
    }

    pub fn set_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Build a mask from captures of an all-white and an all-black projection.
///
/// A pixel is set when `white - black > threshold` on single-channel intensity.
/// The threshold is used as given; picking a value above the camera noise floor
/// is up to the caller.
pub fn build_mask(white: &DynamicImage, black: &DynamicImage, threshold: i32) -> Result<Mask> {
    build_mask_gray(&white.to_luma8(), &black.to_luma8(), threshold)
}

/// [`build_mask`] for captures that are already single-channel.
pub fn build_mask_gray(white: &GrayImage, black: &GrayImage, threshold: i32) -> Result<Mask> {
    if white.dimensions() != black.dimensions() {
        return Err(CalibrationError::MaskSize {
            expected: white.dimensions(),
            actual: black.dimensions(),
        });
    }

    let (width, height) = white.dimensions();
    let data = white
        .as_raw()
        .iter()
        .zip(black.as_raw())
        .map(|(&w, &b)| u8::from(i32::from(w) - i32::from(b) > threshold))
        .collect::<Vec<u8>>();

    let mask = Mask {
        width,
        height,
        data,
    };
    log::info!(
        "Mask built: {} of {} pixels illuminated (threshold {})",
        mask.set_count(),
        mask.data.len(),
        threshold
    );
    Ok(mask)
}
