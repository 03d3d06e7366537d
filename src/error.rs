//! Error type shared by the calibration, config and export modules.

use thiserror::Error;

use crate::calibration::Axis;

/// Errors that can occur while generating, capturing or decoding patterns.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("{what} resolution must be non-zero, got {width}x{height}")]
    ZeroResolution {
        what: &'static str,
        width: u32,
        height: u32,
    },
    #[error("{axis} axis length {length} exceeds the 16-bit coordinate range")]
    ResolutionTooLarge { axis: Axis, length: u32 },
    #[error("Expected {expected} captured frames, got {actual}")]
    CaptureCount { expected: usize, actual: usize },
    #[error("Frame {index} is {actual:?}, expected {expected:?}")]
    FrameSize {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Mask is {actual:?}, expected {expected:?}")]
    MaskSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Projector/camera device error: {0}")]
    Device(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("Binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    #[error("Invalid correspondence map file: {0}")]
    InvalidMapFile(String),
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
