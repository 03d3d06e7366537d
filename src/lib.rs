//! Projector-Camera Gray Code Correspondence
//!
//! Structured light core for projector-camera calibration:
//! - Gray code bit-plane pattern lists and stripe images
//! - White/black illumination masks
//! - Per-pixel decoding of captured stripes into a camera-to-projector map
//! - Binary and image export of the decoded map

pub mod calibration;
pub mod config;
pub mod error;
pub mod export;

pub use error::{CalibrationError, Result};
