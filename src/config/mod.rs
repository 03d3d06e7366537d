//! Session configuration and serialization.

use crate::calibration::MaskPolicy;
use crate::error::{CalibrationError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one projector-camera calibration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Projector resolution width.
    pub projector_width: u32,
    /// Projector resolution height.
    pub projector_height: u32,
    /// Camera frame width.
    pub camera_width: u32,
    /// Camera frame height.
    pub camera_height: u32,
    /// Minimum white-minus-black intensity for a pixel to count as illuminated.
    pub mask_threshold: i32,
    /// How the illumination mask gates decoded pixels.
    pub mask_policy: MaskPolicy,
    /// Capture timing.
    pub capture: CaptureConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            projector_width: 1024,
            projector_height: 768,
            camera_width: 1280,
            camera_height: 960,
            mask_threshold: 10,
            mask_policy: MaskPolicy::Ignore,
            capture: CaptureConfig::default(),
        }
    }
}

/// Timing of the project-then-capture loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Time to wait after showing a pattern before capturing, in milliseconds.
    pub settle_ms: u64,
    /// Number of frames averaged per pattern.
    pub frames_to_average: usize,
}

impl CaptureConfig {
    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_ms: 100,
            frames_to_average: 1,
        }
    }
}

impl SessionConfig {
    /// Load configuration, JSON for `.json` files and XML otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;

        if is_json(path) {
            Ok(serde_json::from_str(&contents)?)
        } else {
            quick_xml::de::from_str(&contents).map_err(|e| CalibrationError::Xml(e.to_string()))
        }
    }

    /// Save configuration, JSON for `.json` files and XML otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            quick_xml::se::to_string_with_root("session", self)
                .map_err(|e| CalibrationError::Xml(e.to_string()))?
        };

        std::fs::write(path, contents)?;
        log::info!("Saved session config to {}", path.display());
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}
