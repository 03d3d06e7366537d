//! Sequential project-and-capture loop driving an external projector/camera rig.

use super::gray_code::PatternConfig;
use super::pattern::PatternImages;
use crate::config::CaptureConfig;
use crate::error::{CalibrationError, Result};
use image::{DynamicImage, GrayImage, RgbImage};

/// Error type returned by device implementations.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// A projector and camera pair. Both calls block until done.
pub trait ProjectorCamera {
    /// Show `pattern` full-screen on the projector.
    fn project(&mut self, pattern: &GrayImage) -> std::result::Result<(), DeviceError>;

    /// Grab one camera frame.
    fn capture(&mut self) -> std::result::Result<DynamicImage, DeviceError>;
}

/// Captures of the all-white and all-black reference projections.
#[derive(Debug, Clone)]
pub struct ReferenceCaptures {
    pub white: DynamicImage,
    pub black: DynamicImage,
}

/// Runs the projection sequence one pattern at a time.
#[derive(Debug, Clone, Default)]
pub struct CaptureRunner {
    config: CaptureConfig,
}

impl CaptureRunner {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Capture the white and black reference frames used for the mask.
    pub fn capture_references<D: ProjectorCamera + ?Sized>(
        &self,
        device: &mut D,
        images: &PatternImages,
    ) -> Result<ReferenceCaptures> {
        let white = self.capture_pattern(device, &images.white)?;
        let black = self.capture_pattern(device, &images.black)?;
        Ok(ReferenceCaptures { white, black })
    }

    /// Capture every stripe pattern, in the order the capture loader expects.
    pub fn capture_sequence<D: ProjectorCamera + ?Sized>(
        &self,
        device: &mut D,
        config: &PatternConfig,
        images: &PatternImages,
    ) -> Result<Vec<DynamicImage>> {
        let sequence = config.pattern_sequence();
        let mut frames = Vec::with_capacity(sequence.len());

        for (index, spec) in sequence.iter().enumerate() {
            let Some(pattern) = images.get(spec) else {
                return Err(CalibrationError::CaptureCount {
                    expected: sequence.len(),
                    actual: index,
                });
            };
            log::debug!(
                "Capturing pattern {}/{}: {} bit {}{}",
                index + 1,
                sequence.len(),
                spec.axis,
                spec.bit_index,
                if spec.inverted { " (negative)" } else { "" }
            );
            frames.push(self.capture_pattern(device, pattern)?);
        }

        log::info!("Captured {} pattern frames", frames.len());
        Ok(frames)
    }

    /// Project one pattern, wait for it to settle, then capture.
    pub fn capture_pattern<D: ProjectorCamera + ?Sized>(
        &self,
        device: &mut D,
        pattern: &GrayImage,
    ) -> Result<DynamicImage> {
        device.project(pattern).map_err(CalibrationError::Device)?;

        let settle = self.config.settle_time();
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }

        let count = self.config.frames_to_average.max(1);
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(device.capture().map_err(CalibrationError::Device)?);
        }

        average_frames(frames)
    }
}

/// Average frames per channel; a single frame is returned unchanged.
fn average_frames(mut frames: Vec<DynamicImage>) -> Result<DynamicImage> {
    if frames.len() <= 1 {
        return frames.pop().ok_or(CalibrationError::CaptureCount {
            expected: 1,
            actual: 0,
        });
    }

    let buffers: Vec<RgbImage> = frames.iter().map(DynamicImage::to_rgb8).collect();
    let (width, height) = buffers[0].dimensions();
    for (index, buffer) in buffers.iter().enumerate() {
        if buffer.dimensions() != (width, height) {
            return Err(CalibrationError::FrameSize {
                index,
                expected: (width, height),
                actual: buffer.dimensions(),
            });
        }
    }

    let count = buffers.len() as u32;
    let mut sums = vec![0u32; buffers[0].as_raw().len()];
    for buffer in &buffers {
        for (sum, &value) in sums.iter_mut().zip(buffer.as_raw()) {
            *sum += u32::from(value);
        }
    }
    let data = sums.into_iter().map(|sum| (sum / count) as u8).collect();

    RgbImage::from_raw(width, height, data)
        .map(DynamicImage::ImageRgb8)
        .ok_or(CalibrationError::FrameSize {
            index: 0,
            expected: (width, height),
            actual: (width, height),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::gray_code::{Axis, PatternList};
    use image::{Luma, Rgb};

    /// Records every projected pattern and returns scripted frames.
    struct ScriptedRig {
        projected: Vec<GrayImage>,
        frames: Vec<DynamicImage>,
    }

    impl ProjectorCamera for ScriptedRig {
        fn project(&mut self, pattern: &GrayImage) -> std::result::Result<(), DeviceError> {
            self.projected.push(pattern.clone());
            Ok(())
        }

        fn capture(&mut self) -> std::result::Result<DynamicImage, DeviceError> {
            if self.frames.is_empty() {
                return Err("camera disconnected".into());
            }
            Ok(self.frames.remove(0))
        }
    }

    fn runner(frames_to_average: usize) -> CaptureRunner {
        CaptureRunner::new(CaptureConfig {
            settle_ms: 0,
            frames_to_average,
        })
    }

    fn images(config: &PatternConfig) -> PatternImages {
        PatternImages::new(
            config,
            &PatternList::new(Axis::Column, config.projector_width),
            &PatternList::new(Axis::Row, config.projector_height),
        )
    }

    #[test]
    fn test_sequence_projects_in_order() {
        let config = PatternConfig::new(4, 2).unwrap();
        let images = images(&config);
        let mut rig = ScriptedRig {
            projected: Vec::new(),
            frames: (0..config.total_frames())
                .map(|i| DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([i as u8]))))
                .collect(),
        };

        let frames = runner(1).capture_sequence(&mut rig, &config, &images).unwrap();
        assert_eq!(frames.len(), 6);
        assert_eq!(rig.projected.len(), 6);
        for (spec, projected) in config.pattern_sequence().iter().zip(&rig.projected) {
            assert_eq!(images.get(spec).unwrap(), projected);
        }
        assert_eq!(frames[5].to_luma8().get_pixel(0, 0)[0], 5);
    }

    #[test]
    fn test_references_project_white_then_black() {
        let config = PatternConfig::new(4, 2).unwrap();
        let images = images(&config);
        let mut rig = ScriptedRig {
            projected: Vec::new(),
            frames: vec![
                DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([200]))),
                DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([10]))),
            ],
        };
        let refs = runner(1).capture_references(&mut rig, &images).unwrap();
        assert_eq!(rig.projected[0], images.white);
        assert_eq!(rig.projected[1], images.black);
        assert_eq!(refs.white.to_luma8().get_pixel(0, 0)[0], 200);
        assert_eq!(refs.black.to_luma8().get_pixel(0, 0)[0], 10);
    }

    #[test]
    fn test_frames_are_averaged() {
        let mut rig = ScriptedRig {
            projected: Vec::new(),
            frames: vec![
                DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]))),
                DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, Rgb([20, 40, 60]))),
                DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, Rgb([30, 60, 91]))),
            ],
        };
        let frame = runner(3)
            .capture_pattern(&mut rig, &GrayImage::new(1, 1))
            .unwrap();
        assert_eq!(frame.to_rgb8().get_pixel(1, 0), &Rgb([20, 40, 60]));
        assert_eq!(rig.projected.len(), 1);
    }

    #[test]
    fn test_device_error_propagates() {
        let config = PatternConfig::new(4, 2).unwrap();
        let images = images(&config);
        let mut rig = ScriptedRig {
            projected: Vec::new(),
            frames: Vec::new(),
        };
        let result = runner(1).capture_sequence(&mut rig, &config, &images);
        assert!(matches!(result, Err(CalibrationError::Device(_))));
    }
}
