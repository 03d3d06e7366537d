//! Calibration session: owns the pattern lists, images and mask for one
//! projector-camera pair.

use super::acquisition::{CaptureRunner, ProjectorCamera};
use super::capture::CaptureSet;
use super::decoder::{self, CorrespondenceMap, MaskPolicy};
use super::gray_code::{Axis, PatternConfig, PatternList};
use super::mask::{self, Mask};
use super::pattern::{PatternImagePair, PatternImages};
use crate::config::SessionConfig;
use crate::error::{CalibrationError, Result};
use image::DynamicImage;

/// State for one structured light session.
///
/// Pattern lists and images are built once in [`GrayCodeSession::initialize`]
/// and are read-only afterwards.
#[derive(Debug, Clone)]
pub struct GrayCodeSession {
    config: PatternConfig,
    camera_width: u32,
    camera_height: u32,
    columns: PatternList,
    rows: PatternList,
    images: PatternImages,
    mask: Option<Mask>,
    mask_policy: MaskPolicy,
}

impl GrayCodeSession {
    /// Build pattern lists and images for the given resolutions.
    pub fn initialize(
        projector_width: u32,
        projector_height: u32,
        camera_width: u32,
        camera_height: u32,
    ) -> Result<Self> {
        let config = PatternConfig::new(projector_width, projector_height)?;
        if camera_width == 0 || camera_height == 0 {
            return Err(CalibrationError::ZeroResolution {
                what: "camera",
                width: camera_width,
                height: camera_height,
            });
        }

        let columns = PatternList::new(Axis::Column, projector_width);
        let rows = PatternList::new(Axis::Row, projector_height);
        let images = PatternImages::new(&config, &columns, &rows);

        log::info!(
            "Session initialized: projector {}x{} ({} + {} bit-planes), camera {}x{}",
            projector_width,
            projector_height,
            config.column_bits,
            config.row_bits,
            camera_width,
            camera_height
        );

        Ok(Self {
            config,
            camera_width,
            camera_height,
            columns,
            rows,
            images,
            mask: None,
            mask_policy: MaskPolicy::default(),
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let session = Self::initialize(
            config.projector_width,
            config.projector_height,
            config.camera_width,
            config.camera_height,
        )?;
        Ok(session.with_mask_policy(config.mask_policy))
    }

    pub fn with_mask_policy(mut self, policy: MaskPolicy) -> Self {
        self.mask_policy = policy;
        self
    }

    pub fn pattern_config(&self) -> &PatternConfig {
        &self.config
    }

    pub fn camera_size(&self) -> (u32, u32) {
        (self.camera_width, self.camera_height)
    }

    pub fn pattern_list(&self, axis: Axis) -> &PatternList {
        match axis {
            Axis::Column => &self.columns,
            Axis::Row => &self.rows,
        }
    }

    /// Positive/negative pairs in projection order, column planes first.
    pub fn pattern_images(&self) -> impl Iterator<Item = &PatternImagePair> {
        self.images.pairs()
    }

    /// All images including the white/black references.
    pub fn images(&self) -> &PatternImages {
        &self.images
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn mask_policy(&self) -> MaskPolicy {
        self.mask_policy
    }

    /// Build the illumination mask and keep it for later decodes.
    pub fn build_mask(
        &mut self,
        white: &DynamicImage,
        black: &DynamicImage,
        threshold: i32,
    ) -> Result<&Mask> {
        let mask = mask::build_mask(white, black, threshold)?;
        if mask.dimensions() != self.camera_size() {
            return Err(CalibrationError::MaskSize {
                expected: self.camera_size(),
                actual: mask.dimensions(),
            });
        }
        Ok(&*self.mask.insert(mask))
    }

    pub fn set_mask(&mut self, mask: Option<Mask>) {
        self.mask = mask;
    }

    /// Organize an ordered capture list; fails on a length or size mismatch.
    pub fn load_captures(&self, frames: &[DynamicImage]) -> Result<CaptureSet> {
        CaptureSet::load(&self.config, self.camera_size(), frames)
    }

    /// Decode captures into a fresh correspondence map.
    pub fn decode(&self, captures: &CaptureSet) -> Result<CorrespondenceMap> {
        if captures.dimensions() != self.camera_size() {
            return Err(CalibrationError::FrameSize {
                index: 0,
                expected: self.camera_size(),
                actual: captures.dimensions(),
            });
        }
        decoder::decode(&self.config, captures, self.mask.as_ref(), self.mask_policy)
    }

    /// Full cycle against a device: references, mask, stripe captures, decode.
    pub fn run<D: ProjectorCamera + ?Sized>(
        &mut self,
        device: &mut D,
        runner: &CaptureRunner,
        mask_threshold: i32,
    ) -> Result<CorrespondenceMap> {
        let references = runner.capture_references(device, &self.images)?;
        self.build_mask(&references.white, &references.black, mask_threshold)?;

        let frames = runner.capture_sequence(device, &self.config, &self.images)?;
        let captures = self.load_captures(&frames)?;
        self.decode(&captures)
    }
}
