//! End-to-end decoding against synthetic captures.

use image::{DynamicImage, GrayImage, Luma};
use procam_graycode::calibration::{
    CaptureRunner, DeviceError, GrayCodeSession, MaskPolicy, ProjectorCamera, ProjectorCoord,
};
use procam_graycode::config::CaptureConfig;
use procam_graycode::export::CalibrationExporter;
use procam_graycode::CalibrationError;

#[test]
fn identity_mapping_decodes_exactly() {
    let session = GrayCodeSession::initialize(1024, 768, 1024, 768).unwrap();
    assert_eq!(session.pattern_config().column_bits, 10);
    assert_eq!(session.pattern_config().row_bits, 10);

    // A camera aligned pixel-for-pixel with the projector sees the patterns as-is.
    let frames: Vec<DynamicImage> = session
        .pattern_images()
        .flat_map(|pair| [pair.positive.clone(), pair.negative.clone()])
        .map(DynamicImage::ImageLuma8)
        .collect();
    assert_eq!(frames.len(), 40);

    let captures = session.load_captures(&frames).unwrap();
    let map = session.decode(&captures).unwrap();

    assert_eq!(map.valid_count(), 1024 * 768);
    for y in 0..768 {
        for x in 0..1024 {
            assert_eq!(
                map.get(x, y),
                Some(ProjectorCoord {
                    x: x as u16,
                    y: y as u16
                }),
                "camera pixel ({}, {})",
                x,
                y
            );
        }
    }
}

#[test]
fn short_capture_list_is_rejected() {
    let session = GrayCodeSession::initialize(1024, 768, 8, 8).unwrap();
    let frames = vec![DynamicImage::new_luma8(8, 8); 39];
    assert!(matches!(
        session.load_captures(&frames),
        Err(CalibrationError::CaptureCount {
            expected: 40,
            actual: 39
        })
    ));
}

/// Camera that sees a projector covering only part of its view, with ambient
/// light and reduced contrast.
struct SimulatedRig {
    camera: (u32, u32),
    /// Camera-space rectangle lit by the projector: (x0, y0, x1, y1), exclusive end.
    lit: (u32, u32, u32, u32),
    /// Projector pixels per camera pixel inside the lit region.
    scale: u32,
    current: Option<GrayImage>,
}

impl SimulatedRig {
    fn projector_pixel(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let (x0, y0, x1, y1) = self.lit;
        (x >= x0 && x < x1 && y >= y0 && y < y1).then(|| ((x - x0) * self.scale, (y - y0) * self.scale))
    }
}

impl ProjectorCamera for SimulatedRig {
    fn project(&mut self, pattern: &GrayImage) -> Result<(), DeviceError> {
        self.current = Some(pattern.clone());
        Ok(())
    }

    fn capture(&mut self) -> Result<DynamicImage, DeviceError> {
        let pattern = self.current.as_ref().ok_or("nothing projected")?;
        let frame = GrayImage::from_fn(self.camera.0, self.camera.1, |x, y| {
            let ambient = 30u8;
            match self.projector_pixel(x, y) {
                Some((px, py)) => {
                    let lit = pattern.get_pixel(px, py)[0] as u32;
                    Luma([ambient + (lit * 150 / 255) as u8])
                }
                None => Luma([ambient]),
            }
        });
        Ok(DynamicImage::ImageLuma8(frame))
    }
}

#[test]
fn simulated_rig_full_cycle_with_mask() {
    let camera = (80, 60);
    let mut rig = SimulatedRig {
        camera,
        lit: (10, 5, 70, 55),
        scale: 2,
        current: None,
    };

    let mut session = GrayCodeSession::initialize(120, 100, camera.0, camera.1)
        .unwrap()
        .with_mask_policy(MaskPolicy::Flag);
    let runner = CaptureRunner::new(CaptureConfig {
        settle_ms: 0,
        frames_to_average: 2,
    });

    let map = session.run(&mut rig, &runner, 20).unwrap();

    let mask = session.mask().unwrap();
    assert_eq!(mask.set_count(), 60 * 50);
    assert_eq!(map.valid_count(), 60 * 50);

    for y in 0..camera.1 {
        for x in 0..camera.0 {
            match rig.projector_pixel(x, y) {
                Some((px, py)) => assert_eq!(
                    map.get_valid(x, y),
                    Some(ProjectorCoord {
                        x: px as u16,
                        y: py as u16
                    })
                ),
                None => assert!(!map.is_valid(x, y)),
            }
        }
    }

    // Sub-pixel lookup inside the lit area follows the 2x scale.
    let (px, py) = map.sample(20.5, 10.5).unwrap();
    assert!((px - 21.0).abs() < 1e-4);
    assert!((py - 11.0).abs() < 1e-4);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.pcgc");
    CalibrationExporter::save_map(&map, &path).unwrap();
    assert_eq!(CalibrationExporter::load_map(&path).unwrap(), map);
}

#[test]
fn single_pixel_projector_decodes_to_origin() {
    let session = GrayCodeSession::initialize(1, 1, 32, 24).unwrap();
    assert_eq!(session.pattern_images().count(), 0);
    let captures = session.load_captures(&[]).unwrap();
    let map = session.decode(&captures).unwrap();
    assert!(map.coords.iter().all(|c| *c == ProjectorCoord { x: 0, y: 0 }));
    assert_eq!(map.valid_count(), 32 * 24);
}
