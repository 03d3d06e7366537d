//! Export of pattern images, masks and decoded correspondence maps.

use crate::calibration::{
    Axis, CorrespondenceMap, Mask, PatternImages, PatternSpec, ProjectorCoord,
};
use crate::error::{CalibrationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Leading bytes of a correspondence map file.
const MAP_MAGIC: &[u8; 4] = b"PCGC";
const MAP_VERSION: u32 = 1;

/// Metadata stored ahead of the compressed map payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct MapHeader {
    version: u32,
    camera_width: u32,
    camera_height: u32,
    projector_width: u32,
    projector_height: u32,
}

/// File name used for one step of the projection sequence.
///
/// Captures are read back from a directory under the same names.
pub fn pattern_file_name(spec: &PatternSpec) -> String {
    let axis = match spec.axis {
        Axis::Column => "column",
        Axis::Row => "row",
    };
    let polarity = if spec.inverted { "neg" } else { "pos" };
    format!("{}_{:02}_{}.png", axis, spec.bit_index, polarity)
}

pub const WHITE_FILE_NAME: &str = "white.png";
pub const BLACK_FILE_NAME: &str = "black.png";

/// Export calibration artifacts to image and binary files.
pub struct CalibrationExporter;

impl CalibrationExporter {
    /// Write every pattern image plus the white/black references as PNGs.
    pub fn export_patterns(images: &PatternImages, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;
        let mut written = Vec::with_capacity(images.image_count() + 2);

        for pair in images.pairs() {
            for inverted in [false, true] {
                let spec = PatternSpec {
                    axis: pair.axis,
                    bit_index: pair.bit_index,
                    inverted,
                };
                let path = output_dir.join(pattern_file_name(&spec));
                pair.image(inverted).save(&path)?;
                written.push(path);
            }
        }

        for (name, reference) in [(WHITE_FILE_NAME, &images.white), (BLACK_FILE_NAME, &images.black)] {
            let path = output_dir.join(name);
            reference.save(&path)?;
            written.push(path);
        }

        log::info!(
            "Exported {} pattern images to {}",
            written.len(),
            output_dir.display()
        );
        Ok(written)
    }

    /// Export mask as an 8-bit PNG (set = 255).
    pub fn export_mask(mask: &Mask, path: &Path) -> Result<()> {
        let img = image::GrayImage::from_fn(mask.width, mask.height, |x, y| {
            image::Luma([if mask.is_set(x, y) { 255 } else { 0 }])
        });
        img.save(path)?;
        Ok(())
    }

    /// Load a mask written by [`CalibrationExporter::export_mask`]; any non-zero pixel is set.
    pub fn load_mask(path: &Path) -> Result<Mask> {
        let img = image::open(path)?.to_luma8();
        let (width, height) = img.dimensions();
        let data = img.into_raw().into_iter().map(|v| u8::from(v != 0)).collect();
        Ok(Mask {
            width,
            height,
            data,
        })
    }

    /// Render the map for inspection: X as red, Y as green, invalid pixels black.
    pub fn render_preview(map: &CorrespondenceMap) -> image::RgbImage {
        let scale = |value: u16, length: u32| -> u8 {
            if length <= 1 {
                0
            } else {
                (u32::from(value) * 255 / (length - 1)) as u8
            }
        };

        image::RgbImage::from_fn(map.camera_width, map.camera_height, |x, y| {
            match map.get_valid(x, y) {
                Some(coord) => image::Rgb([
                    scale(coord.x, map.projector_width),
                    scale(coord.y, map.projector_height),
                    0,
                ]),
                None => image::Rgb([0, 0, 0]),
            }
        })
    }

    pub fn export_preview(map: &CorrespondenceMap, path: &Path) -> Result<()> {
        Self::render_preview(map).save(path)?;
        Ok(())
    }

    /// Save the map as a compact binary file.
    ///
    /// Layout: magic, bincode header, then an lz4 block holding the
    /// `(u16, u16)` coordinate pairs as little-endian followed by one validity
    /// byte per pixel.
    pub fn save_map(map: &CorrespondenceMap, path: &Path) -> Result<()> {
        let header = MapHeader {
            version: MAP_VERSION,
            camera_width: map.camera_width,
            camera_height: map.camera_height,
            projector_width: map.projector_width,
            projector_height: map.projector_height,
        };

        let coords: Vec<ProjectorCoord> = map
            .coords
            .iter()
            .map(|c| ProjectorCoord {
                x: c.x.to_le(),
                y: c.y.to_le(),
            })
            .collect();
        let mut payload: Vec<u8> = bytemuck::cast_slice::<ProjectorCoord, u8>(&coords).to_vec();
        payload.extend(map.valid.iter().map(|&v| u8::from(v)));

        let mut bytes = MAP_MAGIC.to_vec();
        bytes.extend(bincode::serialize(&header)?);
        bytes.extend(lz4_flex::compress_prepend_size(&payload));

        std::fs::write(path, bytes)?;
        log::info!(
            "Saved {}x{} correspondence map to {}",
            map.camera_width,
            map.camera_height,
            path.display()
        );
        Ok(())
    }

    /// Load a map written by [`CalibrationExporter::save_map`].
    pub fn load_map(path: &Path) -> Result<CorrespondenceMap> {
        let bytes = std::fs::read(path)?;
        let body = bytes
            .strip_prefix(MAP_MAGIC.as_slice())
            .ok_or_else(|| CalibrationError::InvalidMapFile("bad magic".to_string()))?;

        let header: MapHeader = bincode::deserialize(body)?;
        if header.version != MAP_VERSION {
            return Err(CalibrationError::InvalidMapFile(format!(
                "unsupported version {}",
                header.version
            )));
        }

        if header.camera_width == 0 || header.camera_height == 0 {
            return Err(CalibrationError::InvalidMapFile(format!(
                "zero-sized {}x{} map",
                header.camera_width, header.camera_height
            )));
        }

        let pixels = (header.camera_width as usize)
            .checked_mul(header.camera_height as usize)
            .ok_or_else(|| CalibrationError::InvalidMapFile("map too large".to_string()))?;
        let expected_len = pixels
            .checked_mul(std::mem::size_of::<ProjectorCoord>() + 1)
            .filter(|&len| u32::try_from(len).is_ok())
            .ok_or_else(|| CalibrationError::InvalidMapFile("map too large".to_string()))?;
        let coord_bytes = pixels * std::mem::size_of::<ProjectorCoord>();

        let header_len = bincode::serialized_size(&header)? as usize;
        let compressed = body
            .get(header_len..)
            .ok_or_else(|| CalibrationError::InvalidMapFile("truncated header".to_string()))?;

        // The lz4 block starts with its decompressed size; check it against the
        // header before it is used to allocate.
        let declared = compressed
            .get(..4)
            .and_then(|prefix| <[u8; 4]>::try_from(prefix).ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| CalibrationError::InvalidMapFile("missing payload".to_string()))?;
        if declared as usize != expected_len {
            return Err(CalibrationError::InvalidMapFile(format!(
                "expected {} payload bytes, block declares {}",
                expected_len, declared
            )));
        }
        let payload = lz4_flex::decompress_size_prepended(compressed)?;

        if payload.len() != expected_len {
            return Err(CalibrationError::InvalidMapFile(format!(
                "expected {} payload bytes, found {}",
                expected_len,
                payload.len()
            )));
        }

        let (coord_data, valid_data) = payload.split_at(coord_bytes);
        let coords = coord_data
            .chunks_exact(std::mem::size_of::<ProjectorCoord>())
            .map(bytemuck::pod_read_unaligned::<ProjectorCoord>)
            .map(|c| ProjectorCoord {
                x: u16::from_le(c.x),
                y: u16::from_le(c.y),
            })
            .collect();
        let valid = valid_data.iter().map(|&v| v != 0).collect();

        Ok(CorrespondenceMap {
            camera_width: header.camera_width,
            camera_height: header.camera_height,
            projector_width: header.projector_width,
            projector_height: header.projector_height,
            coords,
            valid,
        })
    }
}
