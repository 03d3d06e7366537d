//! Stripe image generation for projection.

use super::gray_code::{Axis, PatternConfig, PatternList, PatternSpec};
use image::{GrayImage, Luma};
use rayon::prelude::*;

/// Full projector intensity for a set bit.
pub const PATTERN_ON: u8 = 255;
/// Projector intensity for a cleared bit.
pub const PATTERN_OFF: u8 = 0;

/// Positive stripe image for one bit-plane and its photometric negative.
#[derive(Debug, Clone)]
pub struct PatternImagePair {
    pub axis: Axis,
    pub bit_index: u32,
    pub positive: GrayImage,
    pub negative: GrayImage,
}

impl PatternImagePair {
    pub fn image(&self, inverted: bool) -> &GrayImage {
        if inverted {
            &self.negative
        } else {
            &self.positive
        }
    }
}

/// Render one bit-plane at projector resolution.
///
/// Column planes are replicated down every row, row planes across every column.
/// `plane` must hold one entry per column (or row) of the image.
pub fn render_plane(plane: &[u8], axis: Axis, width: u32, height: u32) -> GrayImage {
    let length = match axis {
        Axis::Column => width,
        Axis::Row => height,
    };
    debug_assert!(
        plane.len() >= length as usize,
        "{} plane of length {} cannot cover {} pixels",
        axis,
        plane.len(),
        length
    );
    GrayImage::from_fn(width, height, |x, y| {
        let position = match axis {
            Axis::Column => x,
            Axis::Row => y,
        };
        let bit = plane.get(position as usize).copied().unwrap_or(0);
        Luma([if bit != 0 { PATTERN_ON } else { PATTERN_OFF }])
    })
}

/// Pixel-wise complement of a pattern image.
pub fn negative(pattern: &GrayImage) -> GrayImage {
    let mut inverted = pattern.clone();
    image::imageops::invert(&mut inverted);
    inverted
}

/// Uniform reference image (all-white or all-black projection).
pub fn reference(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

/// Render every bit-plane of `list` as a positive/negative pair.
pub fn render_pattern_list(list: &PatternList, width: u32, height: u32) -> Vec<PatternImagePair> {
    let axis = list.axis();
    list.planes()
        .par_iter()
        .enumerate()
        .map(|(bit_index, plane)| {
            let positive = render_plane(plane, axis, width, height);
            let negative = negative(&positive);
            PatternImagePair {
                axis,
                bit_index: bit_index as u32,
                positive,
                negative,
            }
        })
        .collect()
}

/// All stripe images for a projector, generated once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct PatternImages {
    pub columns: Vec<PatternImagePair>,
    pub rows: Vec<PatternImagePair>,
    pub white: GrayImage,
    pub black: GrayImage,
}

impl PatternImages {
    pub fn new(config: &PatternConfig, columns: &PatternList, rows: &PatternList) -> Self {
        let width = config.projector_width;
        let height = config.projector_height;
        let (columns, rows) = rayon::join(
            || render_pattern_list(columns, width, height),
            || render_pattern_list(rows, width, height),
        );

        log::debug!(
            "Rendered {} column and {} row pattern pairs at {}x{}",
            columns.len(),
            rows.len(),
            width,
            height
        );

        Self {
            columns,
            rows,
            white: reference(width, height, PATTERN_ON),
            black: reference(width, height, PATTERN_OFF),
        }
    }

    /// Pattern pairs in projection order: column planes first, then rows.
    pub fn pairs(&self) -> impl Iterator<Item = &PatternImagePair> {
        self.columns.iter().chain(self.rows.iter())
    }

    /// Image for a single step of the projection sequence.
    pub fn get(&self, spec: &PatternSpec) -> Option<&GrayImage> {
        let pairs = match spec.axis {
            Axis::Column => &self.columns,
            Axis::Row => &self.rows,
        };
        pairs
            .get(spec.bit_index as usize)
            .map(|pair| pair.image(spec.inverted))
    }

    /// Number of individual images (positives plus negatives).
    pub fn image_count(&self) -> usize {
        (self.columns.len() + self.rows.len()) * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_plane_replicated_down_rows() {
        let list = PatternList::new(Axis::Column, 16);
        let pairs = render_pattern_list(&list, 16, 4);
        assert_eq!(pairs.len(), 4);

        // MSB plane: left half dark, right half lit.
        let msb = &pairs[0];
        for y in 0..4 {
            for x in 0..16 {
                let expected = if x >= 8 { PATTERN_ON } else { PATTERN_OFF };
                assert_eq!(msb.positive.get_pixel(x, y)[0], expected);
                assert_eq!(msb.negative.get_pixel(x, y)[0], 255 - expected);
            }
        }
    }

    #[test]
    fn test_row_plane_replicated_across_columns() {
        let list = PatternList::new(Axis::Row, 6);
        let pairs = render_pattern_list(&list, 5, 6);
        assert_eq!(pairs.len(), 3);

        // LSB plane of 6 rows is 011001.
        let lsb = &pairs[2];
        let expected = [0, 1, 1, 0, 0, 1];
        for (y, bit) in expected.iter().enumerate() {
            for x in 0..5 {
                let value = lsb.positive.get_pixel(x, y as u32)[0];
                assert_eq!(value, if *bit == 1 { 255 } else { 0 });
            }
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "cannot cover")]
    fn test_short_plane_is_rejected() {
        // A 16-column list rendered onto a 32-pixel-wide image.
        let list = PatternList::new(Axis::Column, 16);
        render_plane(list.plane(0).unwrap(), Axis::Column, 32, 2);
    }

    #[test]
    fn test_pattern_images_order_and_lookup() {
        let config = PatternConfig::new(16, 6).unwrap();
        let columns = PatternList::new(Axis::Column, 16);
        let rows = PatternList::new(Axis::Row, 6);
        let images = PatternImages::new(&config, &columns, &rows);

        assert_eq!(images.image_count(), config.total_frames());
        let order: Vec<(Axis, u32)> = images.pairs().map(|p| (p.axis, p.bit_index)).collect();
        assert_eq!(order[0], (Axis::Column, 0));
        assert_eq!(order[3], (Axis::Column, 3));
        assert_eq!(order[4], (Axis::Row, 0));

        for spec in config.pattern_sequence() {
            let image = images.get(&spec).unwrap();
            assert_eq!(image.dimensions(), (16, 6));
        }
        assert!(images.white.pixels().all(|p| p[0] == PATTERN_ON));
        assert!(images.black.pixels().all(|p| p[0] == PATTERN_OFF));
    }

    #[test]
    fn test_single_pixel_projector_has_no_patterns() {
        let config = PatternConfig::new(1, 1).unwrap();
        let columns = PatternList::new(Axis::Column, 1);
        let rows = PatternList::new(Axis::Row, 1);
        let images = PatternImages::new(&config, &columns, &rows);
        assert_eq!(images.image_count(), 0);
        assert_eq!(images.pairs().count(), 0);
    }
}
