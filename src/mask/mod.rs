//! Conversion between binary masks and polygon regions.
//!
//! [`mask_to_segmentation`] and [`render_segmentation_to_mask`] are inverse
//! operations: tracing a mask and rendering the result reproduces the
//! mask's foreground exactly.

pub mod raster;
pub mod trace;

use std::path::Path;

use crate::error::LabelkitError;
use crate::ir::Region;

pub use raster::{fill_ring, for_each_span, paint_region, render_segmentation_to_mask};
pub use trace::{mask_to_segmentation, MIN_RING_COORDINATES};

/// Loads an image from disk, treats every non-zero luma value as
/// foreground and traces it.
pub fn mask_to_segmentation_from_path(path: &Path) -> Result<Vec<Region>, LabelkitError> {
    let mask = image::open(path)
        .map_err(|source| LabelkitError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    Ok(mask_to_segmentation(&mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn traces_mask_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mut mask = GrayImage::new(16, 16);
        for y in 4..8 {
            for x in 4..10 {
                mask.put_pixel(x, y, Luma([200]));
            }
        }
        mask.save(&path).unwrap();

        let regions = mask_to_segmentation_from_path(&path).unwrap();
        assert_eq!(regions.len(), 1);
        let rendered = render_segmentation_to_mask(&regions, 16, 16, 200);
        assert_eq!(rendered, mask);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = mask_to_segmentation_from_path(Path::new("/nonexistent/mask.png")).unwrap_err();
        assert!(matches!(err, LabelkitError::ImageRead { .. }));
    }
}
