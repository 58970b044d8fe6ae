#![allow(dead_code)]

use image::{GrayImage, Luma};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A flat ring of 3 to 12 points with coordinates on a coarse grid.
pub fn arb_ring() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((0i32..200, 0i32..200), 3..12).prop_map(|points| {
        points
            .into_iter()
            .flat_map(|(x, y)| [f64::from(x) * 0.5, f64::from(y) * 0.5])
            .collect()
    })
}

/// A random mask up to 16x16 whose pixels are 0 or a random non-zero value.
pub fn arb_mask() -> impl Strategy<Value = GrayImage> {
    (1u32..16, 1u32..16)
        .prop_flat_map(|(w, h)| {
            (
                Just((w, h)),
                prop::collection::vec(prop_oneof![3 => Just(0u8), 2 => 1u8..=255], (w * h) as usize),
            )
        })
        .prop_map(|((w, h), pixels)| {
            GrayImage::from_raw(w, h, pixels).expect("pixel count matches dimensions")
        })
}

/// The mask with every non-zero pixel set to `value`.
pub fn binarize(mask: &GrayImage, value: u8) -> GrayImage {
    let mut out = mask.clone();
    for pixel in out.pixels_mut() {
        if pixel.0[0] != 0 {
            *pixel = Luma([value]);
        }
    }
    out
}
