//! Assertion helpers for tests.

use image::RgbImage;

/// Assert two images have equal dimensions and every channel within
/// `tolerance` (for lossy round trips).
pub fn assert_images_close(actual: &RgbImage, expected: &RgbImage, tolerance: u8) {
    assert_eq!(
        actual.dimensions(),
        expected.dimensions(),
        "image dimensions differ"
    );
    let mut worst = 0u8;
    for (a, e) in actual.pixels().zip(expected.pixels()) {
        for c in 0..3 {
            worst = worst.max(a.0[c].abs_diff(e.0[c]));
        }
    }
    assert!(
        worst <= tolerance,
        "max channel difference {worst} exceeds tolerance {tolerance}"
    );
}

/// Mean of one channel over the whole image.
pub fn channel_mean(image: &RgbImage, channel: usize) -> f64 {
    let sum: u64 = image.pixels().map(|p| u64::from(p.0[channel])).sum();
    sum as f64 / f64::from(image.width() * image.height())
}
