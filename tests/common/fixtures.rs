//! LUT sources and test images.

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use lutwatch::models::PipelineSettings;

/// Render a `.cube` source by evaluating `f` at every lattice point.
///
/// Arguments to `f` are normalized coordinates in `[0, 1]`.
pub fn cube_text(size: usize, f: impl Fn(f32, f32, f32) -> [f32; 3]) -> String {
    let max = (size - 1) as f32;
    let mut text = format!("# generated\nTITLE \"test\"\nLUT_3D_SIZE {size}\n");
    for b in 0..size {
        for g in 0..size {
            for r in 0..size {
                let [x, y, z] = f(r as f32 / max, g as f32 / max, b as f32 / max);
                writeln!(text, "{x:.6} {y:.6} {z:.6}").unwrap();
            }
        }
    }
    text
}

pub fn identity_cube(size: usize) -> String {
    cube_text(size, |r, g, b| [r, g, b])
}

pub fn invert_cube() -> String {
    cube_text(2, |r, g, b| [1.0 - r, 1.0 - g, 1.0 - b])
}

/// Size-17 grade that lifts reds and crushes blues.
pub fn warm_cube() -> String {
    cube_text(17, |r, g, b| [(r * 1.2).min(1.0), g, b * 0.7])
}

/// Smooth gradient with every channel varying.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / (width - 1).max(1)) as u8,
            (y * 255 / (height - 1).max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

pub fn translucent(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 128]))
}

pub fn write_jpeg(path: &Path, image: &RgbImage) {
    image
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

pub fn write_png(path: &Path, image: &RgbImage) {
    image.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Short delays so tests finish quickly.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        settle_delay: Duration::from_millis(50),
        completed_grace: Duration::from_millis(500),
        history_capacity: 100,
        max_concurrent: 2,
        event_capacity: 1024,
        process_timeout: Some(Duration::from_secs(30)),
    }
}
