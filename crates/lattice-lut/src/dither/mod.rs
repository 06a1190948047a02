//! Dither stage: reduce blended 0..255 floats to 8-bit output.
//!
//! # Algorithms
//!
//! - **None** ([`Passthrough`]): round and clamp each channel.
//! - **Floyd-Steinberg** ([`FloydSteinberg`]): single left-to-right raster
//!   pass, per channel, diffusing the rounding residual to unprocessed
//!   neighbors.
//! - **Random** ([`RandomDither`]): independent uniform noise per channel
//!   before quantization; nothing carried between pixels.
//!
//! All algorithms implement the [`Dither`] trait. [`DitherMode`] selects
//! one for a processing run.

mod floyd_steinberg;
mod kernel;
mod random;

pub use floyd_steinberg::FloydSteinberg;
pub use kernel::{Kernel, FLOYD_STEINBERG};
pub use random::{RandomDither, NOISE_AMPLITUDE};

use crate::error::ParseDitherModeError;
use std::fmt;
use std::str::FromStr;

/// Dither selection for a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DitherMode {
    /// Round to the nearest 8-bit value, no noise.
    #[default]
    None,
    /// Floyd-Steinberg error diffusion.
    #[cfg_attr(feature = "serde", serde(rename = "floyd", alias = "floyd-steinberg"))]
    FloydSteinberg,
    /// Uniform random noise of [`NOISE_AMPLITUDE`] before rounding.
    Random,
}

impl DitherMode {
    /// Short lowercase name (`none`, `floyd`, `random`).
    pub fn as_str(self) -> &'static str {
        match self {
            DitherMode::None => "none",
            DitherMode::FloydSteinberg => "floyd",
            DitherMode::Random => "random",
        }
    }

    /// Run the selected algorithm over a row-major image.
    ///
    /// Returns `width * height * 3` interleaved RGB bytes.
    pub fn apply(self, image: &[[f32; 3]], width: usize, height: usize) -> Vec<u8> {
        match self {
            DitherMode::None => Passthrough.dither(image, width, height),
            DitherMode::FloydSteinberg => FloydSteinberg.dither(image, width, height),
            DitherMode::Random => RandomDither::new().dither(image, width, height),
        }
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherMode {
    type Err = ParseDitherModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(DitherMode::None),
            "floyd" | "floyd-steinberg" | "floydsteinberg" => Ok(DitherMode::FloydSteinberg),
            "random" => Ok(DitherMode::Random),
            _ => Err(ParseDitherModeError {
                input: s.to_string(),
            }),
        }
    }
}

/// Trait for algorithms that quantize a continuous image to 8 bits.
pub trait Dither {
    /// Quantize an image.
    ///
    /// # Arguments
    ///
    /// * `image` - Pixels in the 0..255 domain (row-major order). Values may
    ///   fall outside that range; output is clamped.
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    ///
    /// # Returns
    ///
    /// `width * height * 3` interleaved RGB bytes.
    fn dither(&self, image: &[[f32; 3]], width: usize, height: usize) -> Vec<u8>;
}

/// No dithering: round each channel to the nearest representable value.
pub struct Passthrough;

impl Dither for Passthrough {
    fn dither(&self, image: &[[f32; 3]], width: usize, height: usize) -> Vec<u8> {
        debug_assert_eq!(image.len(), width * height);
        image
            .iter()
            .flat_map(|px| px.map(|c| quantize(c) as u8))
            .collect()
    }
}

/// Nearest representable 8-bit level, as a float in `0.0..=255.0`.
#[inline]
pub fn quantize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.round().clamp(0.0, 255.0)
    }
}

/// Error buffer for error diffusion.
///
/// Holds only the rows the kernel can reach (`max_dy + 1`): `rows[0]` is the
/// row being processed, `rows[1]` the next one, and so on.
#[derive(Debug)]
pub struct ErrorBuffer {
    rows: Vec<Vec<[f32; 3]>>,
    width: usize,
}

impl ErrorBuffer {
    /// Create a buffer for `width` pixels and `row_depth` rows.
    pub fn new(width: usize, row_depth: usize) -> Self {
        Self {
            rows: (0..row_depth).map(|_| vec![[0.0; 3]; width]).collect(),
            width,
        }
    }

    /// Error accumulated so far for pixel `x` of the current row.
    #[inline]
    pub fn get_accumulated(&self, x: usize) -> [f32; 3] {
        self.rows[0][x]
    }

    /// Add error to a future pixel. Out-of-bounds targets are dropped.
    #[inline]
    pub fn add_error(&mut self, x: usize, row_offset: usize, error: [f32; 3]) {
        if x < self.width && row_offset < self.rows.len() {
            for c in 0..3 {
                self.rows[row_offset][x][c] += error[c];
            }
        }
    }

    /// Move to the next row, discarding the current one.
    pub fn advance_row(&mut self) {
        self.rows.rotate_left(1);
        if let Some(last) = self.rows.last_mut() {
            last.fill([0.0; 3]);
        }
    }
}

/// Error diffusion loop shared by kernel-based algorithms.
///
/// Every row is scanned left to right. For each channel the accumulated
/// error is added, the sum is quantized, and the residual is spread over
/// the kernel's in-bounds targets.
pub(crate) fn dither_with_kernel(
    image: &[[f32; 3]],
    width: usize,
    height: usize,
    kernel: &Kernel,
) -> Vec<u8> {
    debug_assert_eq!(image.len(), width * height);
    let mut output = vec![0u8; width * height * 3];
    let mut error_buf = ErrorBuffer::new(width, kernel.max_dy + 1);

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let accumulated = error_buf.get_accumulated(x);

            let mut residual = [0.0_f32; 3];
            for c in 0..3 {
                let value = image[idx][c] + accumulated[c];
                let level = quantize(value);
                output[idx * 3 + c] = level as u8;
                residual[c] = if value.is_nan() { 0.0 } else { value - level };
            }

            for (nx, dy, fraction) in kernel.targets(x, y, width, height) {
                error_buf.add_error(nx, dy, residual.map(|e| e * fraction));
            }
        }
        error_buf.advance_row();
    }

    output
}
