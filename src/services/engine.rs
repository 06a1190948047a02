//! Per-image color transform: decode, grade, blend, quantize, encode.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageFormat, RgbImage};
use lattice_lut::{blend, LatticeTable};
use std::io::Cursor;
use std::path::Path;

use crate::error::ProcessingError;
use crate::models::RunParameters;
use crate::services::exif;

/// Something that turns one source image into one destination image.
///
/// Implementations run on a blocking thread and must be safe to share.
pub trait ImageProcessor: Send + Sync {
    fn process(
        &self,
        source: &Path,
        dest: &Path,
        table: &LatticeTable,
        params: &RunParameters,
    ) -> Result<(), ProcessingError>;
}

/// The real pipeline backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorTransformEngine;

impl ColorTransformEngine {
    pub fn new() -> Self {
        Self
    }

    /// Grade, blend and quantize a decoded image.
    ///
    /// Returns interleaved RGB bytes with the same dimensions as `image`.
    pub fn transform(image: &RgbImage, table: &LatticeTable, params: &RunParameters) -> Vec<u8> {
        let (width, height) = image.dimensions();
        let blended: Vec<[f32; 3]> = image
            .pixels()
            .map(|pixel| {
                let original = pixel.0.map(f32::from);
                if params.strength == 0 {
                    return original;
                }
                let graded = table.lookup_u8(pixel.0).map(|c| c * 255.0);
                blend(original, graded, params.strength)
            })
            .collect();
        params
            .dither
            .apply(&blended, width as usize, height as usize)
    }

    /// Encode RGB bytes in the format implied by `dest`.
    ///
    /// JPEG (or no recognizable extension) uses `quality`; other formats use
    /// their encoder defaults.
    pub fn encode(
        dest: &Path,
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<(Vec<u8>, bool), ProcessingError> {
        let encode_error = |source| ProcessingError::Encode {
            path: dest.to_path_buf(),
            source,
        };
        let format = ImageFormat::from_path(dest).unwrap_or(ImageFormat::Jpeg);

        let mut bytes = Vec::new();
        if format == ImageFormat::Jpeg {
            JpegEncoder::new_with_quality(&mut bytes, quality)
                .encode(&pixels, width, height, ExtendedColorType::Rgb8)
                .map_err(encode_error)?;
            return Ok((bytes, true));
        }

        let buffer = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            encode_error(image::ImageError::Parameter(
                image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ),
            ))
        })?;
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), format)
            .map_err(encode_error)?;
        Ok((bytes, false))
    }
}

impl ImageProcessor for ColorTransformEngine {
    fn process(
        &self,
        source: &Path,
        dest: &Path,
        table: &LatticeTable,
        params: &RunParameters,
    ) -> Result<(), ProcessingError> {
        let source_bytes = std::fs::read(source).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessingError::SourceMissing(source.to_path_buf())
            } else {
                ProcessingError::Read {
                    path: source.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let decoded = image::load_from_memory(&source_bytes).map_err(|e| {
            ProcessingError::Decode {
                path: source.to_path_buf(),
                source: e,
            }
        })?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        let pixels = Self::transform(&rgb, table, params);
        let (mut bytes, is_jpeg) = Self::encode(dest, pixels, width, height, params.quality)?;

        if is_jpeg {
            match exif::transplant(&source_bytes, &bytes) {
                Ok(with_exif) => bytes = with_exif,
                Err(e) => {
                    tracing::debug!(source = %source.display(), error = %e, "EXIF not copied");
                }
            }
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProcessingError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(dest, &bytes).map_err(|e| ProcessingError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            source = %source.display(),
            dest = %dest.display(),
            width,
            height,
            "Image processed"
        );
        Ok(())
    }
}
