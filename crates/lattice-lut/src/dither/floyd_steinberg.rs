//! Floyd-Steinberg error diffusion to 8-bit levels.

use super::{dither_with_kernel, Dither, FLOYD_STEINBERG};

/// Floyd-Steinberg error diffusion.
///
/// Each channel is handled independently. The value plus accumulated error
/// is rounded to the nearest 8-bit level and the residual
/// (pre-quantization minus quantized) is passed on:
///
/// ```text
///        X   7
///    3   5   1      (sixteenths)
/// ```
///
/// Rows are always scanned left to right (no serpentine).
pub struct FloydSteinberg;

impl Dither for FloydSteinberg {
    fn dither(&self, image: &[[f32; 3]], width: usize, height: usize) -> Vec<u8> {
        dither_with_kernel(image, width, height, &FLOYD_STEINBERG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_input_is_unchanged() {
        let image: Vec<[f32; 3]> = (0..12).map(|i| [i as f32 * 20.0, 7.0, 255.0]).collect();
        let out = FloydSteinberg.dither(&image, 4, 3);
        let expected: Vec<u8> = image
            .iter()
            .flat_map(|px| px.map(|c| c as u8))
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_residual_moves_right() {
        // 100.4 rounds down leaving 0.4; 7/16 of it lifts the next pixel
        // from 100.4 to 100.575, which rounds up.
        let image = vec![[100.4, 0.0, 0.0], [100.4, 0.0, 0.0]];
        let out = FloydSteinberg.dither(&image, 2, 1);
        assert_eq!(out, vec![100, 0, 0, 101, 0, 0]);
    }

    #[test]
    fn test_mean_level_preserved() {
        // A flat 100.25 field should average close to 100.25 after dithering.
        let (w, h) = (32, 32);
        let image = vec![[100.25_f32; 3]; w * h];
        let out = FloydSteinberg.dither(&image, w, h);
        let mean = out.iter().map(|&v| f64::from(v)).sum::<f64>() / out.len() as f64;
        assert!((mean - 100.25).abs() < 0.05, "mean was {mean}");
        assert!(out.iter().all(|&v| v == 100 || v == 101));
    }

    #[test]
    fn test_channels_are_independent() {
        let image = vec![[100.4, 50.0, 0.0], [100.4, 50.0, 0.0]];
        let out = FloydSteinberg.dither(&image, 2, 1);
        assert_eq!(out[4], 50);
        assert_eq!(out[5], 0);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let image = vec![[-20.0, 300.0, 128.0]];
        assert_eq!(FloydSteinberg.dither(&image, 1, 1), vec![0, 255, 128]);
    }
}
