//! Strength blending between the original and the graded color.

/// Map a 0..=100 strength onto a 0..=1 ratio. Values above 100 saturate.
#[inline]
pub fn strength_ratio(strength: u8) -> f32 {
    f32::from(strength.min(100)) / 100.0
}

/// Per-channel `original * (1 - s) + transformed * s` with `s = strength / 100`.
///
/// Strength 0 returns `original` and strength 100 returns `transformed`
/// bit-for-bit; the result moves monotonically from one to the other in
/// between.
#[inline]
pub fn blend(original: [f32; 3], transformed: [f32; 3], strength: u8) -> [f32; 3] {
    blend_ratio(original, transformed, strength_ratio(strength))
}

/// [`blend`] with an explicit ratio in `[0, 1]`.
#[inline]
pub fn blend_ratio(original: [f32; 3], transformed: [f32; 3], s: f32) -> [f32; 3] {
    let keep = 1.0 - s;
    [
        original[0] * keep + transformed[0] * s,
        original[1] * keep + transformed[1] * s,
        original[2] * keep + transformed[2] * s,
    ]
}
