//! Uniform random noise dithering.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{quantize, Dither};

/// Half-width of the noise added to each channel, in 8-bit units.
pub const NOISE_AMPLITUDE: f32 = 0.5;

/// Adds independent uniform noise in `[-0.5, 0.5)` to every channel of every
/// pixel, then rounds and clamps. No error is carried between pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDither {
    seed: Option<u64>,
}

impl RandomDither {
    /// Noise drawn from an entropy-seeded generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reproducible noise for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl Dither for RandomDither {
    fn dither(&self, image: &[[f32; 3]], width: usize, height: usize) -> Vec<u8> {
        debug_assert_eq!(image.len(), width * height);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut output = Vec::with_capacity(image.len() * 3);
        for px in image {
            for &c in px {
                let noise = rng.gen_range(-NOISE_AMPLITUDE..NOISE_AMPLITUDE);
                output.push(quantize(c + noise) as u8);
            }
        }
        output
    }
}
