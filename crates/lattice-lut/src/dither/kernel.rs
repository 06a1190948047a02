//! Error diffusion kernel definitions.

/// An error diffusion kernel.
///
/// Each entry is an offset `(dx, dy)` from the current pixel and a weight
/// numerator; a neighbor receives `error * weight / divisor`. `dy` is never
/// negative, and `dx` is negative only on rows below the current one, so
/// every target is a pixel not yet visited by a left-to-right scan.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    /// (dx, dy, weight) entries.
    pub entries: &'static [(i32, i32, u8)],

    /// Divisor applied to every weight.
    pub divisor: u8,

    /// Largest `dy` in `entries`; the error buffer keeps `max_dy + 1` rows.
    pub max_dy: usize,
}

/// Floyd-Steinberg kernel: 100% propagation (16/16) to four neighbors.
///
/// ```text
///        X   7
///    3   5   1
/// ```
pub const FLOYD_STEINBERG: Kernel = Kernel {
    entries: &[
        (1, 0, 7),  // right
        (-1, 1, 3), // bottom-left
        (0, 1, 5),  // bottom
        (1, 1, 1),  // bottom-right
    ],
    divisor: 16,
    max_dy: 1,
};

impl Kernel {
    /// In-bounds targets of pixel `(x, y)` as `(target_x, row_offset, fraction)`.
    ///
    /// Neighbors that fall outside the image are omitted; their share of the
    /// error is dropped rather than wrapped or reflected.
    pub fn targets(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        let divisor = f32::from(self.divisor);
        self.entries.iter().filter_map(move |&(dx, dy, weight)| {
            let nx = x as i64 + i64::from(dx);
            let ny = y + dy as usize;
            if nx < 0 || nx as usize >= width || ny >= height {
                return None;
            }
            Some((nx as usize, dy as usize, f32::from(weight) / divisor))
        })
    }
}
