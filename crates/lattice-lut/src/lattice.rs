//! The 3D lattice table and its trilinear lookup.

use crate::error::FormatError;

/// Lattice coordinates closer than this to an integer snap onto it, so that
/// inputs of the form `i / (n - 1)` reproduce stored entries exactly even
/// when the float division does not round-trip.
const SNAP_EPSILON: f32 = 1e-4;

const SIZE_DIRECTIVE: &str = "LUT_3D_SIZE";

/// An `n × n × n` lattice of output colors.
///
/// Storage enumerates `b` slowest, `g` in the middle and `r` fastest, which
/// is the row order of the text format: entry `(r, g, b)` lives at
/// `r + g * n + b * n²`.
///
/// Entries are finite but not clamped; values outside `[0, 1]` are kept as
/// loaded. A table is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeTable {
    size: usize,
    data: Vec<[f32; 3]>,
}

impl LatticeTable {
    /// Smallest accepted side length.
    pub const MIN_SIZE: usize = 2;
    /// Largest accepted side length (256³ entries, 192 MiB of floats).
    pub const MAX_SIZE: usize = 256;

    /// Parse the lattice text format.
    ///
    /// ```text
    /// # comment
    /// LUT_3D_SIZE <n>
    /// r g b      (n³ rows, b-outer / g-middle / r-inner)
    /// ```
    ///
    /// Blank lines and `#` comments are ignored everywhere. Lines before the
    /// size directive (titles, domain keywords) are ignored. After it, every
    /// line with exactly three numeric tokens is a data row; any other line
    /// is skipped. The accepted row count must equal `n³`.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        let size = lines
            .by_ref()
            .find(|line| line.split_whitespace().next() == Some(SIZE_DIRECTIVE))
            .ok_or(FormatError::MissingSize)
            .and_then(parse_size)?;

        let data: Vec<[f32; 3]> = lines.filter_map(parse_row).collect();

        let expected = size * size * size;
        if data.len() != expected {
            return Err(FormatError::EntryCount {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { size, data })
    }

    /// Build a table from entries already in storage order.
    pub fn from_entries(size: usize, data: Vec<[f32; 3]>) -> Result<Self, FormatError> {
        check_size(size)?;
        let expected = size * size * size;
        if data.len() != expected {
            return Err(FormatError::EntryCount {
                expected,
                actual: data.len(),
            });
        }
        if let Some(index) = data
            .iter()
            .position(|entry| entry.iter().any(|c| !c.is_finite()))
        {
            return Err(FormatError::NonFiniteEntry { index });
        }
        Ok(Self { size, data })
    }

    /// Build a table by evaluating `f(r, g, b)` at every lattice point.
    ///
    /// The arguments are integer lattice coordinates in `0..size`.
    pub fn from_fn(
        size: usize,
        mut f: impl FnMut(usize, usize, usize) -> [f32; 3],
    ) -> Result<Self, FormatError> {
        check_size(size)?;
        let mut data = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    data.push(f(r, g, b));
                }
            }
        }
        Self::from_entries(size, data)
    }

    /// A table mapping every lattice point onto its own coordinates.
    pub fn identity(size: usize) -> Result<Self, FormatError> {
        check_size(size)?;
        let max = (size - 1) as f32;
        Self::from_fn(size, |r, g, b| [r as f32 / max, g as f32 / max, b as f32 / max])
    }

    /// Lattice side length `n`.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Stored entry at integer coordinates, or `None` when out of range.
    pub fn entry(&self, r: usize, g: usize, b: usize) -> Option<[f32; 3]> {
        if r < self.size && g < self.size && b < self.size {
            Some(self.at(r, g, b))
        } else {
            None
        }
    }

    /// All entries in storage order.
    pub fn entries(&self) -> &[[f32; 3]] {
        &self.data
    }

    /// Trilinear interpolation at a normalized color.
    ///
    /// Each channel is clamped to `[0, 1]` and scaled onto the lattice. The
    /// low corner is the floor of that coordinate and the high corner the
    /// next lattice point, both clamped into `[0, n-1]`; the fractional
    /// parts weight the eight surrounding entries, blending along `r`, then
    /// `g`, then `b`. Exact lattice inputs return the stored entry
    /// unchanged, and the result never leaves the range spanned by the
    /// eight corners.
    pub fn lookup(&self, r: f32, g: f32, b: f32) -> [f32; 3] {
        let (r0, r1, dr) = self.axis(r);
        let (g0, g1, dg) = self.axis(g);
        let (b0, b1, db) = self.axis(b);

        let c000 = self.at(r0, g0, b0);
        let c100 = self.at(r1, g0, b0);
        let c010 = self.at(r0, g1, b0);
        let c110 = self.at(r1, g1, b0);
        let c001 = self.at(r0, g0, b1);
        let c101 = self.at(r1, g0, b1);
        let c011 = self.at(r0, g1, b1);
        let c111 = self.at(r1, g1, b1);

        // along r
        let c00 = lerp(c000, c100, dr);
        let c10 = lerp(c010, c110, dr);
        let c01 = lerp(c001, c101, dr);
        let c11 = lerp(c011, c111, dr);

        // along g
        let c0 = lerp(c00, c10, dg);
        let c1 = lerp(c01, c11, dg);

        // along b
        lerp(c0, c1, db)
    }

    /// Lookup for an 8-bit pixel.
    #[inline]
    pub fn lookup_u8(&self, rgb: [u8; 3]) -> [f32; 3] {
        self.lookup(
            f32::from(rgb[0]) / 255.0,
            f32::from(rgb[1]) / 255.0,
            f32::from(rgb[2]) / 255.0,
        )
    }

    #[inline]
    fn at(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.data[r + g * self.size + b * self.size * self.size]
    }

    /// Split a normalized channel into (low index, high index, fraction).
    #[inline]
    fn axis(&self, value: f32) -> (usize, usize, f32) {
        let last = self.size - 1;
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };

        let mut pos = value * last as f32;
        let nearest = pos.round();
        if (pos - nearest).abs() < SNAP_EPSILON {
            pos = nearest;
        }

        let low = (pos.floor() as usize).min(last);
        let high = (low + 1).min(last);
        (low, high, pos - low as f32)
    }
}

#[inline]
fn lerp(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] * (1.0 - t) + b[0] * t,
        a[1] * (1.0 - t) + b[1] * t,
        a[2] * (1.0 - t) + b[2] * t,
    ]
}

fn check_size(size: usize) -> Result<(), FormatError> {
    if (LatticeTable::MIN_SIZE..=LatticeTable::MAX_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(FormatError::UnsupportedSize { size })
    }
}

/// The directive line must be `LUT_3D_SIZE` followed by exactly one token.
fn parse_size(line: &str) -> Result<usize, FormatError> {
    let value: Vec<&str> = line.split_whitespace().skip(1).collect();
    let size = match value.as_slice() {
        [token] => token.parse::<usize>().ok().filter(|&n| n > 0),
        _ => None,
    }
    .ok_or_else(|| FormatError::InvalidSize {
        value: value.join(" "),
    })?;
    check_size(size)?;
    Ok(size)
}

/// A data row: exactly three finite numbers. Anything else is skipped.
fn parse_row(line: &str) -> Option<[f32; 3]> {
    let mut tokens = line.split_whitespace();
    let mut row = [0.0_f32; 3];
    for slot in row.iter_mut() {
        let value: f32 = tokens.next()?.parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        *slot = value;
    }
    if tokens.next().is_some() {
        return None;
    }
    Some(row)
}
