//! Error types for lattice parsing and dither mode selection.

use std::fmt;

/// A lattice source that cannot become a [`LatticeTable`](crate::LatticeTable).
///
/// No table is ever constructed from a partially parsed source; every
/// variant aborts construction.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// No `LUT_3D_SIZE` directive was found.
    MissingSize,
    /// The directive value is not a positive integer.
    InvalidSize {
        /// The raw tokens following the directive (empty if absent).
        value: String,
    },
    /// The size parsed but lies outside the supported range.
    UnsupportedSize {
        /// The requested lattice side length.
        size: usize,
    },
    /// The number of data rows does not equal `size³`.
    EntryCount {
        /// `size³`
        expected: usize,
        /// Rows actually accepted.
        actual: usize,
    },
    /// An entry handed to a constructor contains NaN or infinity.
    NonFiniteEntry {
        /// Position of the offending entry in storage order.
        index: usize,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::MissingSize => write!(f, "LUT_3D_SIZE directive not found"),
            FormatError::InvalidSize { value } => {
                write!(f, "LUT_3D_SIZE must be a positive integer, got {value:?}")
            }
            FormatError::UnsupportedSize { size } => write!(
                f,
                "LUT_3D_SIZE {size} outside supported range {}..={}",
                crate::LatticeTable::MIN_SIZE,
                crate::LatticeTable::MAX_SIZE
            ),
            FormatError::EntryCount { expected, actual } => {
                write!(f, "expected {expected} data rows, found {actual}")
            }
            FormatError::NonFiniteEntry { index } => {
                write!(f, "entry {index} contains a non-finite value")
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Unknown dither mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDitherModeError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for ParseDitherModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown dither mode {:?} (expected none, floyd or random)",
            self.input
        )
    }
}

impl std::error::Error for ParseDitherModeError {}
