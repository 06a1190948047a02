//! lattice-lut: 3D color lookup tables for photo grading
//!
//! This crate holds the numeric core of a LUT transform: parsing the
//! plain-text lattice format, trilinear interpolation, blending the graded
//! color back toward the original, and the dither stage that reduces the
//! continuous result to 8-bit output.
//!
//! # Quick Start
//!
//! ```
//! use lattice_lut::{blend, DitherMode, LatticeTable};
//!
//! let text = "LUT_3D_SIZE 2\n\
//!     0 0 0\n1 0 0\n0 1 0\n1 1 0\n\
//!     0 0 1\n1 0 1\n0 1 1\n1 1 1\n";
//! let table = LatticeTable::parse(text).unwrap();
//!
//! let graded = table.lookup(0.25, 0.5, 0.75);
//! let mixed = blend([64.0, 128.0, 192.0], graded.map(|c| c * 255.0), 100);
//! let bytes = DitherMode::None.apply(&[mixed], 1, 1);
//! assert_eq!(bytes.len(), 3);
//! ```
//!
//! # Pipeline
//!
//! ```text
//! 8-bit pixel  -> normalize to [0,1]
//!              -> LatticeTable::lookup (trilinear)
//!              -> blend(original, graded, strength)   (0..255 domain)
//!              -> DitherMode::apply                   (quantize to u8)
//! ```
//!
//! The crate does no file or image I/O; callers hand it text and pixel
//! buffers.

mod blend;
pub mod dither;
mod error;
mod lattice;


pub use blend::{blend, blend_ratio, strength_ratio};
pub use dither::{Dither, DitherMode, FloydSteinberg, Passthrough, RandomDither};
pub use error::{FormatError, ParseDitherModeError};
pub use lattice::LatticeTable;
