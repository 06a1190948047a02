use std::path::PathBuf;
use std::time::Duration;

use lattice_lut::FormatError;
use thiserror::Error;

/// Loading a LUT file failed. Either kind aborts the run before any item
/// is created.
#[derive(Debug, Error)]
pub enum LutError {
    #[error("Failed to read LUT {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed LUT {path}: {source}")]
    Format { path: PathBuf, source: FormatError },
}

/// Failure of a single work item. Recorded as the item's reason and never
/// propagated to siblings.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("source missing")]
    SourceMissing(PathBuf),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl ProcessingError {
    /// True for the decode/encode/read/write family.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            ProcessingError::Read { .. }
                | ProcessingError::Decode { .. }
                | ProcessingError::Encode { .. }
                | ProcessingError::Write { .. }
        )
    }
}

/// Run configuration that is missing or invalid before a run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Output directory not configured")]
    MissingOutputDir,

    #[error("No LUT selected")]
    MissingLut,

    #[error("Watch directory not configured")]
    MissingWatchDir,

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("LUT file not found: {0}")]
    LutNotFound(PathBuf),

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Watch directory {0} is also the output directory")]
    WatchIsOutput(PathBuf),

    #[error("{field} must be in {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid dither mode: {0}")]
    Dither(#[from] lattice_lut::ParseDitherModeError),

    #[error("Failed to read config {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("No run configured")]
    NotConfigured,
}

/// Preparing a run failed: bad configuration or an unusable LUT.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lut(#[from] LutError),
}
