use chrono::{DateTime, Utc};
use lattice_lut::DitherMode;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Parameters applied to every image of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunParameters {
    /// 0 = original, 100 = fully graded
    pub strength: u8,
    /// JPEG quality 1..=100
    pub quality: u8,
    pub dither: DitherMode,
}

impl RunParameters {
    pub fn new(strength: u8, quality: u8, dither: DitherMode) -> Result<Self, ConfigError> {
        if strength > 100 {
            return Err(ConfigError::OutOfRange {
                field: "strength",
                value: i64::from(strength),
                min: 0,
                max: 100,
            });
        }
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::OutOfRange {
                field: "quality",
                value: i64::from(quality),
                min: 1,
                max: 100,
            });
        }
        Ok(Self {
            strength,
            quality,
            dither,
        })
    }
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            strength: 60,
            quality: 90,
            dither: DitherMode::None,
        }
    }
}

/// History entry for a successfully processed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRecord {
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    /// File name of the LUT used
    pub lut_name: String,
    pub params: RunParameters,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bounds() {
        assert!(RunParameters::new(0, 1, DitherMode::None).is_ok());
        assert!(RunParameters::new(100, 100, DitherMode::Random).is_ok());
    }

    #[test]
    fn test_rejects_strength_over_100() {
        let err = RunParameters::new(101, 90, DitherMode::None).unwrap_err();
        assert_eq!(err.to_string(), "strength must be in 0..=100, got 101");
    }

    #[test]
    fn test_rejects_zero_quality() {
        assert!(matches!(
            RunParameters::new(50, 0, DitherMode::None),
            Err(ConfigError::OutOfRange {
                field: "quality",
                ..
            })
        ));
    }

    #[test]
    fn test_serializes_dither_name() {
        let params = RunParameters::new(50, 80, DitherMode::FloydSteinberg).unwrap();
        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json["dither"], "floyd");
        assert_eq!(json["strength"], 50);
    }
}
