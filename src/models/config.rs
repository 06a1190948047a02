use lattice_lut::DitherMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::RunParameters;

/// Application configuration loaded from a YAML file.
///
/// Every field is optional in the file. Paths left unset here can still be
/// supplied on the command line; they are only required once a run starts.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Directory observed for newly arriving images
    pub watch_dir: Option<PathBuf>,

    /// Directory processed images are written into
    pub output_dir: Option<PathBuf>,

    /// LUT file applied to every image of a run
    pub lut: Option<PathBuf>,

    /// Blend strength, 0 (original) to 100 (fully graded)
    pub strength: u8,

    /// JPEG quality, 1 to 100
    pub quality: u8,

    /// Quantization mode
    pub dither: DitherMode,

    /// How long a detected file must sit before it is processed
    pub settle_delay_ms: u64,

    /// How long a completed item stays visible before it is pruned
    pub completed_grace_ms: u64,

    /// Number of processed records kept in history
    pub history_capacity: usize,

    /// Detection items processed at the same time
    pub max_concurrent: usize,

    /// Buffered events per subscriber
    pub event_capacity: usize,

    /// Per-item processing limit in seconds (0 disables)
    pub process_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_dir: None,
            output_dir: None,
            lut: None,
            strength: 60,
            quality: 90,
            dither: DitherMode::None,
            settle_delay_ms: 1000,
            completed_grace_ms: 2000,
            history_capacity: 100,
            max_concurrent: 2,
            event_capacity: 64,
            process_timeout_secs: 300,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path` when given, otherwise from `LUTWATCH_CONFIG`, otherwise
    /// fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os("LUTWATCH_CONFIG").map(PathBuf::from);
        match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load(&path),
            None => {
                tracing::debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Timing and sizing knobs for the orchestrator.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            completed_grace: Duration::from_millis(self.completed_grace_ms),
            history_capacity: self.history_capacity,
            max_concurrent: self.max_concurrent.max(1),
            event_capacity: self.event_capacity.max(1),
            process_timeout: (self.process_timeout_secs > 0)
                .then(|| Duration::from_secs(self.process_timeout_secs)),
        }
    }

    /// Validate the run-level fields and snapshot them.
    ///
    /// Fails if the output directory or LUT is unset, or if a numeric
    /// parameter is out of range. Existence of paths is checked when the run
    /// is configured.
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        let output_dir = self.output_dir.clone().ok_or(ConfigError::MissingOutputDir)?;
        let lut_path = self.lut.clone().ok_or(ConfigError::MissingLut)?;
        let params = RunParameters::new(self.strength, self.quality, self.dither)?;
        Ok(RunConfig {
            lut_path,
            output_dir,
            params,
        })
    }
}

/// Everything a run needs besides the images themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub lut_path: PathBuf,
    pub output_dir: PathBuf,
    pub params: RunParameters,
}

/// Orchestrator timing and capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub settle_delay: Duration,
    pub completed_grace: Duration,
    pub history_capacity: usize,
    pub max_concurrent: usize,
    pub event_capacity: usize,
    pub process_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        AppConfig::default().pipeline_settings()
    }
}
