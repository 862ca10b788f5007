//! # Configuration
//!
//! `larder.toml` parsed with serde. Every field has a default, so an empty or
//! missing file is valid; CLI flags override file values.
//!
//! ```toml
//! [data]
//! catalog = "recipes.json"
//! knowledge = "kb.redb"      # or a JSON file; omitted = derived from catalog
//! dataset = "history.csv"
//! prior = "prior.json"       # omitted = built-in expert network
//! model = "model.lrdr"       # persisted posterior network
//!
//! [inference]
//! mode = "posterior"
//! pseudo_count = 1.0
//!
//! [resolver]
//! time_tolerance = 0.5
//! ```

use larder_core::primitives::DEFAULT_PSEUDO_COUNT;
use larder_core::{InferenceMode, LarderError, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "larder.toml";

/// Maximum configuration file size (64 KB).
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LarderConfig {
    pub data: DataConfig,
    pub inference: InferenceConfig,
    pub resolver: ResolverConfig,
}

/// Collaborator file locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub catalog: PathBuf,
    pub knowledge: Option<PathBuf>,
    pub dataset: Option<PathBuf>,
    pub prior: Option<PathBuf>,
    pub model: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("recipes.json"),
            knowledge: None,
            dataset: None,
            prior: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub mode: InferenceMode,
    pub pseudo_count: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            mode: InferenceMode::Prior,
            pseudo_count: DEFAULT_PSEUDO_COUNT,
        }
    }
}

impl LarderConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `larder.toml` in the working
    /// directory is used if present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, LarderError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    tracing::debug!("no {} found; using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LarderError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            LarderError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(LarderError::IoError(format!(
                "Config '{}' exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LarderError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&contents)?;

        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, LarderError> {
        toml::from_str(contents)
            .map_err(|e| LarderError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), LarderError> {
        let alpha = self.inference.pseudo_count;
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(LarderError::InvalidModel(format!(
                "inference.pseudo_count must be positive, got {}",
                alpha
            )));
        }
        let tolerance = self.resolver.time_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(LarderError::InvalidCatalog(format!(
                "resolver.time_tolerance must be non-negative, got {}",
                tolerance
            )));
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, mode: Option<InferenceMode>) {
        if let Some(mode) = mode {
            self.inference.mode = mode;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
