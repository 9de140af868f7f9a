//! User-level configuration for ethnicolr
//!
//! Supports loading config from:
//! - Environment variables
//! - ~/.config/ethnicolr/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::artifacts::Checksums;

pub const MODEL_DIR_ENV: &str = "ETHNICOLR_MODEL_DIR";
pub const DATA_DIR_ENV: &str = "ETHNICOLR_DATA_DIR";
pub const SEED_ENV: &str = "ETHNICOLR_SEED";

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    /// Artifact path relative to the model directory → expected SHA-256
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding the exported models (census/, wiki/, fl_voter_reg/, nc_voter_reg/)
    pub models: Option<PathBuf>,

    /// Directory holding census/census_2000.csv and census/census_2010.csv
    pub data: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct InferenceConfig {
    /// Stochastic passes for interval estimates
    pub iterations: Option<usize>,

    /// Default confidence level; unset means each model's own default
    pub confidence: Option<f64>,

    /// Seed for dropout masks
    pub seed: Option<u64>,
}

impl UserConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. User config (~/.config/ethnicolr/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = match Self::user_config_path().filter(|p| p.exists()) {
            Some(path) => Self::from_file(&path)?,
            None => UserConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse one config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str::<UserConfig>(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ethnicolr").join("config.toml"))
    }

    /// Override from environment; `lookup` is `std::env::var` outside tests
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(MODEL_DIR_ENV).filter(|v| !v.is_empty()) {
            self.paths.models = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            self.paths.data = Some(PathBuf::from(dir));
        }
        if let Some(seed) = lookup(SEED_ENV) {
            match seed.trim().parse() {
                Ok(seed) => self.inference.seed = Some(seed),
                Err(_) => tracing::warn!("ignoring {}={:?}: not an unsigned integer", SEED_ENV, seed),
            }
        }
    }

    /// Model directory: configured, else `<data_dir>/ethnicolr/models`, else `./models`
    pub fn model_dir(&self) -> PathBuf {
        self.paths.models.clone().unwrap_or_else(|| default_dir("models"))
    }

    /// Census data directory: configured, else `<data_dir>/ethnicolr/data`, else `./data`
    pub fn data_dir(&self) -> PathBuf {
        self.paths.data.clone().unwrap_or_else(|| default_dir("data"))
    }

    pub fn iterations(&self) -> usize {
        self.inference
            .iterations
            .unwrap_or(crate::catalog::DEFAULT_ITERATIONS)
    }

    pub fn seed(&self) -> u64 {
        self.inference
            .seed
            .unwrap_or(crate::classifier::adapter::DEFAULT_SEED)
    }

    /// Checksum pins resolved against the model directory
    pub fn checksums(&self) -> Checksums {
        Checksums::from_relative(&self.model_dir(), &self.checksums)
    }
}

fn default_dir(leaf: &str) -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("ethnicolr").join(leaf))
        .unwrap_or_else(|| PathBuf::from(leaf))
}

pub(crate) const EXAMPLE_CONFIG: &str = r#"# ethnicolr user configuration

[paths]
# Exported models (census/, wiki/, fl_voter_reg/, nc_voter_reg/ subdirectories)
# models = "/opt/ethnicolr/models"

# Census surname tables (census/census_2000.csv, census/census_2010.csv)
# data = "/opt/ethnicolr/data"

[inference]
# Stochastic passes when a confidence level below 1.0 is requested
# iterations = 100

# Confidence level; 1.0 gives point estimates
# confidence = 0.9

# Seed for dropout masks
# seed = 42

[checksums]
# Pin artifacts by SHA-256, paths relative to the model directory
# "wiki/lstm/wiki_ln_lstm.json" = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
"#;

/// Write the example config unless a file already exists; returns whether it wrote
pub(crate) fn write_example(config_path: &Path) -> Result<bool> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if config_path.exists() {
        return Ok(false);
    }
    std::fs::write(config_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UserConfig::default();
        assert_eq!(config.iterations(), 100);
        assert_eq!(config.seed(), 42);
        assert!(config.checksums().is_empty());
        assert!(config.model_dir().ends_with("models"));
        assert!(config.data_dir().ends_with("data"));
    }

    #[test]
    fn test_example_config_parses() {
        let config: UserConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
[paths]
models = "/srv/models"

[inference]
iterations = 50
confidence = 0.95

[checksums]
"wiki/lstm/wiki_race.csv" = "ABCDEF"
"#;
        let config: UserConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model_dir(), PathBuf::from("/srv/models"));
        assert_eq!(config.iterations(), 50);
        assert_eq!(config.inference.confidence, Some(0.95));
        assert_eq!(config.checksums.len(), 1);
        assert!(!config.checksums().is_empty());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [[ not valid toml {{{}}}").unwrap();
        let err = UserConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config: UserConfig = toml::from_str("[paths]\nmodels = \"/from/file\"\n").unwrap();
        config.apply_env(|key| match key {
            MODEL_DIR_ENV => Some("/from/env".to_string()),
            SEED_ENV => Some("7".to_string()),
            _ => None,
        });
        assert_eq!(config.model_dir(), PathBuf::from("/from/env"));
        assert_eq!(config.seed(), 7);
    }

    #[test]
    fn test_bad_env_seed_is_ignored() {
        let mut config = UserConfig::default();
        config.apply_env(|key| (key == SEED_ENV).then(|| "abc".to_string()));
        assert_eq!(config.seed(), 42);
    }

    #[test]
    fn test_write_example_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(write_example(&path).unwrap());
        std::fs::write(&path, "# mine\n").unwrap();
        assert!(!write_example(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
    }

    #[test]
    fn test_user_config_path_returns_some() {
        if let Some(p) = UserConfig::user_config_path() {
            assert!(p.ends_with("ethnicolr/config.toml"));
        }
    }
}
