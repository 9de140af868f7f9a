//! Configuration module for ethnicolr
//!
//! This module handles:
//! - Artifact locations (model and census data directories)
//! - Inference defaults (iterations, confidence, seed)
//! - SHA-256 pins for artifacts

mod user_config;

pub use user_config::{
    InferenceConfig, PathsConfig, UserConfig, DATA_DIR_ENV, MODEL_DIR_ENV, SEED_ENV,
};
pub(crate) use user_config::write_example;
