//! Configuration module
//!
//! Staging directories, reaper timing, image bounds and PDF engine discovery
//! settings, loaded from the environment.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    ARTIFACT_TTL_SECS, MAX_IMAGE_DIMENSION, PDF_ENGINE_CANDIDATES, PDF_RENDER_TIMEOUT_SECS,
    REAPER_INTERVAL_SECS,
};

const UPLOAD_DIR: &str = "./data/uploads";
const OUTPUT_DIR: &str = "./data/outputs";

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    artifact_ttl_secs: u64,
    reaper_interval_secs: u64,
    max_image_dimension: u32,
    pdf_engine_candidates: Vec<String>,
    pdf_render_timeout_secs: u64,
    environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(UPLOAD_DIR),
            output_dir: PathBuf::from(OUTPUT_DIR),
            artifact_ttl_secs: ARTIFACT_TTL_SECS,
            reaper_interval_secs: REAPER_INTERVAL_SECS,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            pdf_engine_candidates: PDF_ENGINE_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pdf_render_timeout_secs: PDF_RENDER_TIMEOUT_SECS,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Missing or
    /// unparsable numeric values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let parse_u64 = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let pdf_engine_candidates = match lookup("SQUASH_PDF_ENGINE_CANDIDATES") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.pdf_engine_candidates.clone(),
        };

        let config = Config {
            upload_dir: lookup("SQUASH_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: lookup("SQUASH_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            artifact_ttl_secs: parse_u64("SQUASH_ARTIFACT_TTL_SECS", defaults.artifact_ttl_secs),
            reaper_interval_secs: parse_u64(
                "SQUASH_REAPER_INTERVAL_SECS",
                defaults.reaper_interval_secs,
            ),
            max_image_dimension: lookup("SQUASH_MAX_DIMENSION")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(defaults.max_image_dimension),
            pdf_engine_candidates,
            pdf_render_timeout_secs: parse_u64(
                "SQUASH_PDF_RENDER_TIMEOUT_SECS",
                defaults.pdf_render_timeout_secs,
            ),
            environment: lookup("ENVIRONMENT")
                .or_else(|| lookup("APP_ENV"))
                .unwrap_or(defaults.environment),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.artifact_ttl_secs == 0 {
            return Err(anyhow::anyhow!("SQUASH_ARTIFACT_TTL_SECS must be greater than 0"));
        }

        if self.reaper_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "SQUASH_REAPER_INTERVAL_SECS must be greater than 0"
            ));
        }

        if self.max_image_dimension == 0 {
            return Err(anyhow::anyhow!("SQUASH_MAX_DIMENSION must be greater than 0"));
        }

        if self.upload_dir == self.output_dir {
            return Err(anyhow::anyhow!(
                "SQUASH_UPLOAD_DIR and SQUASH_OUTPUT_DIR must be different directories"
            ));
        }

        if self.pdf_engine_candidates.is_empty() {
            return Err(anyhow::anyhow!(
                "SQUASH_PDF_ENGINE_CANDIDATES must name at least one executable"
            ));
        }

        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifact_ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn max_image_dimension(&self) -> u32 {
        self.max_image_dimension
    }

    pub fn pdf_engine_candidates(&self) -> &[String] {
        &self.pdf_engine_candidates
    }

    pub fn pdf_render_timeout(&self) -> Duration {
        Duration::from_secs(self.pdf_render_timeout_secs)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}
