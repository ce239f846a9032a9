//! Process configuration.
//!
//! Layered the usual way: built-in defaults, an optional TOML file, then
//! `ARGUS__`-prefixed environment variables
//! (`ARGUS__REPOSITORY__BASE_DIRECTORY` -> `repository.base_directory`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Media repository settings
    pub repository: RepositoryConfig,
    /// Camera configuration database settings
    pub cameras: CameraDbConfig,
    /// External video encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    /// Root of the on-disk media tree; created if missing
    pub base_directory: PathBuf,
    /// Retention for generated timelapses, e.g. "14d" or "24h"
    #[serde(default = "default_retention_period")]
    pub retention_period: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraDbConfig {
    /// Path of the sqlite camera/settings database
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    /// Program invoked to assemble timelapse videos
    #[serde(default = "default_encoder_program")]
    pub program: String,
}

fn default_retention_period() -> String {
    "14d".to_string()
}

fn default_encoder_program() -> String {
    "mencoder".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: default_encoder_program(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, config files, and environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .set_default("repository.retention_period", default_retention_period())?
            .set_default("encoder.program", default_encoder_program())?
            .add_source(config::File::with_name("config/argus").required(false))
            .add_source(config::File::with_name("/etc/argus/argus").required(false))
            .add_source(
                config::Environment::with_prefix("ARGUS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Retention period for generated media as a Duration.
    pub fn retention(&self) -> Result<Duration> {
        humantime::parse_duration(&self.repository.retention_period).context(format!(
            "invalid retention period '{}'",
            self.repository.retention_period
        ))
    }
}
