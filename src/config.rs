//! Configuration System
//!
//! Settings for the generation pipeline with environment variable overrides.
//! Defaults are usable as-is; a TOML file and `BINDERY_*` variables layer on
//! top in that order.

use crate::error::PipelineError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning knobs for the queue builder and generation worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Wall-clock budget per `generate()` call, in milliseconds. 0 means run
    /// to full queue exhaustion in one call.
    #[serde(default)]
    pub max_execution_time_ms: u64,

    /// Records per published chunk. 0 means a single unbounded chunk per
    /// variant.
    #[serde(default)]
    pub max_links_per_chunk: usize,

    /// Drop records whose dedup key was already accumulated for the variant.
    #[serde(default = "default_true")]
    pub remove_duplicates: bool,

    /// Elements buffered per bulk enqueue during a build.
    #[serde(default = "default_enqueue_batch_size")]
    pub enqueue_batch_size: usize,

    /// Lock lease used when no execution budget is configured, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub default_lock_timeout_ms: u64,

    /// Slack added on top of the execution budget when sizing the drain lease,
    /// in milliseconds.
    #[serde(default = "default_lock_grace_ms")]
    pub lock_grace_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_enqueue_batch_size() -> usize {
    5000
}

fn default_lock_timeout_ms() -> u64 {
    60_000
}

fn default_lock_grace_ms() -> u64 {
    15_000
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_execution_time_ms: 0,
            max_links_per_chunk: 0,
            remove_duplicates: default_true(),
            enqueue_batch_size: default_enqueue_batch_size(),
            default_lock_timeout_ms: default_lock_timeout_ms(),
            lock_grace_ms: default_lock_grace_ms(),
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.enqueue_batch_size == 0 {
            return Err(PipelineError::ConfigError(
                "enqueue_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BinderyConfig {
    /// Pipeline tuning
    #[serde(default)]
    pub settings: GenerationSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BinderyConfig {
    /// Load configuration: defaults, then the optional file, then `BINDERY_*`
    /// environment overrides (e.g. `BINDERY_SETTINGS__MAX_LINKS_PER_CHUNK`).
    pub fn load(file: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("BINDERY")
                .separator("__")
                .try_parsing(true),
        );
        let loaded: BinderyConfig = builder.build()?.try_deserialize()?;
        loaded.settings.validate()?;
        Ok(loaded)
    }
}
