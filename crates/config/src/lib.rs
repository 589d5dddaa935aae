//! Configuration loading, validation, and management for Mindloop.
//!
//! Loads configuration from `~/.mindloop/config.toml` with serde defaults
//! for every field, so an empty (or missing) file yields a runnable setup.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `~/.mindloop/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Recall defaults applied to every tier.
    #[serde(default)]
    pub recall: RecallSettings,

    /// Language-model provider settings.
    #[serde(default)]
    pub model: ModelSettings,

    /// Embedding-model provider settings.
    #[serde(default)]
    pub embedder: EmbedderSettings,
}

/// Default per-tier retrieval parameters. Hooks can override both per
/// request; these are the starting values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallSettings {
    /// Result count per tier.
    #[serde(default = "default_k")]
    pub k: usize,

    /// Minimum similarity score for a hit to count.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_k() -> usize {
    3
}
fn default_threshold() -> f32 {
    0.7
}

impl Default for RecallSettings {
    fn default() -> Self {
        Self {
            k: default_k(),
            threshold: default_threshold(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Backend name (resolved by the provider factory outside this core).
    #[serde(default = "default_model_provider")]
    pub provider: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model_provider() -> String {
    "offline".into()
}
fn default_model_name() -> String {
    "offline-echo".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: default_model_provider(),
            model: default_model_name(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbedderSettings {
    #[serde(default = "default_embedder_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Vector dimensionality the store was built for. A change here without
    /// a store reset is the classic source of recall incompatibility.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embedder_provider() -> String {
    "offline".into()
}
fn default_dimension() -> usize {
    384
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            provider: default_embedder_provider(),
            api_key: None,
            dimension: default_dimension(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("recall", &self.recall)
            .field("model", &self.model)
            .field("embedder", &self.embedder)
            .finish()
    }
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl std::fmt::Debug for EmbedderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedderSettings")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl AppConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recall.k == 0 {
            return Err(ConfigError::Invalid("recall.k must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.recall.threshold) {
            return Err(ConfigError::Invalid(format!(
                "recall.threshold must be within [0, 1], got {}",
                self.recall.threshold
            )));
        }
        if self.embedder.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedder.dimension must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be within [0, 2], got {}",
                self.model.temperature
            )));
        }
        Ok(())
    }
}
