//! Controller configuration: which token provider and models to use.
//!
//! Strict loaders ([`AisertConfig::from_file`] and friends) return errors.
//! [`ConfigSource::resolve`] never fails: a missing or malformed source is
//! logged and replaced by [`AisertConfig::default`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default embedding model for semantic checks.
pub const DEFAULT_SENTENCE_TRANSFORMER_MODEL: &str = "all-MiniLM-L6-v2";

/// Errors from the strict configuration loaders.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_sentence_transformer_model() -> String {
    DEFAULT_SENTENCE_TRANSFORMER_MODEL.to_string()
}

/// Provider and model selection for one chain controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AisertConfig {
    /// Token counting backend: "openai", "huggingface", "anthropic" or "google".
    pub model_provider: String,

    /// Provider-specific model identifier used for token counting.
    pub token_model: String,

    /// Encoding override (OpenAI only).
    #[serde(default)]
    pub token_encoding: Option<String>,

    /// Embedding model for semantic comparisons.
    #[serde(default = "default_sentence_transformer_model")]
    pub sentence_transformer_model: String,
}

impl Default for AisertConfig {
    fn default() -> Self {
        Self {
            model_provider: "openai".to_string(),
            token_model: "gpt-3.5-turbo".to_string(),
            token_encoding: None,
            sentence_transformer_model: default_sentence_transformer_model(),
        }
    }
}

impl AisertConfig {
    pub fn new(model_provider: impl Into<String>, token_model: impl Into<String>) -> Self {
        Self {
            model_provider: model_provider.into(),
            token_model: token_model.into(),
            ..Self::default()
        }
    }

    pub fn with_token_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.token_encoding = Some(encoding.into());
        self
    }

    pub fn with_sentence_transformer_model(mut self, model: impl Into<String>) -> Self {
        self.sentence_transformer_model = model.into();
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::checked(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::checked(serde_yaml::from_str(yaml)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Self::checked(serde_json::from_value(value)?)
    }

    /// Load from a file: YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    fn checked(config: Self) -> Result<Self, ConfigError> {
        if config.model_provider.trim().is_empty() {
            return Err(ConfigError::Invalid("model_provider must not be empty".into()));
        }
        if config.sentence_transformer_model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sentence_transformer_model must not be empty".into(),
            ));
        }
        Ok(config)
    }
}

/// Where a controller gets its configuration from, in priority order.
#[derive(Debug, Clone, Default)]
pub enum ConfigSource {
    /// A ready configuration, used as-is.
    Config(AisertConfig),

    /// An untyped mapping with the configuration fields.
    Value(Value),

    /// A JSON or YAML file.
    Path(PathBuf),

    /// Built-in defaults.
    #[default]
    Default,
}

impl ConfigSource {
    /// Produce a configuration, falling back to defaults on any failure.
    pub fn resolve(self) -> AisertConfig {
        match self {
            ConfigSource::Config(config) => config,
            ConfigSource::Value(value) => AisertConfig::from_value(value).unwrap_or_else(|e| {
                tracing::error!(error = %e, "invalid configuration value, using defaults");
                AisertConfig::default()
            }),
            ConfigSource::Path(path) => AisertConfig::from_file(&path).unwrap_or_else(|e| {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "failed to load configuration, using defaults"
                );
                AisertConfig::default()
            }),
            ConfigSource::Default => AisertConfig::default(),
        }
    }
}

impl From<AisertConfig> for ConfigSource {
    fn from(config: AisertConfig) -> Self {
        ConfigSource::Config(config)
    }
}

impl From<Option<AisertConfig>> for ConfigSource {
    fn from(config: Option<AisertConfig>) -> Self {
        config.map_or(ConfigSource::Default, ConfigSource::Config)
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        ConfigSource::Value(value)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::Path(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        ConfigSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ConfigSource {
    fn from(path: &str) -> Self {
        ConfigSource::Path(PathBuf::from(path))
    }
}
