//! Synthesis configuration from environment variables and an optional TOML file.

use serde::Deserialize;
use thiserror::Error;

use crate::runtime::ExecutionLimits;
use crate::synth::client::DEFAULT_API_BASE;

pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

pub const RETRY_LIMIT_VAR: &str = "AI_IMPLEMENT_RETRY_LIMIT";
pub const MODEL_VAR: &str = "CONJURE_MODEL";
pub const API_BASE_VAR: &str = "OPENAI_BASE_URL";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MAX_STEPS_VAR: &str = "CONJURE_MAX_STEPS";
pub const MAX_DEPTH_VAR: &str = "CONJURE_MAX_DEPTH";
pub const DIAGNOSTICS_VAR: &str = "CONJURE_DIAGNOSTICS";
pub const CONFIG_FILE_VAR: &str = "CONJURE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got `{value}`")]
    NotPositive { key: String, value: String },
    #[error("{key} must be a boolean, got `{value}`")]
    NotBoolean { key: String, value: String },
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub retry_limit: u32,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub limits: ExecutionLimits,
    /// Render ariadne reports for failed attempts into the log.
    pub diagnostics: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            limits: ExecutionLimits::default(),
            diagnostics: false,
        }
    }
}

/// Keys accepted in a config file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    retry_limit: Option<i64>,
    model: Option<String>,
    api_base: Option<String>,
    max_steps: Option<i64>,
    max_depth: Option<i64>,
    diagnostics: Option<bool>,
}

impl SynthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source; env-style keys
    /// override whatever the config file provides.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = SynthConfig::default();

        if let Some(path) = lookup(CONFIG_FILE_VAR).filter(|path| !path.is_empty()) {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            config.apply_file(parse_file(&contents)?)?;
        }

        if let Some(value) = lookup(RETRY_LIMIT_VAR) {
            config.retry_limit = positive(RETRY_LIMIT_VAR, &value)?;
        }
        if let Some(value) = lookup(MODEL_VAR).filter(|v| !v.trim().is_empty()) {
            config.model = value.trim().to_string();
        }
        if let Some(value) = lookup(API_BASE_VAR).filter(|v| !v.trim().is_empty()) {
            config.api_base = value.trim().to_string();
        }
        config.api_key = lookup(API_KEY_VAR).filter(|v| !v.is_empty());
        if let Some(value) = lookup(MAX_STEPS_VAR) {
            config.limits.max_steps = positive(MAX_STEPS_VAR, &value)?;
        }
        if let Some(value) = lookup(MAX_DEPTH_VAR) {
            config.limits.max_depth = positive(MAX_DEPTH_VAR, &value)?;
        }
        if let Some(value) = lookup(DIAGNOSTICS_VAR) {
            config.diagnostics = boolean(DIAGNOSTICS_VAR, &value)?;
        }
        Ok(config)
    }

    /// Parses a TOML config document on top of the defaults.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config = SynthConfig::default();
        config.apply_file(parse_file(contents)?)?;
        Ok(config)
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Result<Self, ConfigError> {
        if retry_limit == 0 {
            return Err(ConfigError::NotPositive {
                key: "retry_limit".to_string(),
                value: "0".to_string(),
            });
        }
        self.retry_limit = retry_limit;
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(limit) = file.retry_limit {
            self.retry_limit = positive("retry_limit", &limit.to_string())?;
        }
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(api_base) = file.api_base {
            self.api_base = api_base;
        }
        if let Some(steps) = file.max_steps {
            self.limits.max_steps = positive("max_steps", &steps.to_string())?;
        }
        if let Some(depth) = file.max_depth {
            self.limits.max_depth = positive("max_depth", &depth.to_string())?;
        }
        if let Some(diagnostics) = file.diagnostics {
            self.diagnostics = diagnostics;
        }
        Ok(())
    }
}

#[cfg(feature = "toml-config")]
fn parse_file(contents: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))
}

#[cfg(not(feature = "toml-config"))]
fn parse_file(_contents: &str) -> Result<FileConfig, ConfigError> {
    Err(ConfigError::Parse(format!(
        "{CONFIG_FILE_VAR} requires the `toml-config` feature"
    )))
}

fn positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(ConfigError::NotPositive {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn boolean(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::NotBoolean {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = SynthConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, SynthConfig::default());
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.model, "gpt-5-mini");
    }

    #[test]
    fn variables_override_defaults() {
        let config = SynthConfig::from_lookup(lookup(&[
            (RETRY_LIMIT_VAR, "5"),
            (MODEL_VAR, "local-model"),
            (MAX_DEPTH_VAR, "16"),
            (DIAGNOSTICS_VAR, "true"),
            (API_KEY_VAR, "sk-test"),
        ]))
        .expect("config");
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.model, "local-model");
        assert_eq!(config.limits.max_depth, 16);
        assert!(config.diagnostics);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn zero_or_garbage_retry_limit_is_rejected() {
        for bad in ["0", "-1", "three"] {
            let err = SynthConfig::from_lookup(lookup(&[(RETRY_LIMIT_VAR, bad)]))
                .expect_err("invalid retry limit");
            assert!(matches!(err, ConfigError::NotPositive { .. }), "{bad}");
        }
        assert!(SynthConfig::default().with_retry_limit(0).is_err());
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn toml_file_is_overridden_by_variables() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        std::io::Write::write_all(&mut file, b"retry_limit = 7\nmodel = \"from-file\"\n")
            .expect("write");
        let path = file.path().to_string_lossy().into_owned();
        let config = SynthConfig::from_lookup(lookup(&[
            (CONFIG_FILE_VAR, path.as_str()),
            (MODEL_VAR, "from-env"),
        ]))
        .expect("config");
        assert_eq!(config.retry_limit, 7);
        assert_eq!(config.model, "from-env");

        assert!(SynthConfig::from_toml_str("unknown = 1").is_err());
    }
}
