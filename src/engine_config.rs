//! Layered engine configuration: built-in defaults, an optional config file
//! under the user's config directory, then `WEBPILOT_*` environment
//! variables, each layer overriding the previous.

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;
use webpilot_locator::ResolvePolicy;

#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    /// How DOM and vision evidence are combined during element resolution.
    pub policy: ResolvePolicy,
    /// Attempts per action before a step is declared failed.
    pub retries: u32,
    /// Settle delay between workflow steps.
    pub step_delay_ms: u64,
    /// Where the task collection is persisted.
    pub data_dir: PathBuf,
    /// Default tracing filter, overridable with `RUST_LOG`.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: ResolvePolicy::HtmlFirst,
            retries: 3,
            step_delay_ms: 1000,
            data_dir: default_data_dir(),
            log_filter: "info".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("webpilot")
}

fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("webpilot").join("config.toml"))
}

impl EngineConfig {
    /// Load the layered configuration. A missing config file is fine; a
    /// malformed one is not.
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("policy", defaults.policy.name())?
            .set_default("retries", defaults.retries as i64)?
            .set_default("step_delay_ms", defaults.step_delay_ms as i64)?
            .set_default(
                "data_dir",
                defaults.data_dir.to_string_lossy().to_string(),
            )?
            .set_default("log_filter", defaults.log_filter.clone())?;
        if let Some(path) = config_file() {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder
            .add_source(Environment::with_prefix("WEBPILOT"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.policy, ResolvePolicy::HtmlFirst);
        assert_eq!(config.retries, 3);
        assert_eq!(config.step_delay_ms, 1000);
        assert!(config.data_dir.ends_with("webpilot"));
    }
}
