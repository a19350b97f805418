use codepad_relay::RelayConfig;
use codepad_runtime::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Everything `config/codepad.toml` can hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodepadConfig {
    #[serde(flatten)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub relay: RelayConfig,
}

impl CodepadConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: CodepadConfig = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Reads `config/codepad.toml` under the working directory, falling back
    /// to defaults when there is none.
    pub fn from_project_root() -> anyhow::Result<Self> {
        let config_path = std::env::current_dir()?.join("config").join("codepad.toml");

        if !config_path.exists() {
            debug!("No {} found, using defaults", config_path.display());
            let mut config = Self::default();
            config.apply_env();
            return Ok(config);
        }

        Self::from_file(&config_path)
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::from_file(path)
            }
            None => Self::from_project_root(),
        }
    }

    fn apply_env(&mut self) {
        self.runtime.apply_env();
        self.relay.apply_env();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: CodepadConfig = toml::from_str(
            r#"
            [remote]
            api_key = "judge-key"
            poll_interval_ms = 500

            [sandbox]
            max_steps = 1000

            [relay]
            access_key = "relay-key"
            fallback_contact = "me@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.remote.usable_api_key(), Some("judge-key"));
        assert_eq!(config.runtime.remote.poll_interval_ms, 500);
        assert_eq!(config.runtime.sandbox.max_steps, 1000);
        assert_eq!(config.relay.usable_access_key(), Some("relay-key"));
        assert_eq!(config.relay.timeout_secs, 15);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: CodepadConfig = toml::from_str("").unwrap();
        assert_eq!(config.runtime.remote.max_poll_attempts, 30);
        assert_eq!(config.relay.endpoint, "https://api.web3forms.com/submit");
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = CodepadConfig::load(Some(Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
