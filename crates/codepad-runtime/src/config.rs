use codepad_script::Limits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key values that mean "nobody configured this".
pub const PLACEHOLDER_KEYS: &[&str] = &["demo-key", "YOUR_API_KEY"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl RuntimeConfig {
    /// Applies `JUDGE0_API_KEY` and `JUDGE0_BASE_URL` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("JUDGE0_API_KEY") {
            self.remote.api_key = Some(key);
        }
        if let Some(url) = lookup("JUDGE0_BASE_URL") {
            self.remote.base_url = url;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://judge0-ce.p.rapidapi.com".to_string()
}

fn default_api_host() -> String {
    "judge0-ce.p.rapidapi.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_host: default_api_host(),
            api_key: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// The key, unless it is missing, blank or a placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !PLACEHOLDER_KEYS.contains(key))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    #[serde(default = "default_wall_clock_ms")]
    pub wall_clock_ms: u64,

    #[serde(default = "default_timer_ceiling_ms")]
    pub timer_ceiling_ms: u64,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_max_steps() -> u64 {
    Limits::default().max_steps
}

fn default_max_call_depth() -> usize {
    Limits::default().max_call_depth
}

fn default_wall_clock_ms() -> u64 {
    Limits::default().wall_clock.as_millis() as u64
}

fn default_timer_ceiling_ms() -> u64 {
    5000
}

fn default_max_output_bytes() -> usize {
    Limits::default().max_output_bytes
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_call_depth: default_max_call_depth(),
            wall_clock_ms: default_wall_clock_ms(),
            timer_ceiling_ms: default_timer_ceiling_ms(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl SandboxConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_steps: self.max_steps,
            max_call_depth: self.max_call_depth,
            wall_clock: Duration::from_millis(self.wall_clock_ms),
            timer_ceiling_ms: self.timer_ceiling_ms as f64,
            max_output_bytes: self.max_output_bytes,
            ..Limits::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_keys_are_unusable() {
        let mut remote = RemoteConfig::default();
        assert_eq!(remote.usable_api_key(), None);

        for key in ["", "  ", "demo-key", "YOUR_API_KEY"] {
            remote.api_key = Some(key.to_string());
            assert_eq!(remote.usable_api_key(), None, "{:?} should be rejected", key);
        }

        remote.api_key = Some("real-key".into());
        assert_eq!(remote.usable_api_key(), Some("real-key"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [remote]
            api_key = "abc"
            max_poll_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.api_key.as_deref(), Some("abc"));
        assert_eq!(config.remote.max_poll_attempts, 5);
        assert_eq!(config.remote.poll_interval_ms, 1000);
        assert_eq!(config.sandbox.timer_ceiling_ms, 5000);
    }

    #[test]
    fn test_overrides() {
        let mut config = RuntimeConfig::default();
        config.apply_overrides(|name| match name {
            "JUDGE0_API_KEY" => Some("from-env".into()),
            _ => None,
        });
        assert_eq!(config.remote.usable_api_key(), Some("from-env"));
        assert_eq!(config.remote.base_url, default_base_url());
    }
}
