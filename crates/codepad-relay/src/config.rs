use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PLACEHOLDER_ACCESS_KEYS: &[&str] = &["YOUR_WEB3FORMS_ACCESS_KEY_HERE"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Address appended to failure messages so visitors can still reach out.
    #[serde(default)]
    pub fallback_contact: Option<String>,
}

fn default_endpoint() -> String {
    "https://api.web3forms.com/submit".to_string()
}

fn default_from_name() -> String {
    "Portfolio Contact Form".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_key: None,
            from_name: default_from_name(),
            timeout_secs: default_timeout_secs(),
            fallback_contact: None,
        }
    }
}

impl RelayConfig {
    /// Applies `WEB3FORMS_ACCESS_KEY` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("WEB3FORMS_ACCESS_KEY") {
            self.access_key = Some(key);
        }
    }

    pub fn usable_access_key(&self) -> Option<&str> {
        self.access_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !PLACEHOLDER_ACCESS_KEYS.contains(key))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.endpoint, "https://api.web3forms.com/submit");
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.usable_access_key(), None);
    }

    #[test]
    fn test_placeholder_key_is_unusable() {
        let mut config = RelayConfig::default();
        config.apply_overrides(|_| Some("YOUR_WEB3FORMS_ACCESS_KEY_HERE".into()));
        assert_eq!(config.usable_access_key(), None);

        config.apply_overrides(|_| Some("0ce4-real".into()));
        assert_eq!(config.usable_access_key(), Some("0ce4-real"));
    }
}
