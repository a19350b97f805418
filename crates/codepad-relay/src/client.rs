use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::form::ContactForm;
use reqwest::multipart;
use serde::Deserialize;
use tracing::{info, warn};

pub const SUCCESS_MESSAGE: &str =
    "Thank you for your message! I'll get back to you within 24 hours.";

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Forwards validated contact forms to a Web3Forms-compatible endpoint.
pub struct RelayClient {
    http: reqwest::Client,
    config: RelayConfig,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Validates and submits the form, returning the confirmation to show.
    pub async fn submit(&self, form: &ContactForm) -> Result<String> {
        form.validate().map_err(RelayError::Invalid)?;
        let access_key = self
            .config
            .usable_access_key()
            .ok_or(RelayError::NotConfigured)?;

        let form = form.trimmed();
        let body = multipart::Form::new()
            .text("access_key", access_key.to_string())
            .text("name", form.name)
            .text("email", form.email)
            .text("subject", form.subject)
            .text("message", form.message)
            .text("from_name", self.config.from_name.clone())
            .text("redirect", "false");

        let response = self
            .http
            .post(&self.config.endpoint)
            .multipart(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Form relay answered {}", status);
            return Err(RelayError::Http(status.as_u16()));
        }

        let reply: RelayResponse = response.json().await?;
        if reply.success {
            info!("Contact form delivered");
            Ok(SUCCESS_MESSAGE.to_string())
        } else {
            let reason = reply
                .message
                .unwrap_or_else(|| "Failed to send message".to_string());
            warn!("Form relay rejected submission: {}", reason);
            Err(RelayError::Rejected(reason))
        }
    }
}
