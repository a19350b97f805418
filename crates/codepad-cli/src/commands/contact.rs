use crate::config::CodepadConfig;
use anyhow::Result;
use codepad_relay::{ContactForm, RelayClient, RelayError};
use tracing::info;

pub async fn execute(
    name: String,
    email: String,
    subject: String,
    message: String,
    config: CodepadConfig,
) -> Result<bool> {
    let form = ContactForm::new(name, email, subject, message);
    let client = RelayClient::new(config.relay)?;

    info!("Sending contact form to {}", client.config().endpoint);
    match client.submit(&form).await {
        Ok(confirmation) => {
            println!("✅ {}", confirmation);
            Ok(true)
        }
        Err(RelayError::Invalid(errors)) => {
            for error in errors {
                eprintln!("  - {}", error);
            }
            Ok(false)
        }
        Err(e) => {
            eprintln!(
                "❌ {}",
                e.user_message(client.config().fallback_contact.as_deref())
            );
            Ok(false)
        }
    }
}
