use crate::form::FieldError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid form: {}", describe(.0))]
    Invalid(Vec<FieldError>),

    #[error("Web3Forms access key not configured. Please add WEB3FORMS_ACCESS_KEY to your environment variables.")]
    NotConfigured,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Http(u16),

    #[error("{0}")]
    Rejected(String),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::Timeout
        } else {
            RelayError::Network(e)
        }
    }
}

impl RelayError {
    /// The apology shown under the form, optionally pointing at a direct
    /// contact address.
    pub fn user_message(&self, fallback_contact: Option<&str>) -> String {
        if let RelayError::Invalid(_) = self {
            return self.to_string();
        }

        let mut message = String::from("Sorry, there was an error sending your message. ");
        match self {
            RelayError::Timeout => message.push_str(
                "The request timed out. Please check your internet connection and try again.",
            ),
            RelayError::Network(_) => message
                .push_str("Network error. Please check your internet connection and try again."),
            RelayError::NotConfigured => message.push_str(
                "Configuration error: Please contact the site administrator to configure the contact form.",
            ),
            RelayError::Http(_) => message.push_str("Server error. Please try again later."),
            RelayError::Rejected(reason) => message.push_str(&format!("Error: {}", reason)),
            RelayError::Invalid(_) => {}
        }

        if let Some(contact) = fallback_contact {
            message.push_str(&format!(" You can also contact me directly at {}.", contact));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            RelayError::Http(502).user_message(None),
            "Sorry, there was an error sending your message. Server error. Please try again later."
        );
        assert_eq!(
            RelayError::Rejected("Invalid access key".into()).user_message(Some("me@example.com")),
            "Sorry, there was an error sending your message. Error: Invalid access key You can also contact me directly at me@example.com."
        );
        assert!(RelayError::NotConfigured
            .user_message(None)
            .contains("Configuration error"));
        assert!(RelayError::Timeout.user_message(None).contains("timed out"));
    }
}
