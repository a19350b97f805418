use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("API Error {status}: {body}")]
    Submit { status: u16, body: String },

    #[error("Result fetch error: {0}")]
    Poll(u16),

    #[error("No execution token received from API")]
    MissingToken,

    #[error("Sandbox worker failed: {0}")]
    Worker(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuntimeError {
    /// The sentence shown to the user after `API Error:`.
    pub fn user_message(&self) -> String {
        match self {
            RuntimeError::Http(e) if e.is_connect() || e.is_timeout() => {
                "Network error - please check your internet connection".to_string()
            }
            RuntimeError::Submit { status: 429, .. } | RuntimeError::Poll(429) => {
                "Rate limit exceeded - please wait a moment and try again".to_string()
            }
            RuntimeError::Submit {
                status: 401 | 403, ..
            }
            | RuntimeError::Poll(401 | 403) => {
                "API authentication failed - please contact support".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let limited = RuntimeError::Submit {
            status: 429,
            body: "slow down".into(),
        };
        assert!(limited.user_message().starts_with("Rate limit exceeded"));
        assert!(RuntimeError::Poll(401)
            .user_message()
            .starts_with("API authentication failed"));

        let other = RuntimeError::Submit {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(other.user_message(), "API Error 500: boom");
        assert_eq!(
            RuntimeError::MissingToken.user_message(),
            "No execution token received from API"
        );
    }
}
