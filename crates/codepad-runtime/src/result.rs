use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a run did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Configuration,
    Transport,
    Runtime,
    Compilation,
    ResourceLimit,
    ServiceTimeout,
    ExecutionFailed,
    UserCancelled,
    Superseded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Compilation => "compilation",
            ErrorKind::ResourceLimit => "resource-limit",
            ErrorKind::ServiceTimeout => "service-timeout",
            ErrorKind::ExecutionFailed => "execution-failed",
            ErrorKind::UserCancelled => "user-cancelled",
            ErrorKind::Superseded => "superseded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const STOPPED_OUTPUT: &str = "⏹️ Execution stopped by user";
pub const SUPERSEDED_OUTPUT: &str = "⏭️ Execution replaced by a newer run";

/// The single shape every execution strategy produces.
///
/// Fields are private so that a successful result can never carry an
/// error kind; build one with [`ExecutionResult::success`] or
/// [`ExecutionResult::failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    success: bool,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            time: None,
            memory: None,
            status: None,
        }
    }

    pub fn failure(kind: ErrorKind, output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(kind),
            time: None,
            memory: None,
            status: None,
        }
    }

    /// The result shown in place of a run the user stopped.
    pub fn stopped() -> Self {
        Self::failure(ErrorKind::UserCancelled, STOPPED_OUTPUT).with_status("Stopped")
    }

    /// The result handed back to a run that a newer run replaced.
    pub fn superseded() -> Self {
        Self::failure(ErrorKind::Superseded, SUPERSEDED_OUTPUT).with_status("Superseded")
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn memory(&self) -> Option<&str> {
        self.memory.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// Formats a duration in milliseconds to two decimals, e.g. `12.34ms`.
pub fn format_millis(millis: f64) -> String {
    format!("{:.2}ms", millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_has_no_error() {
        let result = ExecutionResult::success("42").with_time("1.00ms");
        assert!(result.is_success());
        assert_eq!(result.error(), None);
        assert_eq!(result.time(), Some("1.00ms"));
    }

    #[test]
    fn test_serialized_shape() {
        let result = ExecutionResult::failure(ErrorKind::ResourceLimit, "too slow")
            .with_status("Time Limit Exceeded");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "output": "too slow",
                "error": "resource-limit",
                "status": "Time Limit Exceeded"
            })
        );
    }

    #[test]
    fn test_stopped() {
        let result = ExecutionResult::stopped();
        assert_eq!(result.output(), STOPPED_OUTPUT);
        assert_eq!(result.error(), Some(ErrorKind::UserCancelled));
        assert_eq!(result.status(), Some("Stopped"));
    }

    #[test]
    fn test_superseded_is_not_a_user_stop() {
        let result = ExecutionResult::superseded();
        assert_eq!(result.error(), Some(ErrorKind::Superseded));
        assert_eq!(result.status(), Some("Superseded"));
        assert_eq!(
            serde_json::to_value(&result).unwrap()["error"],
            serde_json::json!("superseded")
        );
    }
}
