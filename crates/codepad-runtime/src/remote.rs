use crate::config::RemoteConfig;
use crate::error::{Result, RuntimeError};
use crate::result::{format_millis, ErrorKind, ExecutionResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const NOT_CONFIGURED_OUTPUT: &str =
    "❌ API Configuration Error\nJudge0 API key not configured properly.";
pub const SERVICE_TIMEOUT_OUTPUT: &str =
    "❌ Execution Timeout\nThe code execution service took too long to respond.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub source: String,
    pub remote_id: u32,
}

/// Seam between the orchestrator and whatever executes non-local languages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Never fails: every outcome, including transport faults and
    /// cancellation, is folded into the returned result.
    async fn run(&self, request: RemoteRequest, cancel: CancellationToken) -> ExecutionResult;
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    language_id: u32,
    source_code: &'a str,
    stdin: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionStatus {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

/// A poll response for one submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSubmission {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub memory: Option<u64>,
}

impl RemoteSubmission {
    /// Queued (1) and processing (2) are the only non-terminal states.
    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(|status| status.id > 2)
    }
}

enum PollOutcome {
    Finished(RemoteSubmission),
    Exhausted,
    Cancelled,
}

/// Client for a Judge0-compatible execution service.
pub struct Judge0Client {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl Judge0Client {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn submit(&self, api_key: &str, request: &RemoteRequest) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint("submissions"))
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.config.api_host)
            .json(&SubmitRequest {
                language_id: request.remote_id,
                source_code: &request.source,
                stdin: "",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Submit {
                status: status.as_u16(),
                body,
            });
        }

        let body: SubmitResponse = response.json().await?;
        body.token
            .filter(|token| !token.is_empty())
            .ok_or(RuntimeError::MissingToken)
    }

    async fn fetch(&self, api_key: &str, token: &str) -> Result<RemoteSubmission> {
        let response = self
            .http
            .get(self.endpoint(&format!("submissions/{}", token)))
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.config.api_host)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::Poll(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    async fn poll(&self, api_key: &str, token: &str, cancel: &CancellationToken) -> Result<PollOutcome> {
        let interval = self.config.poll_interval();

        for attempt in 1..=self.config.max_poll_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }

            let submission = self.fetch(api_key, token).await?;
            debug!(
                "Poll {} for {}: status {:?}",
                attempt,
                token,
                submission.status.as_ref().map(|s| s.id)
            );
            if submission.is_terminal() {
                return Ok(PollOutcome::Finished(submission));
            }
        }

        Ok(PollOutcome::Exhausted)
    }

    async fn execute(
        &self,
        api_key: &str,
        request: &RemoteRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let token = tokio::select! {
            _ = cancel.cancelled() => return Ok(ExecutionResult::stopped()),
            token = self.submit(api_key, request) => token?,
        };
        info!("Submitted code for language {} (token {})", request.remote_id, token);

        Ok(match self.poll(api_key, &token, cancel).await? {
            PollOutcome::Finished(submission) => translate(&submission),
            PollOutcome::Cancelled => ExecutionResult::stopped(),
            PollOutcome::Exhausted => {
                warn!(
                    "Gave up on {} after {} polls",
                    token, self.config.max_poll_attempts
                );
                ExecutionResult::failure(ErrorKind::ServiceTimeout, SERVICE_TIMEOUT_OUTPUT)
                    .with_status("Timeout")
            }
        })
    }
}

#[async_trait]
impl RemoteExecutor for Judge0Client {
    async fn run(&self, request: RemoteRequest, cancel: CancellationToken) -> ExecutionResult {
        let Some(api_key) = self.config.usable_api_key() else {
            warn!("Remote execution requested without a usable API key");
            return ExecutionResult::failure(ErrorKind::Configuration, NOT_CONFIGURED_OUTPUT)
                .with_status("Configuration Error");
        };

        match self.execute(api_key, &request, &cancel).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Remote execution failed: {}", e);
                ExecutionResult::failure(
                    ErrorKind::Transport,
                    format!("❌ API Error:\n{}", e.user_message()),
                )
                .with_status("API Error")
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Maps a terminal submission onto the result model.
pub fn translate(submission: &RemoteSubmission) -> ExecutionResult {
    let (id, description) = match &submission.status {
        Some(status) => (status.id, status.description.clone()),
        None => (0, "Unknown".to_string()),
    };

    let result = match id {
        3 => {
            let mut result = ExecutionResult::success(
                non_empty(&submission.stdout).unwrap_or("✅ Code executed successfully (no output)"),
            );
            if let Some(seconds) = submission.time.as_deref().and_then(|t| t.parse::<f64>().ok()) {
                result = result.with_time(format_millis(seconds * 1000.0));
            }
            if let Some(memory) = submission.memory {
                result = result.with_memory(format!("{} KB", memory));
            }
            result
        }
        6 => ExecutionResult::failure(
            ErrorKind::Compilation,
            format!(
                "❌ Compilation Error:\n{}",
                non_empty(&submission.compile_output).unwrap_or("Unknown compilation error")
            ),
        ),
        5 => ExecutionResult::failure(
            ErrorKind::ResourceLimit,
            "❌ Time Limit Exceeded\nYour code took too long to execute (max 10 seconds).",
        ),
        4 => ExecutionResult::failure(
            ErrorKind::Runtime,
            format!(
                "❌ Runtime Error:\n{}",
                non_empty(&submission.stderr).unwrap_or("Unknown runtime error")
            ),
        ),
        7 => ExecutionResult::failure(
            ErrorKind::ResourceLimit,
            "❌ Memory Limit Exceeded\nYour code used too much memory.",
        ),
        8 => ExecutionResult::failure(
            ErrorKind::ResourceLimit,
            "❌ Output Limit Exceeded\nYour code produced too much output.",
        ),
        _ => ExecutionResult::failure(
            ErrorKind::Runtime,
            format!(
                "❌ Execution Error ({}):\n{}",
                description,
                non_empty(&submission.stderr)
                    .or(non_empty(&submission.compile_output))
                    .unwrap_or("Unknown error")
            ),
        ),
    };

    result.with_status(description)
}
