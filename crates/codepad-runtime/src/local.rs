use crate::error::RuntimeError;
use crate::result::{format_millis, ErrorKind, ExecutionResult};
use codepad_script::{Channel, Completion, Limits};
use std::time::Instant;
use tracing::{debug, info};

pub const NO_OUTPUT: &str = "✅ Code executed successfully (no console output)";

/// Runs JavaScript in the capability-gated interpreter.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    limits: Limits,
}

impl LocalExecutor {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub async fn run(&self, source: &str) -> ExecutionResult {
        let source = source.to_string();
        let limits = self.limits.clone();

        debug!("Running {} bytes of JavaScript locally", source.len());
        let started = Instant::now();
        let completion =
            tokio::task::spawn_blocking(move || codepad_script::run(&source, &limits)).await;
        let time = format_millis(started.elapsed().as_secs_f64() * 1000.0);

        match completion {
            Ok(completion) => {
                let result = classify(completion).with_time(time);
                info!(
                    "Local execution finished: success={} time={}",
                    result.is_success(),
                    result.time().unwrap_or("-")
                );
                result
            }
            Err(e) => ExecutionResult::failure(
                ErrorKind::ExecutionFailed,
                format!("❌ {}", RuntimeError::Worker(e.to_string())),
            )
            .with_time(time)
            .with_status("Error"),
        }
    }
}

/// Turns an interpreter transcript into a result: an uncaught fault wins,
/// then anything written to `console.error`, then the regular output.
pub(crate) fn classify(completion: Completion) -> ExecutionResult {
    if let Some(fault) = completion.fault {
        return ExecutionResult::failure(ErrorKind::ExecutionFailed, format!("❌ {}", fault))
            .with_status("Error");
    }

    let mut logs = Vec::new();
    let mut errors = Vec::new();
    for line in completion.console {
        match line.channel {
            Channel::Log | Channel::Debug => logs.push(line.text),
            Channel::Info => logs.push(format!("ℹ️ {}", line.text)),
            Channel::Warn => logs.push(format!("⚠️ {}", line.text)),
            Channel::Error => errors.push(format!("❌ {}", line.text)),
        }
    }

    if !errors.is_empty() {
        return ExecutionResult::failure(ErrorKind::Runtime, errors.join("\n"))
            .with_status("Runtime Error");
    }

    let output = if logs.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        logs.join("\n")
    };
    ExecutionResult::success(output).with_status("Completed")
}
