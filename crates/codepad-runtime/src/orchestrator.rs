use crate::config::RuntimeConfig;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::language::{self, LOCAL_TAG};
use crate::local::LocalExecutor;
use crate::remote::{Judge0Client, RemoteExecutor, RemoteRequest};
use crate::result::{ErrorKind, ExecutionResult};
use crate::simulator::simulate;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const FALLBACK_ADVISORY: &str = "API connection failed - falling back to simulation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Local,
    Remote,
    Simulated,
}

/// What one call to [`Orchestrator::execute`] produced.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub result: ExecutionResult,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    /// False when the run was stopped or superseded before it finished.
    pub applied: bool,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct RunState {
    generation: u64,
    active: bool,
    /// Generation the user last stopped.
    stopped: Option<u64>,
    displayed: Option<ExecutionResult>,
    cancel: CancellationToken,
}

pub struct Orchestrator {
    local: LocalExecutor,
    remote: Arc<dyn RemoteExecutor>,
    connectivity: Connectivity,
    state: Mutex<RunState>,
}

impl Orchestrator {
    pub fn new(
        local: LocalExecutor,
        remote: Arc<dyn RemoteExecutor>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            local,
            remote,
            connectivity,
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn from_config(config: &RuntimeConfig, connectivity: Connectivity) -> Result<Self> {
        let remote = Judge0Client::new(config.remote.clone())?;
        Ok(Self::new(
            LocalExecutor::new(config.sandbox.limits()),
            Arc::new(remote),
            connectivity,
        ))
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `source` with the first applicable strategy. Always resolves.
    pub async fn execute(&self, source: &str, language: &str) -> Execution {
        let tag = language::normalize_tag(language);
        let (generation, cancel) = self.begin();
        info!("Run {} started for {}", generation, tag);

        let (result, strategy, advisory) = self.dispatch(source, &tag, &cancel).await;

        let (result, applied) = self.finish(generation, result);
        info!(
            "Run {} finished via {:?}: success={} applied={}",
            generation,
            strategy,
            result.is_success(),
            applied
        );

        Execution {
            result,
            strategy,
            advisory,
            applied,
            generation,
        }
    }

    async fn dispatch(
        &self,
        source: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> (ExecutionResult, Strategy, Option<String>) {
        if tag == LOCAL_TAG {
            let result = tokio::select! {
                _ = cancel.cancelled() => ExecutionResult::stopped(),
                result = self.local.run(source) => result,
            };
            return (result, Strategy::Local, None);
        }

        let descriptor = language::lookup(tag);
        match descriptor {
            Some(descriptor) if self.connectivity.is_online() => {
                let request = RemoteRequest {
                    source: source.to_string(),
                    remote_id: descriptor.remote_id,
                };
                let result = self.remote.run(request, cancel.clone()).await;
                if result.error() == Some(ErrorKind::Transport) {
                    warn!("{}", FALLBACK_ADVISORY);
                    return (
                        simulate(source, tag),
                        Strategy::Simulated,
                        Some(FALLBACK_ADVISORY.to_string()),
                    );
                }
                (result, Strategy::Remote, None)
            }
            _ => {
                debug!(
                    "Simulating {} (online={}, registered={})",
                    tag,
                    self.connectivity.is_online(),
                    descriptor.is_some()
                );
                (simulate(source, tag), Strategy::Simulated, None)
            }
        }
    }

    /// Opens a new generation and cancels whatever run was still in flight.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut state = self.state();
        if state.active {
            debug!("Superseding run {}", state.generation);
        }
        state.cancel.cancel();
        state.generation += 1;
        state.cancel = CancellationToken::new();
        state.active = true;
        (state.generation, state.cancel.clone())
    }

    fn finish(&self, generation: u64, result: ExecutionResult) -> (ExecutionResult, bool) {
        let mut state = self.state();
        if state.stopped == Some(generation) {
            return (ExecutionResult::stopped(), false);
        }
        if generation != state.generation {
            debug!("Discarding stale result from run {}", generation);
            return (ExecutionResult::superseded(), false);
        }
        state.active = false;
        state.displayed = Some(result.clone());
        (result, true)
    }

    /// Stops the active run. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let mut state = self.state();
        if !state.active {
            return false;
        }
        info!("Run {} stopped by user", state.generation);
        state.active = false;
        state.stopped = Some(state.generation);
        state.cancel.cancel();
        state.displayed = Some(ExecutionResult::stopped());
        true
    }

    pub fn is_running(&self) -> bool {
        self.state().active
    }

    /// The result currently shown to the user, if any.
    pub fn displayed(&self) -> Option<ExecutionResult> {
        self.state().displayed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemoteExecutor;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use super::Strategy;
    use std::time::Duration;

    fn orchestrator(remote: MockRemoteExecutor, online: bool) -> Orchestrator {
        Orchestrator::new(
            LocalExecutor::default(),
            Arc::new(remote),
            Connectivity::fixed(online),
        )
    }

    /// Ignores cancellation and answers late, like a poll that was already
    /// in flight.
    struct SlowRemote;

    #[async_trait]
    impl RemoteExecutor for SlowRemote {
        async fn run(&self, _request: RemoteRequest, _cancel: CancellationToken) -> ExecutionResult {
            tokio::time::sleep(Duration::from_millis(150)).await;
            ExecutionResult::success("late").with_status("Accepted")
        }
    }

    #[tokio::test]
    async fn test_javascript_runs_locally() {
        let mut remote = MockRemoteExecutor::new();
        remote.expect_run().times(0);
        let orchestrator = orchestrator(remote, true);

        let execution = orchestrator.execute("console.log(6 * 7)", "JavaScript").await;
        assert_eq!(execution.strategy, Strategy::Local);
        assert_eq!(execution.result.output(), "42");
        assert!(execution.applied);
        assert_eq!(orchestrator.displayed(), Some(execution.result));
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_online_registered_language_goes_remote() {
        let mut remote = MockRemoteExecutor::new();
        remote
            .expect_run()
            .withf(|request, _| request.remote_id == 71 && request.source == "print(1)")
            .times(1)
            .returning(|_, _| ExecutionResult::success("1").with_status("Accepted"));
        let orchestrator = orchestrator(remote, true);

        let execution = orchestrator.execute("print(1)", "python").await;
        assert_eq!(execution.strategy, Strategy::Remote);
        assert_eq!(execution.result.output(), "1");
        assert_eq!(execution.advisory, None);
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_to_simulation() {
        let mut remote = MockRemoteExecutor::new();
        remote.expect_run().times(1).returning(|_, _| {
            ExecutionResult::failure(ErrorKind::Transport, "❌ API Error:\nNetwork error")
        });
        let orchestrator = orchestrator(remote, true);

        let execution = orchestrator.execute("print('hi')", "python").await;
        assert_eq!(execution.strategy, Strategy::Simulated);
        assert_eq!(execution.advisory.as_deref(), Some(FALLBACK_ADVISORY));
        assert!(execution.result.is_success());
        assert_eq!(execution.result.status(), Some("Simulated"));
    }

    #[tokio::test]
    async fn test_other_remote_failures_are_reported() {
        let mut remote = MockRemoteExecutor::new();
        remote.expect_run().times(1).returning(|_, _| {
            ExecutionResult::failure(ErrorKind::Configuration, "❌ API Configuration Error")
        });
        let orchestrator = orchestrator(remote, true);

        let execution = orchestrator.execute("puts 1", "ruby").await;
        assert_eq!(execution.strategy, Strategy::Remote);
        assert_eq!(execution.result.error(), Some(ErrorKind::Configuration));
        assert_eq!(execution.advisory, None);
    }

    #[tokio::test]
    async fn test_unregistered_language_is_simulated_even_online() {
        let mut remote = MockRemoteExecutor::new();
        remote.expect_run().times(0);
        let orchestrator = orchestrator(remote, true);

        let execution = orchestrator.execute("DISPLAY 'HI'", "cobol").await;
        assert_eq!(execution.strategy, Strategy::Simulated);
        assert!(execution.result.is_success());
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let orchestrator = orchestrator(MockRemoteExecutor::new(), false);
        let execution = orchestrator.execute("console.log('done')", "javascript").await;

        assert!(!orchestrator.cancel());
        assert_eq!(orchestrator.displayed(), Some(execution.result));
    }

    #[tokio::test]
    async fn test_cancel_discards_late_result() {
        let orchestrator = Arc::new(Orchestrator::new(
            LocalExecutor::default(),
            Arc::new(SlowRemote),
            Connectivity::fixed(true),
        ));

        let running = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute("print(1)", "python").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(orchestrator.is_running());
        assert!(orchestrator.cancel());

        let execution = running.await.unwrap();
        assert!(!execution.applied);
        assert_eq!(execution.result.error(), Some(ErrorKind::UserCancelled));
        assert_eq!(orchestrator.displayed(), Some(ExecutionResult::stopped()));
    }

    #[tokio::test]
    async fn test_superseded_run_never_overwrites_newer_result() {
        let orchestrator = Arc::new(Orchestrator::new(
            LocalExecutor::default(),
            Arc::new(SlowRemote),
            Connectivity::fixed(true),
        ));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute("print(1)", "python").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        let second = orchestrator.execute("console.log('second')", "javascript").await;
        assert!(second.applied);

        let first = first.await.unwrap();
        assert!(!first.applied);
        assert!(first.generation < second.generation);
        assert_eq!(first.result.error(), Some(ErrorKind::Superseded));
        assert_eq!(orchestrator.displayed().map(|r| r.output().to_string()), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_superseded_local_run_is_not_reported_as_stopped() {
        let orchestrator = Arc::new(orchestrator(MockRemoteExecutor::new(), false));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute("while (true) {}", "javascript").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        let second = orchestrator.execute("console.log('fast')", "javascript").await;
        let first = first.await.unwrap();

        assert!(!first.applied);
        assert_eq!(first.result.error(), Some(ErrorKind::Superseded));
        assert_eq!(second.result.output(), "fast");
        assert_eq!(orchestrator.displayed(), Some(second.result));
    }

    #[tokio::test]
    async fn test_stopped_run_stays_stopped_after_a_new_run() {
        let orchestrator = Arc::new(Orchestrator::new(
            LocalExecutor::default(),
            Arc::new(SlowRemote),
            Connectivity::fixed(true),
        ));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute("print(1)", "python").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(orchestrator.cancel());
        orchestrator.execute("console.log('next')", "javascript").await;

        let first = first.await.unwrap();
        assert_eq!(first.result.error(), Some(ErrorKind::UserCancelled));
    }

    proptest! {
        #[test]
        fn offline_non_local_languages_are_simulated(
            language in "[a-z+#]{1,10}",
            source in "[ -~]{0,80}",
        ) {
            prop_assume!(language::normalize_tag(&language) != LOCAL_TAG);
            let orchestrator = orchestrator(MockRemoteExecutor::new(), false);

            let execution = tokio_test::block_on(orchestrator.execute(&source, &language));
            prop_assert_eq!(execution.strategy, Strategy::Simulated);
            prop_assert!(execution.result.is_success());
            prop_assert_eq!(execution.result.status(), Some("Simulated"));
        }
    }
}
