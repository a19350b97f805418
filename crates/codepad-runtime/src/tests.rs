#[cfg(test)]
mod integration_tests {
    use crate::config::{RemoteConfig, RuntimeConfig};
    use crate::connectivity::ConnectivityMonitor;
    use crate::orchestrator::{Orchestrator, Strategy, FALLBACK_ADVISORY};
    use crate::result::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runtime_config(base_url: String) -> RuntimeConfig {
        RuntimeConfig {
            remote: RemoteConfig {
                base_url,
                api_key: Some("secret".into()),
                poll_interval_ms: 5,
                max_poll_attempts: 5,
                ..RemoteConfig::default()
            },
            ..RuntimeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_remote_run_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submissions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": "abc"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/submissions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"id": 4, "description": "Runtime Error (NZEC)"},
                "stderr": "ZeroDivisionError: division by zero"
            })))
            .mount(&server)
            .await;

        let monitor = ConnectivityMonitor::new(true);
        let orchestrator =
            Orchestrator::from_config(&runtime_config(server.uri()), monitor.handle()).unwrap();

        let execution = orchestrator.execute("print(1/0)", "python").await;
        assert_eq!(execution.strategy, Strategy::Remote);
        assert_eq!(execution.result.error(), Some(ErrorKind::Runtime));
        assert_eq!(
            execution.result.output(),
            "❌ Runtime Error:\nZeroDivisionError: division by zero"
        );
        assert_eq!(execution.result.status(), Some("Runtime Error (NZEC)"));
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        // Nothing listens on the discard port.
        let config = runtime_config("http://127.0.0.1:9".into());
        let orchestrator =
            Orchestrator::from_config(&config, ConnectivityMonitor::new(true).handle()).unwrap();

        let execution = orchestrator.execute("print(\"hello\")", "python").await;
        assert_eq!(execution.strategy, Strategy::Simulated);
        assert_eq!(execution.advisory.as_deref(), Some(FALLBACK_ADVISORY));
        assert!(execution.result.output().contains("\nhello\n"));
    }

    #[tokio::test]
    async fn test_failed_poll_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submissions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": "abc"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/submissions/abc"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = Orchestrator::from_config(
            &runtime_config(server.uri()),
            ConnectivityMonitor::new(true).handle(),
        )
        .unwrap();

        let execution = orchestrator.execute("print(\"hello\")", "python").await;
        assert_eq!(execution.strategy, Strategy::Simulated);
        assert_eq!(execution.advisory.as_deref(), Some(FALLBACK_ADVISORY));
        assert!(execution.result.is_success());
        assert!(execution.result.output().contains("\nhello\n"));
    }

    #[tokio::test]
    async fn test_going_offline_switches_to_simulation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let monitor = ConnectivityMonitor::new(true);
        let orchestrator =
            Orchestrator::from_config(&runtime_config(server.uri()), monitor.handle()).unwrap();
        monitor.set_online(false);

        let execution = orchestrator.execute("fmt.Println(\"hi\")", "go").await;
        assert_eq!(execution.strategy, Strategy::Simulated);
        assert_eq!(execution.advisory, None);
        assert!(execution.result.is_success());
    }

    #[tokio::test]
    async fn test_sandbox_limits_come_from_config() {
        let mut config = RuntimeConfig::default();
        config.sandbox.max_steps = 10_000;
        let orchestrator =
            Orchestrator::from_config(&config, ConnectivityMonitor::new(false).handle()).unwrap();

        let execution = orchestrator.execute("while (true) {}", "javascript").await;
        assert_eq!(execution.strategy, Strategy::Local);
        assert_eq!(execution.result.error(), Some(ErrorKind::ExecutionFailed));
    }
}
