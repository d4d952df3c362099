//! Health checks against a mock inference API.

use ai_lib_orchestrator::config::ApiKey;
use ai_lib_orchestrator::telemetry::{HealthProbe, HttpProbe};
use ai_lib_orchestrator::{Error, HealthStatus, Orchestrator, OrchestratorConfig, StandardErrorCode};
use mockito::{Mock, Server, ServerGuard};
use std::time::Duration;

/// Mock API plus an orchestrator pointed at it.
struct MockApiFixture {
    server: ServerGuard,
    base_url: String,
}

impl MockApiFixture {
    async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    async fn mock_models(&mut self, status: usize) -> Mock {
        self.server
            .mock("GET", "/v1/models")
            .match_header("authorization", "Bearer sk-test")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            OrchestratorConfig::new()
                .with_api_key("sk-test")
                .with_api_base_url(&self.base_url)
                .with_health_probe_timeout(Duration::from_secs(2))
                .with_monitoring(false, "warn"),
        )
        .unwrap()
    }
}

#[tokio::test]
async fn test_reachable_api_is_healthy() {
    let mut fixture = MockApiFixture::new().await;
    let mock = fixture.mock_models(200).await;
    let orch = fixture.orchestrator();

    let report = orch.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.details.api_reachable);
    assert_eq!(report.details.probe, "http");
    assert_eq!(report.details.checks_passed, 4);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_credentials_degrade_health() {
    let mut fixture = MockApiFixture::new().await;
    let _mock = fixture.mock_models(401).await;
    let orch = fixture.orchestrator();

    let report = orch.health_check().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(!report.details.api_reachable);
    assert!(report.details.probe_error.as_deref().unwrap().contains("401"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "degraded");
}

#[tokio::test]
async fn test_http_probe_sends_bearer_credentials() {
    let mut fixture = MockApiFixture::new().await;
    let mock = fixture.mock_models(200).await;
    let probe = HttpProbe::new(
        format!("{}/v1/models", fixture.base_url),
        ApiKey::new("sk-test"),
    );
    tokio_test::assert_ok!(probe.probe().await);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_probe_classifies_status() {
    let mut fixture = MockApiFixture::new().await;
    let _mock = fixture.mock_models(503).await;
    let probe = HttpProbe::new(
        format!("{}/v1/models", fixture.base_url),
        ApiKey::new("sk-test"),
    );

    let err = probe.probe().await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 503, .. }));
    assert_eq!(err.standard_code(), StandardErrorCode::Overloaded);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_host_fails_probe() {
    let probe = HttpProbe::new("http://127.0.0.1:9/v1/models", ApiKey::new("sk-test"));
    let err = probe.probe().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(err.standard_code(), StandardErrorCode::Network);
}

#[tokio::test]
async fn test_missing_base_url_skips_probe() {
    let orch = Orchestrator::new(OrchestratorConfig::new().with_monitoring(false, "warn")).unwrap();
    let report = orch.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.details.probe, "skipped");
}
