//! Health check integration tests
//!
//! One fetch per active source, a store check and an operator alert when
//! anything fails. Monitoring state is never modified.

use regwatch::crawler::{HealthChecker, HealthStatus};
use regwatch::models::{ChannelDescriptor, ChannelKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{build, source, test_config, PAGE_V1};

#[tokio::test]
async fn test_all_sources_reachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_V1))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(
        vec![
            source("fdir", format!("{}/fdir", server.uri())),
            source("lovdata", format!("{}/lovdata", server.uri())),
        ],
        vec![],
    );
    let (repository, _orchestrator) = build(&config);
    let checker = HealthChecker::from_config(&config, repository.clone()).unwrap();

    let report = checker.check().await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.reachable_sources(), 2);
    assert!(report.store.available);
    assert_eq!(report.store.stats.as_ref().map(|s| s.sources_total), Some(2));
    assert_eq!(report.alert_delivered, None);
    assert!(report.failed_components().is_empty());

    // Probing stores nothing
    assert_eq!(repository.snapshot_count("fdir").unwrap(), 0);
    assert!(repository.get_source("fdir").unwrap().unwrap().last_checked.is_none());
}

#[tokio::test]
async fn test_unreachable_source_alerts_operator() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_V1))
        .mount(&pages)
        .await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&pages)
        .await;
    Mock::given(method("POST"))
        .and(path("/ops"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hooks)
        .await;

    let mut config = test_config(
        vec![
            source("up", format!("{}/up", pages.uri())),
            source("down", format!("{}/down", pages.uri())),
        ],
        vec![],
    );
    config.monitor.max_attempts = 3;
    config.delivery.operator_targets = vec![ChannelDescriptor::new(
        ChannelKind::Webhook,
        format!("{}/ops", hooks.uri()),
    )];
    let (repository, _orchestrator) = build(&config);
    let checker = HealthChecker::from_config(&config, repository.clone()).unwrap();

    let report = checker.check().await;

    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.reachable_sources(), 1);
    assert_eq!(report.alert_delivered, Some(true));

    let failed = report.failed_components();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].starts_with("source down: "));

    let down = report.sources.iter().find(|s| s.source_id == "down").unwrap();
    assert!(!down.reachable);
    assert!(down.category.is_some());

    let requests = hooks.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["data"]["alert_type"], "health_check_failed");
    assert_eq!(body["data"]["severity"], "warning");

    // Failure tracking belongs to the monitoring cycle
    assert!(repository.load_failure_states().unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_source_not_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(vec![source("old", format!("{}/old", server.uri()))], vec![]);
    let (repository, _orchestrator) = build(&config);
    repository.set_source_active("old", false).unwrap();
    let checker = HealthChecker::from_config(&config, repository).unwrap();

    let report = checker.check().await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.sources.is_empty());
}
