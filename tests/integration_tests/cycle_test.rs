//! Monitoring cycle integration tests
//!
//! Tests the complete per-source workflow:
//! 1. HTTP fetch (mocked)
//! 2. Snapshot comparison
//! 3. Change analysis and storage
//! 4. Failure tracking and operator alerts

use regwatch::crawler::CycleOptions;
use regwatch::models::DeliveryState;
use regwatch::notifications::OPERATOR_RECIPIENT;
use regwatch::scheduler::{shutdown_channel, ShutdownSignal};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{build, source, test_config, PAGE_V1, PAGE_V2};

fn all() -> CycleOptions {
    CycleOptions {
        all: true,
        only_source: None,
    }
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Serve `first` once, then `then` for every later request
async fn mount_sequence(server: &MockServer, route: &str, first: &str, then: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(first))
        .up_to_n_times(1)
        .mount(server)
        .await;
    mount_page(server, route, then).await;
}

// ============================================================================
// First sight and idempotence
// ============================================================================

#[tokio::test]
async fn test_first_cycle_stores_snapshot_without_change() {
    let server = MockServer::start().await;
    mount_page(&server, "/fdir", PAGE_V1).await;

    let config = test_config(vec![source("fdir", format!("{}/fdir", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);

    let report = orchestrator
        .run_cycle(&CycleOptions::default(), &ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.sources_due, 1);
    assert_eq!(report.first_seen, 1);
    assert_eq!(report.changes_recorded, 0);
    assert_eq!(repository.snapshot_count("fdir").unwrap(), 1);
    assert!(repository.list_changes(None, 10).unwrap().is_empty());

    let snapshot = repository.current_snapshot("fdir").unwrap().unwrap();
    assert_eq!(snapshot.http_status, 200);
    assert_eq!(snapshot.content.as_deref(), Some(PAGE_V1));

    let stored = repository.get_source("fdir").unwrap().unwrap();
    assert!(stored.last_checked.is_some());
    assert!(stored.last_changed.is_none());
}

#[tokio::test]
async fn test_repeated_cycle_is_idempotent() {
    let server = MockServer::start().await;
    mount_page(&server, "/fdir", PAGE_V1).await;

    let config = test_config(vec![source("fdir", format!("{}/fdir", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();

    orchestrator.run_cycle(&all(), &never).await.unwrap();
    let second = orchestrator.run_cycle(&all(), &never).await.unwrap();
    let third = orchestrator.run_cycle(&all(), &never).await.unwrap();

    assert_eq!(second.unchanged, 1);
    assert_eq!(third.unchanged, 1);
    assert_eq!(repository.snapshot_count("fdir").unwrap(), 1);
    assert!(repository.list_changes(None, 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_checked_source_is_not_due_again() {
    let server = MockServer::start().await;
    mount_page(&server, "/fdir", PAGE_V1).await;

    let config = test_config(vec![source("fdir", format!("{}/fdir", server.uri()))], vec![]);
    let (_repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();

    orchestrator
        .run_cycle(&CycleOptions::default(), &never)
        .await
        .unwrap();
    let second = orchestrator
        .run_cycle(&CycleOptions::default(), &never)
        .await
        .unwrap();

    assert_eq!(second.sources_due, 0);
    assert_eq!(second.sources_checked, 0);
}

#[tokio::test]
async fn test_date_only_difference_records_nothing() {
    let server = MockServer::start().await;
    mount_sequence(
        &server,
        "/fdir",
        "Sist oppdatert 12.03.2024 kl. 09:10\ngrense 0.5",
        "Sist oppdatert 19.03.2024 kl. 14:55\ngrense 0.5",
    )
    .await;

    let config = test_config(vec![source("fdir", format!("{}/fdir", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();

    orchestrator.run_cycle(&all(), &never).await.unwrap();
    let second = orchestrator.run_cycle(&all(), &never).await.unwrap();

    assert_eq!(second.changes_recorded, 0);
    assert_eq!(second.unchanged + second.refreshed, 1);
    assert!(repository.list_changes(None, 10).unwrap().is_empty());
}

// ============================================================================
// Change detection
// ============================================================================

#[tokio::test]
async fn test_amendment_is_recorded() {
    let server = MockServer::start().await;
    mount_sequence(&server, "/fdir", PAGE_V1, PAGE_V2).await;

    let config = test_config(vec![source("fdir", format!("{}/fdir", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();

    orchestrator.run_cycle(&all(), &never).await.unwrap();
    let report = orchestrator.run_cycle(&all(), &never).await.unwrap();

    assert_eq!(report.changes_recorded, 1);
    assert_eq!(report.significant_changes, 1);
    assert_eq!(report.summaries_generated, 0);
    assert_eq!(repository.snapshot_count("fdir").unwrap(), 2);

    let changes = repository.list_changes(Some("fdir"), 10).unwrap();
    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert!(change.significant);
    assert!(change.previous_snapshot_id.is_some());
    assert_eq!(
        change.current_snapshot_id,
        repository.current_snapshot("fdir").unwrap().map(|s| s.id)
    );
    assert!(change.keywords.iter().any(|k| k.starts_with("forskrift")));
    assert_eq!(change.summary.title, "Endring: Source fdir");

    let stored = repository.get_source("fdir").unwrap().unwrap();
    assert!(stored.last_changed.is_some());
}

#[tokio::test]
async fn test_workers_check_every_source() {
    let server = MockServer::start().await;
    let mut sources = Vec::new();
    for i in 0..6 {
        let route = format!("/page/{i}");
        mount_page(&server, &route, &format!("Side {i}\ngrense 0.5")).await;
        sources.push(source(&format!("s{i}"), format!("{}{route}", server.uri())));
    }

    let mut config = test_config(sources, vec![]);
    config.monitor.workers = 3;
    let (repository, orchestrator) = build(&config);

    let report = orchestrator
        .run_cycle(&CycleOptions::default(), &ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.sources_checked, 6);
    assert_eq!(report.first_seen, 6);
    for i in 0..6 {
        assert_eq!(repository.snapshot_count(&format!("s{i}")).unwrap(), 1);
    }
}

#[tokio::test]
async fn test_only_source_restricts_cycle() {
    let server = MockServer::start().await;
    mount_page(&server, "/a", PAGE_V1).await;
    mount_page(&server, "/b", PAGE_V1).await;

    let config = test_config(
        vec![
            source("a", format!("{}/a", server.uri())),
            source("b", format!("{}/b", server.uri())),
        ],
        vec![],
    );
    let (repository, orchestrator) = build(&config);

    let options = CycleOptions {
        all: false,
        only_source: Some("b".to_string()),
    };
    let report = orchestrator
        .run_cycle(&options, &ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.sources_checked, 1);
    assert_eq!(repository.snapshot_count("a").unwrap(), 0);
    assert_eq!(repository.snapshot_count("b").unwrap(), 1);

    let unknown = CycleOptions {
        all: true,
        only_source: Some("missing".to_string()),
    };
    assert!(orchestrator
        .run_cycle(&unknown, &ShutdownSignal::never())
        .await
        .is_err());
}

#[tokio::test]
async fn test_inactive_source_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_V1))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(vec![source("fdir", format!("{}/fdir", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    assert!(repository.set_source_active("fdir", false).unwrap());

    let report = orchestrator
        .run_cycle(&all(), &ShutdownSignal::never())
        .await
        .unwrap();
    assert_eq!(report.sources_due, 0);
}

// ============================================================================
// Failure threshold
// ============================================================================

#[tokio::test]
async fn test_failure_threshold_alert_and_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_page(&server, "/down", PAGE_V1).await;

    let config = test_config(vec![source("down", format!("{}/down", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();

    let first = orchestrator.run_cycle(&all(), &never).await.unwrap();
    let second = orchestrator.run_cycle(&all(), &never).await.unwrap();
    assert_eq!(first.fetch_failures, 1);
    assert_eq!(first.failed_sources, vec!["down".to_string()]);
    assert_eq!(first.alerts_raised + second.alerts_raised, 0);
    assert!(repository.delivery_log(10).unwrap().is_empty());

    let third = orchestrator.run_cycle(&all(), &never).await.unwrap();
    assert_eq!(third.alerts_raised, 1);

    let states = repository.load_failure_states().unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].consecutive_failures, 3);
    assert!(states[0].last_error.contains("503"));
    assert_eq!(repository.snapshot_count("down").unwrap(), 0);

    let log = repository.delivery_log(10).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].recipient, OPERATOR_RECIPIENT);
    assert_eq!(log[0].change_id, None);
    assert_eq!(log[0].channel, "log");
    assert_eq!(log[0].status, DeliveryState::Sent);

    // Page comes back: state cleared, recovery reported
    let fourth = orchestrator.run_cycle(&all(), &never).await.unwrap();
    assert_eq!(fourth.first_seen, 1);
    assert!(repository.load_failure_states().unwrap().is_empty());
    assert_eq!(orchestrator.tracker().failing_count().await, 0);
    assert_eq!(repository.delivery_log(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_alert_repeats_while_source_not_due() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = test_config(vec![source("down", format!("{}/down", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();

    for _ in 0..3 {
        orchestrator.run_cycle(&all(), &never).await.unwrap();
    }
    assert_eq!(repository.delivery_log(10).unwrap().len(), 1);

    // Checked moments ago, so a scheduled cycle fetches nothing
    let scheduled = orchestrator
        .run_cycle(&CycleOptions::default(), &never)
        .await
        .unwrap();
    assert_eq!(scheduled.sources_checked, 0);
    assert_eq!(scheduled.fetch_failures, 0);
    assert_eq!(scheduled.alerts_raised, 1);

    let log = repository.delivery_log(10).unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|e| e.recipient == OPERATOR_RECIPIENT));
    assert_eq!(
        repository.load_failure_states().unwrap()[0].consecutive_failures,
        3
    );
}

#[tokio::test]
async fn test_disabled_source_stops_alerting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = test_config(vec![source("down", format!("{}/down", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();

    for _ in 0..3 {
        orchestrator.run_cycle(&all(), &never).await.unwrap();
    }
    repository.set_source_active("down", false).unwrap();

    let report = orchestrator
        .run_cycle(&CycleOptions::default(), &never)
        .await
        .unwrap();
    assert_eq!(report.alerts_raised, 0);
}

#[tokio::test]
async fn test_not_found_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(vec![source("gone", format!("{}/gone", server.uri()))], vec![]);
    config.monitor.max_attempts = 3;
    let (repository, orchestrator) = build(&config);

    let report = orchestrator
        .run_cycle(&all(), &ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.fetch_failures, 1);
    let states = repository.load_failure_states().unwrap();
    assert_eq!(states[0].consecutive_failures, 1);
}

#[tokio::test]
async fn test_failure_state_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(vec![source("down", format!("{}/down", server.uri()))], vec![]);
    let (repository, orchestrator) = build(&config);
    let never = ShutdownSignal::never();
    orchestrator.run_cycle(&all(), &never).await.unwrap();
    orchestrator.run_cycle(&all(), &never).await.unwrap();

    // New orchestrator over the same store, as after a process restart
    let restarted =
        regwatch::crawler::CycleOrchestrator::from_config(&config, repository.clone()).unwrap();
    restarted.restore_failures().await.unwrap();
    let report = restarted.run_cycle(&all(), &never).await.unwrap();

    assert_eq!(report.alerts_raised, 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_shutdown_before_cycle_checks_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_V1))
        .expect(0)
        .mount(&server)
        .await;

    let sources = (0..3)
        .map(|i| source(&format!("s{i}"), format!("{}/s{i}", server.uri())))
        .collect();
    let config = test_config(sources, vec![]);
    let (repository, orchestrator) = build(&config);

    let (handle, signal) = shutdown_channel();
    handle.shutdown();
    let report = orchestrator
        .run_cycle(&CycleOptions::default(), &signal)
        .await
        .unwrap();

    assert_eq!(report.sources_due, 3);
    assert_eq!(report.sources_checked, 0);
    assert_eq!(report.sources_skipped, 3);
    assert!(report.cancelled);
    assert!(repository
        .list_sources()
        .unwrap()
        .iter()
        .all(|s| s.last_checked.is_none()));
}

#[tokio::test]
async fn test_shutdown_lets_workers_stop_between_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_V1))
        .expect(0)
        .mount(&server)
        .await;

    let sources = (0..4)
        .map(|i| source(&format!("s{i}"), format!("{}/s{i}", server.uri())))
        .collect();
    let mut config = test_config(sources, vec![]);
    config.monitor.workers = 2;
    let (_repository, orchestrator) = build(&config);

    let (handle, signal) = shutdown_channel();
    handle.shutdown();
    let report = orchestrator.run_cycle(&all(), &signal).await.unwrap();

    assert_eq!(report.sources_checked, 0);
    assert!(report.cancelled);
}
