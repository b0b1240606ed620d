//! Routing and delivery integration tests
//!
//! Changes detected in a cycle are routed to subscribers and delivered
//! through the configured strategies; every outcome lands in the delivery log.

use regwatch::crawler::{CycleOptions, CycleReport};
use regwatch::models::{
    ChannelDescriptor, ChannelKind, DeliveryMode, DeliveryState, Priority, Subscriber,
};
use regwatch::scheduler::ShutdownSignal;
use regwatch::storage::SharedSnapshotRepository;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{build, source, test_config, PAGE_V1, PAGE_V2};

fn subscriber(id: &str, mode: DeliveryMode, hook: String) -> Subscriber {
    let mut subscriber = Subscriber::new(id);
    subscriber.delivery_mode = mode;
    subscriber.channels = vec![ChannelDescriptor::new(ChannelKind::Webhook, hook)];
    subscriber
}

/// Mount `count` pages that change between the first and second fetch
async fn changing_pages(server: &MockServer, count: usize) -> Vec<regwatch::config::SourceConfig> {
    let mut sources = Vec::new();
    for i in 0..count {
        let route = format!("/page/{i}");
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_V1))
            .up_to_n_times(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_V2))
            .mount(server)
            .await;
        sources.push(source(&format!("s{i}"), format!("{}{route}", server.uri())));
    }
    sources
}

/// Baseline cycle, then the cycle that sees the changes
async fn two_cycles(
    config: &regwatch::config::Config,
) -> (SharedSnapshotRepository, CycleReport) {
    let (repository, orchestrator) = build(config);
    let all = CycleOptions {
        all: true,
        only_source: None,
    };
    let never = ShutdownSignal::never();

    orchestrator.run_cycle(&all, &never).await.unwrap();
    let report = orchestrator.run_cycle(&all, &never).await.unwrap();
    (repository, report)
}

#[tokio::test]
async fn test_realtime_subscriber_gets_each_change() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&hooks)
        .await;

    let sources = changing_pages(&pages, 2).await;
    let config = test_config(
        sources,
        vec![subscriber(
            "nordlaks",
            DeliveryMode::Realtime,
            format!("{}/hook", hooks.uri()),
        )],
    );
    let (repository, report) = two_cycles(&config).await;

    assert_eq!(report.changes_recorded, 2);
    assert_eq!(report.notifications_sent, 2);
    assert_eq!(report.notifications_failed, 0);

    let log = repository.delivery_log(10).unwrap();
    assert_eq!(log.len(), 2);
    assert!(log
        .iter()
        .all(|e| e.recipient == "nordlaks" && e.channel == "webhook" && e.status == DeliveryState::Sent));
    assert!(log.iter().all(|e| e.change_id.is_some()));
}

#[tokio::test]
async fn test_digest_subscriber_gets_one_batch() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hooks)
        .await;

    let sources = changing_pages(&pages, 3).await;
    let config = test_config(
        sources,
        vec![subscriber(
            "havbruk",
            DeliveryMode::Digest,
            format!("{}/digest", hooks.uri()),
        )],
    );
    let (repository, report) = two_cycles(&config).await;

    assert_eq!(report.changes_recorded, 3);
    assert_eq!(report.notifications_sent, 1);

    let requests = hooks.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["kind"], "digest");
    assert_eq!(body["data"]["changes"].as_array().map(Vec::len), Some(3));

    // One log row per covered change
    let log = repository.delivery_log(10).unwrap();
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|e| e.recipient == "havbruk" && e.status == DeliveryState::Sent));
}

#[tokio::test]
async fn test_failed_webhook_falls_back_to_log() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&hooks)
        .await;

    let sources = changing_pages(&pages, 1).await;
    let config = test_config(
        sources,
        vec![subscriber(
            "nordlaks",
            DeliveryMode::Realtime,
            format!("{}/hook", hooks.uri()),
        )],
    );
    let (repository, report) = two_cycles(&config).await;

    assert_eq!(report.notifications_sent, 1);
    let log = repository.delivery_log(10).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].channel, "log");
    assert_eq!(log[0].status, DeliveryState::Sent);
}

#[tokio::test]
async fn test_delivery_failure_keeps_change() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&hooks)
        .await;

    let sources = changing_pages(&pages, 1).await;
    let mut config = test_config(
        sources,
        vec![subscriber(
            "nordlaks",
            DeliveryMode::Realtime,
            format!("{}/hook", hooks.uri()),
        )],
    );
    config.delivery.strategies = vec![ChannelKind::Webhook];
    let (repository, report) = two_cycles(&config).await;

    assert_eq!(report.notifications_failed, 1);
    assert_eq!(repository.list_changes(None, 10).unwrap().len(), 1);

    let log = repository.delivery_log(10).unwrap();
    assert_eq!(log[0].status, DeliveryState::Failed);
    assert_eq!(log[0].channel, "webhook");
    assert!(log[0].error.as_deref().unwrap_or_default().contains("500"));
}

#[tokio::test]
async fn test_priority_filter_suppresses_delivery() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&hooks)
        .await;

    let mut strict = subscriber("board", DeliveryMode::Realtime, format!("{}/hook", hooks.uri()));
    strict.min_priority = Priority::Critical;
    let sources = changing_pages(&pages, 1).await;
    let config = test_config(sources, vec![strict]);
    let (repository, report) = two_cycles(&config).await;

    assert_eq!(report.changes_recorded, 1);
    assert_eq!(report.notifications_sent, 0);
    assert!(repository.delivery_log(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_keyword_filter_selects_subscribers() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/match"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hooks)
        .await;
    Mock::given(method("POST"))
        .and(path("/miss"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&hooks)
        .await;

    let mut matching = subscriber("match", DeliveryMode::Realtime, format!("{}/match", hooks.uri()));
    matching.keywords = vec!["forskrift".to_string()];
    let mut missing = subscriber("miss", DeliveryMode::Realtime, format!("{}/miss", hooks.uri()));
    missing.keywords = vec!["rømming".to_string()];

    let sources = changing_pages(&pages, 1).await;
    let config = test_config(sources, vec![matching, missing]);
    let (_repository, report) = two_cycles(&config).await;

    assert_eq!(report.notifications_sent, 1);
}

#[tokio::test]
async fn test_insignificant_change_is_stored_not_routed() {
    let pages = MockServer::start().await;
    let hooks = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&hooks)
        .await;

    let old: Vec<String> = (0..200).map(|i| format!("linje {i} tekst")).collect();
    let mut new = old.clone();
    new[100] = "linje hundre tekst".to_string();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(old.join("\n")))
        .up_to_n_times(1)
        .mount(&pages)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(new.join("\n")))
        .mount(&pages)
        .await;

    let config = test_config(
        vec![source("long", format!("{}/long", pages.uri()))],
        vec![subscriber("all", DeliveryMode::Realtime, format!("{}/hook", hooks.uri()))],
    );
    let (repository, report) = two_cycles(&config).await;

    assert_eq!(report.changes_recorded, 1);
    assert_eq!(report.significant_changes, 0);
    assert_eq!(report.notifications_sent, 0);

    let changes = repository.list_changes(None, 10).unwrap();
    assert!(!changes[0].significant);
}
