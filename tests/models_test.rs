//! Tests for models module

use chrono::{Duration, TimeZone, Utc};
use regwatch::models::{
    ChangeSummary, ChannelKind, DeliveryMode, DeliveryState, Priority, Source, Subscriber,
    SummaryOrigin,
};

#[test]
fn test_new_source_is_due_immediately() {
    let source = Source::new("fdir", "Fiskeridirektoratet", "https://www.fiskeridir.no", "licenses");
    assert!(source.next_check_at().is_none());
    assert!(source.is_due(Utc::now()));
}

#[test]
fn test_due_exactly_at_interval() {
    let checked = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
    let mut source = Source::new("lovdata", "Lovdata", "https://lovdata.no", "regulations");
    source.check_interval_hours = 24;
    source.last_checked = Some(checked);

    assert_eq!(source.next_check_at(), Some(checked + Duration::hours(24)));
    assert!(!source.is_due(checked + Duration::hours(23)));
    assert!(source.is_due(checked + Duration::hours(24)));
}

#[test]
fn test_inactive_source_never_due() {
    let mut source = Source::new("fdir", "Fiskeridirektoratet", "https://www.fiskeridir.no", "licenses");
    source.active = false;
    assert!(!source.is_due(Utc::now()));
}

#[test]
fn test_subscriber_from_toml() {
    let subscriber: Subscriber = toml::from_str(
        r#"
        id = "havbruk-weekly"
        name = "Havbruk ukesoppsummering"
        categories = ["licenses", "lice"]
        min_priority = "high"
        keywords = ["lakselus"]
        delivery_mode = "weekly"
        channels = [
            { kind = "slack", target = "https://hooks.slack.com/services/T000/B000/X" },
            { kind = "log" },
        ]
        "#,
    )
    .unwrap();

    assert!(subscriber.active);
    assert_eq!(subscriber.min_priority, Priority::High);
    assert_eq!(subscriber.delivery_mode, DeliveryMode::Digest);
    assert_eq!(subscriber.channels[0].kind, ChannelKind::Slack);
    assert_eq!(subscriber.channels[1].kind, ChannelKind::Log);
    assert!(subscriber.channels[1].target.is_empty());
}

#[test]
fn test_subscriber_defaults() {
    let subscriber: Subscriber = toml::from_str(r#"id = "minimal""#).unwrap();

    assert_eq!(subscriber, {
        let mut expected = Subscriber::new("minimal");
        expected.name = String::new();
        expected
    });
}

#[test]
fn test_unknown_priority_rejected() {
    let result: Result<Subscriber, _> = toml::from_str(
        r#"
        id = "x"
        min_priority = "urgent"
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_wire_names_are_lowercase() {
    assert_eq!(serde_json::to_string(&Priority::Critical).unwrap(), "\"critical\"");
    assert_eq!(serde_json::to_string(&DeliveryState::Failed).unwrap(), "\"failed\"");
    assert_eq!(serde_json::to_string(&SummaryOrigin::Service).unwrap(), "\"service\"");
    assert_eq!(ChannelKind::Webhook.to_string(), "webhook");
}

#[test]
fn test_summary_from_partial_service_json() {
    let summary: ChangeSummary = serde_json::from_str(
        r#"{
            "title": "Nye lusegrenser",
            "narrative": "Grensen senkes til 0,2 voksne hunnlus.",
            "action_items": [{"action": "Oppdater lusetellingsrutiner", "priority": "high"}]
        }"#,
    )
    .unwrap();

    assert_eq!(summary.title, "Nye lusegrenser");
    assert!(summary.narrative_en.is_empty());
    assert_eq!(summary.action_items[0].priority, Some(Priority::High));
    assert!(summary.action_items[0].deadline.is_none());
    assert_eq!(summary.origin, SummaryOrigin::Analyzer);
}
