//! Per-subscriber routing of detected changes
//!
//! Routing is a pure function of the changes and the subscriber list: the
//! same inputs in any order yield the same plans in the same order.

use serde::{Deserialize, Serialize};

use crate::models::{ChangeRecord, ChannelDescriptor, DeliveryMode, Subscriber};

/// Changes bound for one subscriber in one notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub subscriber_id: String,
    pub subscriber_name: String,
    pub mode: DeliveryMode,
    pub channels: Vec<ChannelDescriptor>,
    /// Ordered by (source_id, id)
    pub changes: Vec<ChangeRecord>,
}

impl DeliveryPlan {
    fn new(subscriber: &Subscriber, changes: Vec<ChangeRecord>) -> Self {
        Self {
            subscriber_id: subscriber.id.clone(),
            subscriber_name: if subscriber.name.is_empty() {
                subscriber.id.clone()
            } else {
                subscriber.name.clone()
            },
            mode: subscriber.delivery_mode,
            channels: subscriber.channels.clone(),
            changes,
        }
    }
}

/// Filters changes per subscriber and batches them by delivery mode
#[derive(Debug, Clone, Default)]
pub struct NotificationRouter;

impl NotificationRouter {
    pub fn new() -> Self {
        Self
    }

    /// Whether `subscriber` wants to hear about `change`
    pub fn matches(&self, subscriber: &Subscriber, change: &ChangeRecord) -> bool {
        if !subscriber.active || !change.significant {
            return false;
        }

        if !subscriber.categories.is_empty()
            && !subscriber
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&change.category))
        {
            return false;
        }

        if change.priority < subscriber.min_priority {
            return false;
        }

        if !subscriber.keywords.is_empty() {
            let diff = change.diff_text.to_lowercase();
            if !subscriber
                .keywords
                .iter()
                .any(|k| diff.contains(&k.to_lowercase()))
            {
                return false;
            }
        }

        true
    }

    /// Plans for a single change
    pub fn route(&self, change: &ChangeRecord, subscribers: &[Subscriber]) -> Vec<DeliveryPlan> {
        self.route_cycle(std::slice::from_ref(change), subscribers)
    }

    /// Plans for every change detected in one cycle
    ///
    /// Realtime subscribers get one plan per matching change, digest
    /// subscribers one plan holding all of them. Plans follow subscriber
    /// order, then (source_id, change id).
    pub fn route_cycle(
        &self,
        changes: &[ChangeRecord],
        subscribers: &[Subscriber],
    ) -> Vec<DeliveryPlan> {
        let mut ordered: Vec<&ChangeRecord> = changes.iter().collect();
        ordered.sort_by(|a, b| {
            a.source_id
                .cmp(&b.source_id)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut plans = Vec::new();
        for subscriber in subscribers {
            let matching: Vec<ChangeRecord> = ordered
                .iter()
                .filter(|c| self.matches(subscriber, c))
                .map(|c| (*c).clone())
                .collect();

            if matching.is_empty() {
                continue;
            }

            tracing::debug!(
                subscriber = %subscriber.id,
                mode = subscriber.delivery_mode.as_str(),
                changes = matching.len(),
                "Changes routed"
            );

            match subscriber.delivery_mode {
                DeliveryMode::Realtime => plans.extend(
                    matching
                        .into_iter()
                        .map(|c| DeliveryPlan::new(subscriber, vec![c])),
                ),
                DeliveryMode::Digest => plans.push(DeliveryPlan::new(subscriber, matching)),
            }
        }

        plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::notifications::tests::sample_change;

    fn change(id: &str, source: &str, category: &str, priority: Priority, diff: &str) -> ChangeRecord {
        let mut c = sample_change(id, priority);
        c.source_id = source.to_string();
        c.category = category.to_string();
        c.diff_text = diff.to_string();
        c
    }

    #[test]
    fn test_priority_filter() {
        let router = NotificationRouter::new();
        let mut subscriber = Subscriber::new("s");
        subscriber.min_priority = Priority::High;

        let low = change("1", "a", "regulations", Priority::Medium, "+x");
        let high = change("2", "a", "regulations", Priority::High, "+x");
        let critical = change("3", "a", "regulations", Priority::Critical, "+x");

        assert!(!router.matches(&subscriber, &low));
        assert!(router.matches(&subscriber, &high));
        assert!(router.matches(&subscriber, &critical));
    }

    #[test]
    fn test_category_filter() {
        let router = NotificationRouter::new();
        let mut subscriber = Subscriber::new("s");
        subscriber.categories = vec!["fish_health".to_string()];

        assert!(!router.matches(&subscriber, &change("1", "a", "regulations", Priority::High, "+x")));
        assert!(router.matches(&subscriber, &change("2", "a", "Fish_Health", Priority::High, "+x")));
    }

    #[test]
    fn test_keyword_filter() {
        let router = NotificationRouter::new();
        let mut subscriber = Subscriber::new("s");
        subscriber.keywords = vec!["Lakselus".to_string()];

        assert!(router.matches(&subscriber, &change("1", "a", "c", Priority::Low, "+Ny grense for lakselus")));
        assert!(!router.matches(&subscriber, &change("2", "a", "c", Priority::Low, "+Ny fôrforskrift")));
    }

    #[test]
    fn test_inactive_and_insignificant_skipped() {
        let router = NotificationRouter::new();
        let mut inactive = Subscriber::new("s");
        inactive.active = false;
        let c = change("1", "a", "c", Priority::High, "+x");
        assert!(!router.matches(&inactive, &c));

        let mut minor = c.clone();
        minor.significant = false;
        assert!(!router.matches(&Subscriber::new("t"), &minor));
    }

    #[test]
    fn test_digest_batches_all_matching_changes() {
        let router = NotificationRouter::new();
        let mut digest = Subscriber::new("digest");
        digest.delivery_mode = DeliveryMode::Digest;

        let changes = vec![
            change("1", "b", "c", Priority::High, "+x"),
            change("2", "a", "c", Priority::Medium, "+y"),
            change("3", "c", "c", Priority::Low, "+z"),
        ];

        let plans = router.route_cycle(&changes, &[digest]);
        assert_eq!(plans.len(), 1);
        let sources: Vec<&str> = plans[0].changes.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_realtime_one_plan_per_change_in_stable_order() {
        let router = NotificationRouter::new();
        let subscribers = vec![Subscriber::new("first"), Subscriber::new("second")];
        let changes = vec![
            change("2", "b", "c", Priority::High, "+x"),
            change("1", "a", "c", Priority::High, "+y"),
        ];
        let mut reversed = changes.clone();
        reversed.reverse();

        let plans = router.route_cycle(&changes, &subscribers);
        assert_eq!(plans, router.route_cycle(&reversed, &subscribers));

        let order: Vec<(&str, &str)> = plans
            .iter()
            .map(|p| (p.subscriber_id.as_str(), p.changes[0].id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("first", "1"), ("first", "2"), ("second", "1"), ("second", "2")]
        );
    }

    #[test]
    fn test_route_single_change() {
        let router = NotificationRouter::new();
        let plans = router.route(
            &change("1", "a", "c", Priority::High, "+x"),
            &[Subscriber::new("s")],
        );
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].subscriber_name, "s");
    }
}
