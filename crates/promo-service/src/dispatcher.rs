//! Notification fan-out.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use promo_storage::UserRepository;
use promo_types::{Attachment, Promotion, TasteVectorMatch, User};

use crate::error::ServiceError;
use crate::formatter::format_promotion;
use crate::sender::{MessageSender, SendError};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Users a send was attempted for
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends one formatted notification per interested user.
pub struct NotificationDispatcher {
    users: Arc<dyn UserRepository>,
    sender: Arc<dyn MessageSender>,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    /// Create a new dispatcher. Each send is abandoned after `send_timeout`.
    pub fn new(
        users: Arc<dyn UserRepository>,
        sender: Arc<dyn MessageSender>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            users,
            sender,
            send_timeout,
        }
    }

    /// Notify every user behind `matches`.
    ///
    /// Users with several matching tastes get a single message carrying
    /// their best score. Users missing from storage are skipped. Sends run
    /// concurrently and a failed or timed-out send never affects the
    /// others; only the user lookup can fail the call.
    pub async fn notify_users(
        &self,
        matches: &[TasteVectorMatch],
        promotion: &Promotion,
        image: Option<&Attachment>,
    ) -> Result<DispatchReport, ServiceError> {
        if matches.is_empty() {
            return Ok(DispatchReport::default());
        }

        let best = best_score_per_user(matches);
        let user_ids: Vec<String> = best.iter().map(|(id, _)| id.clone()).collect();
        let mut found: HashMap<String, User> = self
            .users
            .find_many_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        let targets: Vec<(User, f32)> = best
            .into_iter()
            .filter_map(|(id, score)| match found.remove(&id) {
                Some(user) => Some((user, score)),
                None => {
                    debug!(user_id = %id, "Matched user no longer exists, skipping");
                    None
                }
            })
            .collect();

        let sends = targets
            .iter()
            .map(|(user, score)| self.send_one(user, promotion, *score, image));
        let results = join_all(sends).await;

        let delivered = results.iter().filter(|ok| **ok).count();
        let report = DispatchReport {
            recipients: results.len(),
            delivered,
            failed: results.len() - delivered,
        };

        info!(
            promotion = %promotion.name,
            recipients = report.recipients,
            delivered = report.delivered,
            failed = report.failed,
            "Dispatched notifications"
        );
        Ok(report)
    }

    async fn send_one(
        &self,
        user: &User,
        promotion: &Promotion,
        score: f32,
        image: Option<&Attachment>,
    ) -> bool {
        let text = format_promotion(promotion, Some(score));
        let outcome = tokio::time::timeout(
            self.send_timeout,
            self.sender.send_message(&user.phone, &text, image),
        )
        .await
        .unwrap_or(Err(SendError::Timeout(self.send_timeout)));

        match outcome {
            Ok(()) => {
                debug!(user_id = %user.id, score, "Notification sent");
                true
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to notify user");
                false
            }
        }
    }
}

/// Unique user ids in first-seen order, each with its highest score.
fn best_score_per_user(matches: &[TasteVectorMatch]) -> Vec<(String, f32)> {
    let mut best: Vec<(String, f32)> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for m in matches {
        match position.get(m.user_id.as_str()) {
            Some(&i) => {
                if m.score > best[i].1 {
                    best[i].1 = m.score;
                }
            }
            None => {
                position.insert(m.user_id.as_str(), best.len());
                best.push((m.user_id.clone(), m.score));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::RecordingSender;
    use promo_storage::InMemoryStore;

    fn hit(user: &str, taste: &str, score: f32) -> TasteVectorMatch {
        TasteVectorMatch {
            taste_id: taste.to_string(),
            user_id: user.to_string(),
            label: taste.to_string(),
            original_label: None,
            score,
        }
    }

    async fn store_with(users: &[&User]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for user in users {
            UserRepository::save(store.as_ref(), user).await.unwrap();
        }
        store
    }

    #[test]
    fn test_best_score_keeps_first_seen_order() {
        let best = best_score_per_user(&[
            hit("u2", "a", 0.6),
            hit("u1", "b", 0.7),
            hit("u2", "c", 0.65),
            hit("u1", "d", 0.9),
        ]);
        assert_eq!(best, vec![("u2".to_string(), 0.65), ("u1".to_string(), 0.9)]);
    }

    #[tokio::test]
    async fn test_one_message_per_user_with_best_score() {
        let alice = User::new("Alice", "111");
        let store = store_with(&[&alice]).await;
        let sender = Arc::new(RecordingSender::new());
        let dispatcher =
            NotificationDispatcher::new(store, sender.clone(), Duration::from_secs(5));

        let report = dispatcher
            .notify_users(
                &[hit(&alice.id, "games", 0.7), hit(&alice.id, "consoles", 0.9)],
                &Promotion::new("Console").with_price(10.0),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            report,
            DispatchReport {
                recipients: 1,
                delivered: 1,
                failed: 0
            }
        );
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "111");
        assert!(sent[0].text.contains("⭐ *Match:* 90%"));
    }

    #[tokio::test]
    async fn test_missing_users_skipped() {
        let alice = User::new("Alice", "111");
        let store = store_with(&[&alice]).await;
        let sender = Arc::new(RecordingSender::new());
        let dispatcher =
            NotificationDispatcher::new(store, sender.clone(), Duration::from_secs(5));

        let report = dispatcher
            .notify_users(
                &[hit("ghost", "x", 0.9), hit(&alice.id, "y", 0.8)],
                &Promotion::new("Thing").with_price(1.0),
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.recipients, 1);
        assert_eq!(sender.recipients(), vec!["111".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_stop_others() {
        let users = [
            User::new("A", "1"),
            User::new("B", "2"),
            User::new("C", "3"),
        ];
        let store = store_with(&[&users[0], &users[1], &users[2]]).await;
        let sender = Arc::new(RecordingSender::new());
        sender.fail_for("2");
        let dispatcher =
            NotificationDispatcher::new(store, sender.clone(), Duration::from_secs(5));

        let matches: Vec<_> = users.iter().map(|u| hit(&u.id, "t", 0.8)).collect();
        let report = dispatcher
            .notify_users(&matches, &Promotion::new("Deal").with_coupon("X"), None)
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        let mut recipients = sender.recipients();
        recipients.sort();
        assert_eq!(recipients, vec!["1".to_string(), "3".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_send_times_out() {
        let alice = User::new("Alice", "111");
        let store = store_with(&[&alice]).await;
        let sender = Arc::new(RecordingSender::new().with_delay(Duration::from_secs(60)));
        let dispatcher =
            NotificationDispatcher::new(store, sender.clone(), Duration::from_millis(100));

        let report = dispatcher
            .notify_users(
                &[hit(&alice.id, "t", 0.8)],
                &Promotion::new("Deal").with_price(1.0),
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_empty_matches_is_noop() {
        let store = Arc::new(InMemoryStore::new());
        let sender = Arc::new(RecordingSender::new());
        let dispatcher =
            NotificationDispatcher::new(store, sender.clone(), Duration::from_secs(5));

        let report = dispatcher
            .notify_users(&[], &Promotion::new("Deal").with_price(1.0), None)
            .await
            .unwrap();
        assert_eq!(report, DispatchReport::default());
    }
}
