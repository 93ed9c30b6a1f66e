//! Conversation directory: one summary per counterparty, most recent first.

use serde::{Deserialize, Serialize};

use super::LiveView;
use crate::error::StoreError;
use crate::models::ConversationSummary;
use crate::store::{paths, ChangeBatch, ChangeKind, DocumentStore, Subscription, SubscriptionEvent};

/// How the directory keeps its most-recent-first order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryOrdering {
    /// Head-insert each change, then stable-sort by summary timestamp.
    #[default]
    Timestamp,
    /// Head-insert each change and trust the store's delivery order.
    Arrival,
}

/// Live list of the signed-in user's conversations.
pub struct ConversationDirectory {
    user_id: String,
    ordering: DirectoryOrdering,
    summaries: Vec<ConversationSummary>,
    status: Option<String>,
    loaded: bool,
    revision: u64,
    subscription: Subscription,
}

impl ConversationDirectory {
    /// Subscribe to `user_id`'s recent messages.
    pub fn open(store: &dyn DocumentStore, user_id: &str, ordering: DirectoryOrdering) -> Self {
        let subscription = store.subscribe(&paths::recent_messages(user_id), None);
        Self {
            user_id: user_id.to_string(),
            ordering,
            summaries: Vec::new(),
            status: None,
            loaded: false,
            revision: 0,
            subscription,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Summaries, most recent first.
    pub fn summaries(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    #[cfg(test)]
    pub fn get(&self, counterparty_id: &str) -> Option<&ConversationSummary> {
        self.summaries
            .iter()
            .find(|s| s.counterparty_id() == counterparty_id)
    }

    /// Last error reported for this session, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Whether the initial snapshot has arrived.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    /// Bumped on every applied batch.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Wait for the next subscription event.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.subscription.next().await
    }

    fn upsert(&mut self, summary: ConversationSummary) {
        self.summaries
            .retain(|s| s.counterparty_id() != summary.counterparty_id());
        self.summaries.insert(0, summary);
    }
}

impl LiveView for ConversationDirectory {
    fn subscription_mut(&mut self) -> &mut Subscription {
        &mut self.subscription
    }

    fn apply_batch(&mut self, batch: ChangeBatch) {
        for change in batch {
            let key = change.document.id.clone();
            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    match change.document.decode::<ConversationSummary>() {
                        Ok(mut summary) => {
                            summary.document_id = key;
                            self.upsert(summary);
                        }
                        Err(e) => {
                            tracing::warn!("Skipping conversation summary: {}", e);
                            self.status = Some(e.to_string());
                        }
                    }
                }
                ChangeKind::Removed => {
                    self.summaries.retain(|s| s.counterparty_id() != key);
                }
            }
        }

        if self.ordering == DirectoryOrdering::Timestamp {
            // Stable, so equal timestamps keep receipt order.
            self.summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }

        self.loaded = true;
        self.revision += 1;
    }

    fn record_error(&mut self, error: StoreError) {
        self.status = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::{Change, Document, Fields};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn change(kind: ChangeKind, counterparty: &str, text: &str, secs: i64) -> Change {
        let fields = json!({
            "text": text,
            "username": counterparty,
            "profileImageUrl": "",
            "fromId": "u1",
            "toId": counterparty,
            "timeStamp": at(secs),
        });
        Change {
            kind,
            document: Document {
                path: paths::recent_messages("u1"),
                id: counterparty.to_string(),
                fields: match fields {
                    serde_json::Value::Object(map) => map,
                    _ => unreachable!(),
                },
            },
        }
    }

    fn order(dir: &ConversationDirectory) -> Vec<&str> {
        dir.summaries().iter().map(|s| s.counterparty_id()).collect()
    }

    fn directory(ordering: DirectoryOrdering) -> ConversationDirectory {
        let store = MemoryStore::new();
        let mut dir = ConversationDirectory::open(&store, "u1", ordering);
        dir.drain_pending();
        dir
    }

    #[test]
    fn test_most_recent_receipt_first() {
        let mut dir = directory(DirectoryOrdering::Timestamp);
        dir.apply_batch(vec![change(ChangeKind::Added, "u2", "hi", 1)]);
        dir.apply_batch(vec![change(ChangeKind::Added, "u3", "yo", 2)]);
        assert_eq!(order(&dir), vec!["u3", "u2"]);
    }

    #[test]
    fn test_one_summary_per_counterparty() {
        let mut dir = directory(DirectoryOrdering::Timestamp);
        dir.apply_batch(vec![
            change(ChangeKind::Added, "u2", "one", 1),
            change(ChangeKind::Added, "u3", "two", 2),
        ]);
        dir.apply_batch(vec![change(ChangeKind::Modified, "u2", "three", 3)]);
        dir.apply_batch(vec![
            change(ChangeKind::Modified, "u3", "four", 4),
            change(ChangeKind::Modified, "u2", "five", 5),
        ]);

        assert_eq!(order(&dir), vec!["u2", "u3"]);
        assert_eq!(dir.get("u2").unwrap().text, "five");
        assert_eq!(dir.get("u3").unwrap().text, "four");
        assert_eq!(dir.get("u2").unwrap().document_id, "u2");
    }

    #[test]
    fn test_timestamp_ordering_repairs_late_delivery() {
        let mut dir = directory(DirectoryOrdering::Timestamp);
        dir.apply_batch(vec![change(ChangeKind::Added, "u3", "new", 10)]);
        dir.apply_batch(vec![change(ChangeKind::Added, "u2", "old", 1)]);
        assert_eq!(order(&dir), vec!["u3", "u2"]);
    }

    #[test]
    fn test_arrival_ordering_trusts_delivery() {
        let mut dir = directory(DirectoryOrdering::Arrival);
        dir.apply_batch(vec![change(ChangeKind::Added, "u3", "new", 10)]);
        dir.apply_batch(vec![change(ChangeKind::Added, "u2", "old", 1)]);
        assert_eq!(order(&dir), vec!["u2", "u3"]);
    }

    #[test]
    fn test_equal_timestamps_keep_receipt_order() {
        let mut dir = directory(DirectoryOrdering::Timestamp);
        dir.apply_batch(vec![change(ChangeKind::Added, "u2", "a", 5)]);
        dir.apply_batch(vec![change(ChangeKind::Added, "u3", "b", 5)]);
        assert_eq!(order(&dir), vec!["u3", "u2"]);
    }

    #[test]
    fn test_removed_drops_summary() {
        let mut dir = directory(DirectoryOrdering::Timestamp);
        dir.apply_batch(vec![
            change(ChangeKind::Added, "u2", "a", 1),
            change(ChangeKind::Added, "u3", "b", 2),
        ]);
        dir.apply_batch(vec![change(ChangeKind::Removed, "u2", "", 0)]);
        assert_eq!(order(&dir), vec!["u3"]);
    }

    #[test]
    fn test_bad_record_sets_status_and_is_skipped() {
        let mut dir = directory(DirectoryOrdering::Timestamp);
        let bad = Change {
            kind: ChangeKind::Added,
            document: Document {
                path: paths::recent_messages("u1"),
                id: "u9".into(),
                fields: Fields::new(),
            },
        };
        dir.apply_batch(vec![bad, change(ChangeKind::Added, "u2", "ok", 1)]);
        assert_eq!(order(&dir), vec!["u2"]);
        assert!(dir.status().unwrap().contains("u9"));
    }

    #[tokio::test]
    async fn test_live_updates_and_errors_from_store() {
        let store = MemoryStore::new();
        let mut dir = ConversationDirectory::open(&store, "u1", DirectoryOrdering::Timestamp);
        assert!(!dir.loaded());

        let event = dir.next_event().await.unwrap();
        dir.handle_event(event);
        assert!(dir.loaded());
        assert!(dir.summaries().is_empty());

        let doc = change(ChangeKind::Added, "u2", "hi", 1).document;
        store.set(&doc.path, &doc.id, doc.fields).await.unwrap();
        store.push_subscription_error(&paths::recent_messages("u1"), "permission denied");
        assert_eq!(dir.drain_pending(), 2);

        assert_eq!(order(&dir), vec!["u2"]);
        assert!(dir.status().unwrap().contains("permission denied"));

        // Still subscribed after the error.
        let doc = change(ChangeKind::Added, "u3", "yo", 2).document;
        store.set(&doc.path, &doc.id, doc.fields).await.unwrap();
        dir.drain_pending();
        assert_eq!(order(&dir), vec!["u3", "u2"]);
        assert_eq!(dir.revision(), 3);
    }
}
