//! Thread synchronizer: the open conversation between two users.

use std::collections::HashSet;
use std::sync::Arc;

use super::delivery::{deliver, Delivery};
use super::LiveView;
use crate::error::{SendError, StoreError};
use crate::models::{ChatUser, Message};
use crate::store::{paths, ChangeBatch, ChangeKind, DocumentStore, Subscription, SubscriptionEvent};

/// Live message history with one counterparty, plus the compose buffer.
pub struct ThreadSync {
    store: Arc<dyn DocumentStore>,
    me: ChatUser,
    peer: ChatUser,
    messages: Vec<Message>,
    seen: HashSet<String>,
    /// Compose buffer; cleared once the sender's copy of a send is stored.
    pub draft: String,
    status: Option<String>,
    revision: u64,
    subscription: Subscription,
}

impl ThreadSync {
    /// Subscribe to `me`'s copy of the conversation with `peer`, oldest first.
    pub fn open(store: Arc<dyn DocumentStore>, me: ChatUser, peer: ChatUser) -> Self {
        let subscription = store.subscribe(&paths::messages(&me.uid, &peer.uid), Some("timestamp"));
        Self {
            store,
            me,
            peer,
            messages: Vec::new(),
            seen: HashSet::new(),
            draft: String::new(),
            status: None,
            revision: 0,
            subscription,
        }
    }

    pub fn me(&self) -> &ChatUser {
        &self.me
    }

    pub fn peer(&self) -> &ChatUser {
        &self.peer
    }

    /// Messages ordered by timestamp, then id.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Last send or subscription error, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Wait for the next subscription event.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.subscription.next().await
    }

    /// Send the compose buffer.
    ///
    /// An empty or whitespace-only draft is rejected and left in place. The
    /// draft is cleared as soon as the sender's copy is stored; failures of
    /// the later writes only end up in `status`.
    pub async fn send(&mut self) -> Result<Delivery, SendError> {
        let result = deliver(self.store.as_ref(), &self.me, &self.peer, &self.draft).await;
        match &result {
            Ok(delivery) => {
                self.draft.clear();
                self.status = delivery.failure_summary();
            }
            Err(SendError::EmptyBody) => {}
            Err(e) => {
                self.status = Some(e.to_string());
            }
        }
        result
    }

    /// Insert at the message's ordering position; appends when delivery is in order.
    fn insert(&mut self, message: Message) {
        if !self.seen.insert(message.id.clone()) {
            return;
        }
        let key = message.sort_key();
        let pos = self.messages.partition_point(|m| m.sort_key() <= key);
        self.messages.insert(pos, message);
    }
}

impl LiveView for ThreadSync {
    fn subscription_mut(&mut self) -> &mut Subscription {
        &mut self.subscription
    }

    fn apply_batch(&mut self, batch: ChangeBatch) {
        for change in batch {
            // Messages are never edited or deleted.
            if change.kind != ChangeKind::Added {
                continue;
            }
            match change.document.decode::<Message>() {
                Ok(mut message) => {
                    message.id = change.document.id;
                    self.insert(message);
                }
                Err(e) => {
                    tracing::warn!("Skipping message: {}", e);
                    self.status = Some(e.to_string());
                }
            }
        }
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
    use crate::store::{Change, Document};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn users() -> (ChatUser, ChatUser) {
        (
            ChatUser::new("u1", "ana@example.com", ""),
            ChatUser::new("u2", "ben@example.com", ""),
        )
    }

    fn open(store: &Arc<MemoryStore>) -> ThreadSync {
        let (a, b) = users();
        let mut thread = ThreadSync::open(store.clone(), a, b);
        thread.drain_pending();
        thread
    }

    fn added(id: &str, secs: i64) -> Change {
        let fields = json!({
            "fromId": "u2",
            "toId": "u1",
            "text": format!("msg {}", id),
            "timestamp": Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        });
        Change {
            kind: ChangeKind::Added,
            document: Document {
                path: paths::messages("u1", "u2"),
                id: id.to_string(),
                fields: match fields {
                    serde_json::Value::Object(map) => map,
                    _ => unreachable!(),
                },
            },
        }
    }

    fn assert_ordered(thread: &ThreadSync) {
        for pair in thread.messages().windows(2) {
            assert!(pair[0].sort_key() <= pair[1].sort_key());
        }
    }

    #[tokio::test]
    async fn test_send_writes_both_copies_and_clears_draft() {
        let store = Arc::new(MemoryStore::new());
        let mut thread = open(&store);

        thread.draft = "hello".to_string();
        let delivery = thread.send().await.unwrap();
        assert_eq!(thread.draft, "");
        assert_eq!(thread.status(), None);

        for path in ["messages/u1/u2", "messages/u2/u1"] {
            let doc = store.get(path, &delivery.message_id).await.unwrap().unwrap();
            assert_eq!(doc.fields["fromId"], "u1");
            assert_eq!(doc.fields["toId"], "u2");
            assert_eq!(doc.fields["text"], "hello");
        }
    }

    #[tokio::test]
    async fn test_sent_message_round_trips_through_subscription() {
        let store = Arc::new(MemoryStore::new());
        let mut thread = open(&store);

        thread.draft = "hello".to_string();
        let delivery = thread.send().await.unwrap();

        // Initial snapshot counted once.
        assert_eq!(thread.revision(), 1);
        let event = thread.next_event().await.unwrap();
        thread.handle_event(event);
        assert_eq!(thread.revision(), 2);

        let msg = &thread.messages()[0];
        assert_eq!(msg.id, delivery.message_id);
        assert_eq!(
            (msg.from_id.as_str(), msg.to_id.as_str(), msg.text.as_str()),
            ("u1", "u2", "hello")
        );
        assert!(msg.is_from("u1"));
    }

    #[tokio::test]
    async fn test_empty_draft_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut thread = open(&store);

        thread.draft = "   ".to_string();
        assert!(matches!(thread.send().await, Err(SendError::EmptyBody)));
        assert_eq!(thread.draft, "   ");
        assert!(store.collections().is_empty());
    }

    #[tokio::test]
    async fn test_recipient_failure_still_clears_draft() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes_under("messages/u2", "permission denied");
        let mut thread = open(&store);

        thread.draft = "hello".to_string();
        let delivery = thread.send().await.unwrap();
        assert!(!delivery.is_complete());
        assert_eq!(thread.draft, "");
        assert!(thread.status().unwrap().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_sender_failure_keeps_draft() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes_under("messages/u1", "offline");
        let mut thread = open(&store);

        thread.draft = "hello".to_string();
        assert!(matches!(thread.send().await, Err(SendError::SenderCopy(_))));
        assert_eq!(thread.draft, "hello");
        assert!(thread.status().unwrap().contains("offline"));
    }

    #[tokio::test]
    async fn test_out_of_order_adds_stay_sorted() {
        let store = Arc::new(MemoryStore::new());
        let mut thread = open(&store);

        thread.apply_batch(vec![added("c", 3), added("a", 1)]);
        thread.apply_batch(vec![added("e", 5)]);
        thread.apply_batch(vec![added("b", 3), added("d", 2), added("a", 1)]);
        assert_ordered(&thread);

        let ids: Vec<&str> = thread.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "b", "c", "e"]);
    }

    #[tokio::test]
    async fn test_modified_and_removed_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let mut thread = open(&store);

        thread.apply_batch(vec![added("a", 1)]);
        let mut edit = added("a", 9);
        edit.kind = ChangeKind::Modified;
        let mut delete = added("a", 1);
        delete.kind = ChangeKind::Removed;
        thread.apply_batch(vec![edit, delete]);

        assert_eq!(thread.messages().len(), 1);
        assert_eq!(thread.messages()[0].timestamp.timestamp(), 1_700_000_001);
    }

    #[tokio::test]
    async fn test_existing_history_arrives_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (a, b) = users();
        for text in ["one", "two", "three"] {
            crate::sync::deliver(store.as_ref(), &b, &a, text).await.unwrap();
        }

        let thread = open(&store);
        let texts: Vec<&str> = thread.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_ordered(&thread);
    }
}
