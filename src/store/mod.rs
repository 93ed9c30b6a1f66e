//! Document store collaborator
//!
//! The client talks to its backend through three small traits: a document
//! store with live change subscriptions (this module), a blob store for
//! profile images (`blob`) and an auth provider (`crate::auth`). The
//! in-process emulator implementations live next to the traits.

pub mod blob;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// Key of the placeholder object the store replaces with its own clock.
const SERVER_VALUE_KEY: &str = ".sv";

/// Placeholder field value resolved to the server time when written.
pub fn server_timestamp() -> Value {
    serde_json::json!({ SERVER_VALUE_KEY: "timestamp" })
}

/// Whether `value` is the `server_timestamp()` placeholder.
pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|o| o.get(SERVER_VALUE_KEY))
        .and_then(Value::as_str)
        == Some("timestamp")
}

/// Collection paths used by the client.
pub mod paths {
    pub const USERS: &str = "users";

    /// Messages as seen by `owner` in the conversation with `counterparty`.
    pub fn messages(owner: &str, counterparty: &str) -> String {
        format!("messages/{}/{}", owner, counterparty)
    }

    /// Conversation summaries of `owner`, keyed by counterparty id.
    pub fn recent_messages(owner: &str) -> String {
        format!("recent_messages/{}/messages", owner)
    }
}

/// A stored document: collection path, id and fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: String,
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Decode the fields into a record type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| StoreError::Decode {
            path: self.path.clone(),
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Encode a record as document fields.
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Encode(format!("expected an object, got {}", other))),
        Err(e) => Err(StoreError::Encode(e.to_string())),
    }
}

/// Kind of a single change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    /// The emulator has no delete operation; managed backends emit this.
    #[allow(dead_code)]
    Removed,
}

/// One document change delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub document: Document,
}

/// Changes delivered together, in store-determined order.
pub type ChangeBatch = Vec<Change>;

/// Item delivered by a subscription: a batch, or an error the store reported.
pub type SubscriptionEvent = Result<ChangeBatch, StoreError>;

/// Live standing query over one collection.
///
/// Dropping the subscription unsubscribes.
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, rx: mpsc::UnboundedReceiver<SubscriptionEvent>) -> Self {
        Self {
            path: path.into(),
            rx,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next event. Returns `None` once the store has gone away.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<SubscriptionEvent> {
        self.rx.try_recv().ok()
    }
}

/// Document database with per-document reads/writes and live subscriptions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fresh document id for an auto-id write.
    fn new_id(&self) -> String;

    /// Fetch one document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or replace one document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Fetch every document of a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Start a live subscription.
    ///
    /// The first batch holds every existing document as `Added`, ordered by
    /// `order_by` (then id). Each later write produces one batch.
    fn subscribe(&self, collection: &str, order_by: Option<&str>) -> Subscription;
}
