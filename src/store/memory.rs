//! In-process document store emulator.
//!
//! Behaves like the managed service as far as the client can tell:
//! server-assigned ids, a strictly monotonic server clock for
//! `server_timestamp()` fields, and live subscriptions that deliver an
//! initial snapshot followed by one batch per write.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    is_server_timestamp, Change, ChangeBatch, ChangeKind, Document, DocumentStore, Fields,
    Subscription, SubscriptionEvent,
};
use crate::error::StoreError;

/// All collections, keyed by collection path then document id.
pub type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

struct Subscriber {
    path: String,
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

#[derive(Default)]
struct Inner {
    collections: Collections,
    subscribers: Vec<Subscriber>,
    last_timestamp: Option<DateTime<Utc>>,
    #[cfg(test)]
    failing_prefixes: Vec<(String, String)>,
}

impl Inner {
    /// Server clock. Never returns the same instant twice.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        // Stored with microsecond precision; compare at that precision.
        let mut now = Utc::now().trunc_subsecs(6);
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    /// Deliver `change` to every live subscriber of `path`, dropping closed ones.
    fn publish(&mut self, path: &str, change: Change) {
        self.subscribers.retain(|sub| {
            if sub.tx.is_closed() {
                tracing::debug!("Dropping closed subscription on {}", sub.path);
                return false;
            }
            if sub.path == path {
                return sub.tx.send(Ok(vec![change.clone()])).is_ok();
            }
            true
        });
    }
}

/// Emulated document store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a previously taken snapshot.
    pub fn from_collections(collections: Collections) -> Self {
        let mut inner = Inner {
            collections,
            ..Default::default()
        };
        inner.last_timestamp = latest_timestamp(&inner.collections);
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Copy of every stored document.
    pub fn collections(&self) -> Collections {
        self.lock().collections.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere; the map is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of live subscriptions.
    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|s| !s.tx.is_closed());
        inner.subscribers.len()
    }

    /// Make every write under `prefix` fail with `reason`.
    #[cfg(test)]
    pub fn fail_writes_under(&self, prefix: &str, reason: &str) {
        self.lock()
            .failing_prefixes
            .push((prefix.to_string(), reason.to_string()));
    }

    /// Deliver an error to every subscriber of `path`.
    #[cfg(test)]
    pub fn push_subscription_error(&self, path: &str, reason: &str) {
        let inner = self.lock();
        for sub in inner.subscribers.iter().filter(|s| s.path == path) {
            let _ = sub.tx.send(Err(StoreError::Subscription {
                path: path.to_string(),
                reason: reason.to_string(),
            }));
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        validate_collection(collection)?;
        validate_id(collection, id)?;

        let inner = self.lock();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                path: collection.to_string(),
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn set(&self, collection: &str, id: &str, mut fields: Fields) -> Result<(), StoreError> {
        validate_collection(collection)?;
        validate_id(collection, id)?;

        let mut inner = self.lock();

        #[cfg(test)]
        if let Some((_, reason)) = inner
            .failing_prefixes
            .iter()
            .find(|(prefix, _)| collection.starts_with(prefix.as_str()))
        {
            return Err(StoreError::Rejected {
                path: format!("{}/{}", collection, id),
                reason: reason.clone(),
            });
        }

        if fields.values().any(is_server_timestamp) {
            let now = inner.next_timestamp();
            let stamp = now.to_rfc3339_opts(SecondsFormat::Micros, true);
            for value in fields.values_mut() {
                if is_server_timestamp(value) {
                    *value = Value::String(stamp.clone());
                }
            }
        }

        let docs = inner.collections.entry(collection.to_string()).or_default();
        let kind = if docs.contains_key(id) {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        docs.insert(id.to_string(), fields.clone());
        tracing::debug!("set {}/{} ({:?})", collection, id, kind);

        let change = Change {
            kind,
            document: Document {
                path: collection.to_string(),
                id: id.to_string(),
                fields,
            },
        };
        inner.publish(collection, change);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        let inner = self.lock();
        Ok(snapshot(&inner.collections, collection, None))
    }

    fn subscribe(&self, collection: &str, order_by: Option<&str>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Err(e) = validate_collection(collection) {
            let _ = tx.send(Err(StoreError::Subscription {
                path: collection.to_string(),
                reason: e.to_string(),
            }));
            return Subscription::new(collection, rx);
        }

        let mut inner = self.lock();
        let initial: ChangeBatch = snapshot(&inner.collections, collection, order_by)
            .into_iter()
            .map(|document| Change {
                kind: ChangeKind::Added,
                document,
            })
            .collect();
        tracing::debug!(
            "subscribe {} ({} existing documents)",
            collection,
            initial.len()
        );
        let _ = tx.send(Ok(initial));

        inner.subscribers.push(Subscriber {
            path: collection.to_string(),
            tx,
        });
        Subscription::new(collection, rx)
    }
}

/// Documents of `collection`, ordered by `order_by` then id.
fn snapshot(collections: &Collections, collection: &str, order_by: Option<&str>) -> Vec<Document> {
    let mut docs: Vec<Document> = collections
        .get(collection)
        .map(|docs| {
            docs.iter()
                .map(|(id, fields)| Document {
                    path: collection.to_string(),
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    if let Some(field) = order_by {
        // Stable: equal keys stay in id order.
        docs.sort_by(|a, b| compare_fields(a.fields.get(field), b.fields.get(field)));
    }
    docs
}

/// Order field values the way a query would: missing first, then numbers, then strings.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Number(_)), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Number(_))) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        _ => Ordering::Equal,
    }
}

/// Newest RFC 3339 timestamp field anywhere in the snapshot.
fn latest_timestamp(collections: &Collections) -> Option<DateTime<Utc>> {
    collections
        .values()
        .flat_map(|docs| docs.values())
        .flat_map(|fields| fields.values())
        .filter_map(Value::as_str)
        .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .max()
}

/// Collection paths alternate collection/document segments, so they have an odd count.
fn validate_collection(path: &str) -> Result<(), StoreError> {
    let segments: Vec<&str> = path.split('/').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) || segments.len() % 2 == 0 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn validate_id(collection: &str, id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.contains('/') {
        return Err(StoreError::InvalidPath(format!("{}/{}", collection, id)));
    }
    Ok(())
}
