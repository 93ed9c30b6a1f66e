//! Outbound message fan-out.
//!
//! There is no server-side process to copy a message into the recipient's
//! mailbox, so the sender writes every copy itself. The writes are
//! independent: once the sender's copy is stored, later failures are
//! reported in the `Delivery` but nothing is rolled back or retried.

use std::fmt;

use serde_json::{json, Value};

use crate::error::{SendError, StoreError};
use crate::models::ChatUser;
use crate::store::{paths, server_timestamp, DocumentStore, Fields};

/// Writes that follow the sender's copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// `messages/{to}/{from}/{id}`
    RecipientCopy,
    /// `recent_messages/{from}/messages/{to}`
    SenderSummary,
    /// `recent_messages/{to}/messages/{from}`
    RecipientSummary,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::RecipientCopy => write!(f, "recipient copy"),
            Leg::SenderSummary => write!(f, "sender summary"),
            Leg::RecipientSummary => write!(f, "recipient summary"),
        }
    }
}

/// Outcome of a send whose sender copy was stored.
#[derive(Debug)]
pub struct Delivery {
    /// Id shared by both message copies.
    pub message_id: String,
    pub failures: Vec<(Leg, StoreError)>,
}

impl Delivery {
    /// Every write succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line description of the failed writes, if any.
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .failures
            .iter()
            .map(|(leg, e)| format!("{}: {}", leg, e))
            .collect();
        Some(format!("Message sent with errors ({})", parts.join("; ")))
    }
}

/// Send `body` from `from` to `to`.
///
/// The trimmed body is written as the same record, under one server-assigned
/// id, to the sender's and the recipient's message collections, then both
/// conversation summaries are upserted. The store stamps the sender copy;
/// every later write carries that same timestamp.
pub async fn deliver(
    store: &dyn DocumentStore,
    from: &ChatUser,
    to: &ChatUser,
    body: &str,
) -> Result<Delivery, SendError> {
    let text = body.trim();
    if text.is_empty() {
        return Err(SendError::EmptyBody);
    }

    let message_id = store.new_id();
    let record = message_fields(&from.uid, &to.uid, text);

    let sender_path = paths::messages(&from.uid, &to.uid);
    store
        .set(&sender_path, &message_id, record.clone())
        .await
        .map_err(SendError::SenderCopy)?;
    tracing::debug!("Stored message {} for {}", message_id, from.uid);

    // Later writes reuse the time the store gave the sender copy.
    let record = match store.get(&sender_path, &message_id).await {
        Ok(Some(doc)) => doc.fields,
        Ok(None) => record,
        Err(e) => {
            tracing::warn!("Message {}: re-reading sender copy failed: {}", message_id, e);
            record
        }
    };
    let timestamp = record
        .get("timestamp")
        .cloned()
        .unwrap_or_else(server_timestamp);

    let mut failures = Vec::new();

    if let Err(e) = store
        .set(&paths::messages(&to.uid, &from.uid), &message_id, record)
        .await
    {
        failures.push((Leg::RecipientCopy, e));
    }

    // Each side's summary shows the other participant.
    let sender_view = summary_fields(text, to, from, to, &timestamp);
    if let Err(e) = store
        .set(&paths::recent_messages(&from.uid), &to.uid, sender_view)
        .await
    {
        failures.push((Leg::SenderSummary, e));
    }

    let recipient_view = summary_fields(text, from, from, to, &timestamp);
    if let Err(e) = store
        .set(&paths::recent_messages(&to.uid), &from.uid, recipient_view)
        .await
    {
        failures.push((Leg::RecipientSummary, e));
    }

    for (leg, e) in &failures {
        tracing::warn!("Message {}: {} failed: {}", message_id, leg, e);
    }

    Ok(Delivery {
        message_id,
        failures,
    })
}

fn message_fields(from_id: &str, to_id: &str, text: &str) -> Fields {
    let value = json!({
        "fromId": from_id,
        "toId": to_id,
        "text": text,
        "timestamp": server_timestamp(),
    });
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

fn summary_fields(
    text: &str,
    counterparty: &ChatUser,
    from: &ChatUser,
    to: &ChatUser,
    timestamp: &Value,
) -> Fields {
    let value = json!({
        "text": text,
        "username": counterparty.username,
        "profileImageUrl": counterparty.profile_image_url,
        "fromId": from.uid,
        "toId": to.uid,
        "timeStamp": timestamp,
    });
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}
