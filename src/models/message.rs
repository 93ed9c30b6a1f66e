//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message of a two-party thread.
///
/// The `id` is the store document id and is not part of the stored fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Thread ordering key: creation time, ties broken by id.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, self.id.as_str())
    }

    /// Whether `uid` wrote this message.
    pub fn is_from(&self, uid: &str) -> bool {
        self.from_id == uid
    }
}
