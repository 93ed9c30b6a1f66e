//! Conversation summary ("recent message") model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest message of a conversation, as listed in the conversation directory.
///
/// Stored under `recent_messages/{owner}/messages/{counterparty}`. The
/// counterparty's name and image are denormalized into the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Copy of the change record id, which is the counterparty id.
    #[serde(skip)]
    pub document_id: String,
    pub text: String,
    pub username: String,
    #[serde(default)]
    pub profile_image_url: String,
    pub from_id: String,
    pub to_id: String,
    #[serde(rename = "timeStamp")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn counterparty_id(&self) -> &str {
        &self.document_id
    }
}
