//! Echo bot: a built-in counterparty that answers every message it gets.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::delivery::deliver;
use crate::error::StoreError;
use crate::models::{ChatUser, ConversationSummary};
use crate::store::{paths, to_fields, ChangeBatch, ChangeKind, DocumentStore};

pub const ECHO_UID: &str = "echo";
pub const ECHO_EMAIL: &str = "echo@messenger.local";

pub fn echo_user() -> ChatUser {
    ChatUser::new(ECHO_UID, ECHO_EMAIL, "")
}

/// Reply for a summary in the bot's conversation list, or `None` for the bot's own messages.
pub fn reply_for(summary: &ConversationSummary) -> Option<String> {
    if summary.from_id == ECHO_UID {
        return None;
    }
    Some(format!("echo: {}", summary.text))
}

/// Make sure the bot has a `users` record so it shows up in the user list.
pub async fn register(store: &dyn DocumentStore) -> Result<(), StoreError> {
    if store.get(paths::USERS, ECHO_UID).await?.is_none() {
        store
            .set(paths::USERS, ECHO_UID, to_fields(&echo_user())?)
            .await?;
        tracing::info!("Registered echo bot user");
    }
    Ok(())
}

/// Running echo bot. Stops when dropped.
pub struct EchoBot {
    handle: JoinHandle<()>,
}

impl EchoBot {
    pub fn spawn(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            handle: tokio::spawn(run(store)),
        }
    }
}

impl Drop for EchoBot {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(store: Arc<dyn DocumentStore>) {
    let bot = echo_user();
    let mut subscription = store.subscribe(&paths::recent_messages(ECHO_UID), None);
    tracing::debug!("Echo bot listening on {}", subscription.path());

    // The initial snapshot goes through the same path: a summary the bot
    // already answered carries the bot's own reply, so only unanswered ones
    // get a reply.
    while let Some(event) = subscription.next().await {
        match event {
            Ok(batch) => answer(store.as_ref(), &bot, batch).await,
            Err(e) => tracing::warn!("Echo bot: {}", e),
        }
    }
}

async fn answer(store: &dyn DocumentStore, bot: &ChatUser, batch: ChangeBatch) {
    for change in batch {
        if change.kind == ChangeKind::Removed {
            continue;
        }
        let summary = match change.document.decode::<ConversationSummary>() {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("Echo bot: {}", e);
                continue;
            }
        };
        let Some(reply) = reply_for(&summary) else {
            continue;
        };

        let peer = match store.get(paths::USERS, &summary.from_id).await {
            Ok(Some(doc)) => match doc.decode::<ChatUser>() {
                Ok(user) => user,
                Err(e) => {
                    tracing::warn!("Echo bot: {}", e);
                    continue;
                }
            },
            Ok(None) => {
                tracing::warn!("Echo bot: unknown sender {}", summary.from_id);
                continue;
            }
            Err(e) => {
                tracing::warn!("Echo bot: {}", e);
                continue;
            }
        };

        match deliver(store, bot, &peer, &reply).await {
            Ok(delivery) => {
                tracing::debug!("Echo bot replied to {} ({})", peer.uid, delivery.message_id)
            }
            Err(e) => tracing::warn!("Echo bot reply to {} failed: {}", peer.uid, e),
        }
    }
}
