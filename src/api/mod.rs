//! Command-line operations against the backend

mod chat;
pub mod client;
mod users;

pub use chat::{format_age, format_time, preview};
pub use users::list_users_data;

use anyhow::Result;

/// List recent conversations
pub async fn list_chats(limit: usize) -> Result<()> {
    chat::list_chats(limit).await
}

/// Read messages from a conversation
pub async fn read_messages(with: &str, limit: usize) -> Result<()> {
    chat::read_messages(with, limit).await
}

/// Send a message to a user
pub async fn send_message(to: &str, message: &str) -> Result<()> {
    chat::send_message(to, message).await
}

/// List users that can be messaged
pub async fn list_users() -> Result<()> {
    users::list_users().await
}
