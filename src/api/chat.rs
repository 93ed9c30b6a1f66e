//! Conversation commands: list, read and send from the command line.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};

use super::client::Backend;
use super::users::resolve_user;
use crate::config::Config;
use crate::error::SendError;
use crate::models::ChatUser;
use crate::sync::{deliver, ConversationDirectory, LiveView, ThreadSync};

/// Compact age of a timestamp: `now`, `5m`, `3h`, `12d`.
pub fn format_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - timestamp).num_seconds().max(0);
    match secs {
        0..=59 => "now".to_string(),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86400),
    }
}

/// Local wall-clock time for message lines.
pub fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Truncate to at most `max` characters, marking the cut with `...`.
pub fn preview(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let cut: String = single_line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

async fn resolve_counterparty(backend: &Backend, query: &str) -> Result<ChatUser> {
    match resolve_user(backend.store.as_ref(), query).await? {
        Some(user) => Ok(user),
        None => bail!("No user matches '{}'. Run 'messenger users' to list them.", query),
    }
}

/// List recent conversations (prints to stdout).
pub async fn list_chats(limit: usize) -> Result<()> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;
    let me = backend.current_user().await?;

    let mut directory = ConversationDirectory::open(backend.store.as_ref(), &me.uid, config.ordering);
    directory.drain_pending();

    println!("\nRecent Chats:");
    println!("{:-<60}", "");

    if let Some(status) = directory.status() {
        eprintln!("Warning: {}", status);
    }

    if directory.summaries().is_empty() {
        println!("  (no chats found)");
        return Ok(());
    }

    let now = Utc::now();
    for summary in directory.summaries().iter().take(limit) {
        println!(
            "{}  ({})",
            summary.username,
            format_age(summary.timestamp, now)
        );
        println!("  ID: {}", summary.counterparty_id());
        let sender = if summary.from_id == me.uid { "you" } else { summary.username.as_str() };
        println!("  [{}]: {}", sender, preview(&summary.text, 80));
        println!();
    }

    Ok(())
}

/// Print the conversation with `with` (uid or email).
pub async fn read_messages(with: &str, limit: usize) -> Result<()> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;
    let me = backend.current_user().await?;
    let peer = resolve_counterparty(&backend, with).await?;

    let mut thread = ThreadSync::open(backend.documents(), me, peer);
    thread.drain_pending();

    if let Some(status) = thread.status() {
        eprintln!("Warning: {}", status);
    }

    let messages = thread.messages();
    if messages.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let skip = messages.len().saturating_sub(limit);
    for msg in &messages[skip..] {
        let sender = if msg.is_from(&thread.me().uid) {
            thread.me().username.as_str()
        } else {
            thread.peer().username.as_str()
        };
        println!("[{}] {}: {}", format_time(msg.timestamp), sender, msg.text);
    }

    Ok(())
}

/// Send one message to `to` (uid or email).
pub async fn send_message(to: &str, message: &str) -> Result<()> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;
    let me = backend.current_user().await?;
    let peer = resolve_counterparty(&backend, to).await?;

    let result = deliver(backend.store.as_ref(), &me, &peer, message).await;
    // Whatever was written stays written.
    backend.save()?;

    match result {
        Ok(delivery) => {
            if let Some(summary) = delivery.failure_summary() {
                eprintln!("Warning: {}", summary);
            }
            println!("Message sent.");
            Ok(())
        }
        Err(SendError::EmptyBody) => bail!("Message is empty; nothing sent."),
        Err(e) => Err(e).context("Failed to send message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "now");
        assert_eq!(format_age(now - Duration::seconds(59), now), "now");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m");
        assert_eq!(format_age(now - Duration::hours(3), now), "3h");
        assert_eq!(format_age(now - Duration::days(12), now), "12d");
        // Clock skew: future timestamps read as "now".
        assert_eq!(format_age(now + Duration::minutes(2), now), "now");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 80), "short");
        assert_eq!(preview("line one\nline two", 80), "line one line two");
        assert_eq!(preview("abcdefghij", 8), "abcde...");
        assert_eq!(preview("héllo wörld", 8), "héllo...");
    }
}
