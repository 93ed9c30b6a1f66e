//! User directory: everyone who can be messaged.

use anyhow::Result;

use super::client::Backend;
use crate::config::Config;
use crate::error::StoreError;
use crate::models::ChatUser;
use crate::store::{paths, DocumentStore};

/// All users except `exclude_uid`, ordered by username.
pub async fn list_users_data(
    store: &dyn DocumentStore,
    exclude_uid: &str,
) -> Result<Vec<ChatUser>, StoreError> {
    let mut users = Vec::new();
    for doc in store.list(paths::USERS).await? {
        match doc.decode::<ChatUser>() {
            Ok(user) if user.uid != exclude_uid => users.push(user),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping user record: {}", e),
        }
    }
    users.sort_by(|a, b| a.username.cmp(&b.username).then_with(|| a.uid.cmp(&b.uid)));
    Ok(users)
}

/// Find a user by uid or (case-insensitive) email.
pub async fn resolve_user(
    store: &dyn DocumentStore,
    query: &str,
) -> Result<Option<ChatUser>, StoreError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }
    if !query.contains('/') {
        if let Some(doc) = store.get(paths::USERS, query).await? {
            return Ok(Some(doc.decode()?));
        }
    }

    let wanted = query.to_lowercase();
    for doc in store.list(paths::USERS).await? {
        if let Ok(user) = doc.decode::<ChatUser>() {
            if user.email.to_lowercase() == wanted {
                return Ok(Some(user));
            }
        }
    }
    Ok(None)
}

/// List everyone the signed-in user can message (prints to stdout).
pub async fn list_users() -> Result<()> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;
    let me = backend.current_user().await?;
    crate::sync::echo::register(backend.store.as_ref()).await?;
    backend.save()?;

    let users = list_users_data(backend.store.as_ref(), &me.uid).await?;

    println!("\nUsers:");
    println!("{:-<60}", "");

    if users.is_empty() {
        println!("  (no other users)");
        return Ok(());
    }

    for user in &users {
        println!("{}", user.username);
        println!("  Email: {}", user.email);
        println!("  ID:    {}", user.uid);
    }

    Ok(())
}
