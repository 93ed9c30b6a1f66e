//! Onboarding flow and the account commands.

use std::path::Path;

use anyhow::{Context, Result};

use super::accounts::normalize_email;
use super::AuthProvider;
use crate::api::client::Backend;
use crate::config::Config;
use crate::error::AuthError;
use crate::models::ChatUser;
use crate::store::blob::BlobStore;
use crate::store::{paths, to_fields, DocumentStore};

/// Create an account, upload its profile image and write its `users` record.
///
/// Steps run in order and the first failure ends the flow; completed steps
/// are not undone.
pub async fn create_account(
    auth: &dyn AuthProvider,
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    email: &str,
    password: &str,
    image: Option<Vec<u8>>,
) -> Result<ChatUser, AuthError> {
    let uid = auth.sign_up(email, password).await?;
    tracing::info!("Successfully created user: {}", uid);

    let profile_image_url = match image {
        Some(bytes) => {
            let url = blobs
                .put(&uid, bytes)
                .await
                .map_err(AuthError::ImageUpload)?;
            tracing::info!("Successfully stored image with url: {}", url);
            url
        }
        None => String::new(),
    };

    let user = ChatUser::new(uid, normalize_email(email), profile_image_url);
    store
        .set(paths::USERS, &user.uid, to_fields(&user)?)
        .await?;
    tracing::info!("Successfully stored user info for {}", user.uid);
    Ok(user)
}

/// Fetch the `users` record for `uid`.
pub async fn fetch_user(store: &dyn DocumentStore, uid: &str) -> Result<ChatUser, AuthError> {
    let doc = store
        .get(paths::USERS, uid)
        .await?
        .ok_or_else(|| AuthError::MissingProfile(uid.to_string()))?;
    let mut user: ChatUser = doc.decode()?;
    if user.uid.is_empty() {
        user.uid = doc.id;
    }
    Ok(user)
}

/// Profile of the signed-in user.
pub async fn current_user(
    auth: &dyn AuthProvider,
    store: &dyn DocumentStore,
) -> Result<ChatUser, AuthError> {
    let uid = auth.current_user_id().ok_or(AuthError::NotSignedIn)?;
    fetch_user(store, &uid).await
}

/// Run `create_account` against `backend` and persist every step that completed.
async fn onboard(
    backend: &Backend,
    email: &str,
    password: &str,
    image: Option<Vec<u8>>,
) -> Result<ChatUser> {
    let result = create_account(
        backend.auth.as_ref(),
        backend.store.as_ref(),
        backend.blobs.as_ref(),
        email,
        password,
        image,
    )
    .await;
    // Steps done before a failure stay done.
    backend.save()?;
    result.context("Failed to create user")
}

/// Create an account and sign in as it.
pub async fn signup(email: &str, password: &str, image: Option<&Path>) -> Result<()> {
    let mut config = Config::load()?;
    let backend = Backend::open(&config)?;

    let image = match image {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?,
        ),
        None => None,
    };

    let user = onboard(&backend, email, password, image).await?;

    config.set_session(&user.uid, &user.email);
    config.save()?;

    println!("Successfully created user: {}", user.uid);
    if !user.profile_image_url.is_empty() {
        println!("Profile image: {}", user.profile_image_url);
    }
    Ok(())
}

/// Sign in to an existing account.
pub async fn login(email: &str, password: &str) -> Result<()> {
    let mut config = Config::load()?;
    let backend = Backend::open(&config)?;

    let uid = backend
        .auth
        .sign_in(email, password)
        .await
        .context("Failed to login user")?;
    let user = fetch_user(backend.store.as_ref(), &uid)
        .await
        .context("Failed to load user profile")?;

    config.set_session(&user.uid, &user.email);
    config.save()?;

    println!("Successfully logged in as user: {}", user.uid);
    Ok(())
}

/// Forget the signed-in user.
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    let backend = Backend::open(&config)?;
    backend.auth.sign_out();
    config.clear_session();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Display the current session.
pub async fn status() -> Result<()> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;

    match backend.auth.current_user_id() {
        Some(uid) => match fetch_user(backend.store.as_ref(), &uid).await {
            Ok(user) => {
                println!("Signed in:   {} ({})", user.username, user.email);
                println!("  uid:       {}", user.uid);
                if !user.profile_image_url.is_empty() {
                    println!("  image:     {}", user.profile_image_url);
                }
            }
            Err(e) => println!("Signed in:   {} (profile unavailable: {})", uid, e),
        },
        None => println!("Signed in:   no"),
    }

    println!("Ordering:    {:?}", config.ordering);
    println!("Echo bot:    {}", if config.echo_bot { "on" } else { "off" });
    println!("Data file:   {}", config.snapshot_path()?.display());

    if backend.auth.current_user_id().is_none() {
        println!("\nRun 'messenger login' or 'messenger signup' to authenticate.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::accounts::MemoryAuth;
    use crate::error::StoreError;
    use crate::store::blob::MemoryBlobStore;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_create_account_writes_profile() {
        let auth = MemoryAuth::new();
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();

        let user = create_account(&auth, &store, &blobs, "Ana@Example.com", "secret1", Some(vec![7]))
            .await
            .unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.username, "ana");
        assert_eq!(
            user.profile_image_url,
            MemoryBlobStore::url_for(&user.uid)
        );

        let fetched = current_user(&auth, &store).await.unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test]
    async fn test_image_upload_failure_stops_flow() {
        let auth = MemoryAuth::new();
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();

        let err = create_account(&auth, &store, &blobs, "ana@example.com", "secret1", Some(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ImageUpload(StoreError::Rejected { .. })));

        // The account exists but no profile was written.
        assert!(auth.current_user_id().is_some());
        assert!(matches!(
            current_user(&auth, &store).await,
            Err(AuthError::MissingProfile(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_signup_keeps_the_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");

        let backend = Backend::load_from(&path, None).unwrap();
        let err = onboard(&backend, "ana@example.com", "secret1", Some(Vec::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to create user"));

        let reloaded = Backend::load_from(&path, None).unwrap();
        let uid = reloaded
            .auth
            .sign_in("ana@example.com", "secret1")
            .await
            .unwrap();
        assert!(!uid.is_empty());
        assert!(matches!(
            reloaded.auth.sign_up("ana@example.com", "secret1").await,
            Err(AuthError::EmailInUse)
        ));
        // The profile step never ran.
        assert!(matches!(
            fetch_user(reloaded.store.as_ref(), &uid).await,
            Err(AuthError::MissingProfile(_))
        ));
    }

    #[tokio::test]
    async fn test_no_image_leaves_url_empty() {
        let auth = MemoryAuth::new();
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();

        let user = create_account(&auth, &store, &blobs, "ben@example.com", "secret1", None)
            .await
            .unwrap();
        assert_eq!(user.profile_image_url, "");
        assert!(blobs.blobs().is_empty());
    }

    #[tokio::test]
    async fn test_current_user_when_signed_out() {
        let auth = MemoryAuth::new();
        let store = MemoryStore::new();
        assert!(matches!(
            current_user(&auth, &store).await,
            Err(AuthError::NotSignedIn)
        ));
    }
}
