//! Authentication module
//!
//! `AuthProvider` is the auth collaborator: it owns credentials and knows
//! which user is signed in. `accounts` holds the emulator implementation and
//! `session` the onboarding flow (account, profile image, user record) plus
//! the `signup`/`login`/`logout`/`status` commands.

pub mod accounts;
pub mod session;

use async_trait::async_trait;

use crate::error::AuthError;

pub use session::{login, logout, signup, status};

/// Minimum password length accepted on sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Authentication collaborator.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Id of the signed-in user.
    fn current_user_id(&self) -> Option<String>;

    /// Create an account and sign it in. Returns the new user id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, AuthError>;

    /// Sign in to an existing account. Returns its user id.
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError>;

    fn sign_out(&self);
}
