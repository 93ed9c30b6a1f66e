//! Emulated auth provider: email/password accounts with salted digests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{AuthProvider, MIN_PASSWORD_LEN};
use crate::error::AuthError;

/// Stored credentials of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    /// base64(SHA-256("{uid}:{password}"))
    pub password_digest: String,
}

impl Account {
    fn new(uid: String, password: &str) -> Self {
        let password_digest = password_digest(&uid, password);
        Self {
            uid,
            password_digest,
        }
    }

    fn verify(&self, password: &str) -> bool {
        password_digest(&self.uid, password) == self.password_digest
    }
}

fn password_digest(uid: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uid.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Canonical form of an email address used as the account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::InvalidEmail),
    }
}

/// Accounts keyed by normalized email.
#[derive(Default)]
pub struct MemoryAuth {
    accounts: Mutex<BTreeMap<String, Account>>,
    current: Mutex<Option<String>>,
}

impl MemoryAuth {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore accounts and, if it still exists, the signed-in user.
    pub fn from_accounts(accounts: BTreeMap<String, Account>, current: Option<String>) -> Self {
        let current = current.filter(|uid| accounts.values().any(|a| &a.uid == uid));
        Self {
            accounts: Mutex::new(accounts),
            current: Mutex::new(current),
        }
    }

    pub fn accounts(&self) -> BTreeMap<String, Account> {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_current(&self, uid: Option<String>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = uid;
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    fn current_user_id(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
        }

        let uid = {
            let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse);
            }
            let uid = uuid::Uuid::new_v4().simple().to_string();
            accounts.insert(email.clone(), Account::new(uid.clone(), password));
            uid
        };

        tracing::info!("Created account {} for {}", uid, email);
        self.set_current(Some(uid.clone()));
        Ok(uid)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        let uid = {
            let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            match accounts.get(&email) {
                Some(account) if account.verify(password) => account.uid.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        self.set_current(Some(uid.clone()));
        Ok(uid)
    }

    fn sign_out(&self) {
        self.set_current(None);
    }
}
