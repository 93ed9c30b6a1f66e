//! Error types for the backend collaborators and message delivery.

use thiserror::Error;

/// Failure of a document store or blob store operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Collection or document path is empty or malformed.
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// A stored record did not match the expected shape.
    #[error("failed to decode {path}/{id}: {reason}")]
    Decode {
        path: String,
        id: String,
        reason: String,
    },

    /// A record could not be turned into document fields.
    #[error("failed to encode record: {0}")]
    Encode(String),

    /// The store refused the write.
    #[error("write to {path} rejected: {reason}")]
    Rejected { path: String, reason: String },

    /// The live subscription reported an error.
    #[error("subscription to {path} failed: {reason}")]
    Subscription { path: String, reason: String },
}

/// Failure of an authentication or onboarding step.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("the email address is badly formatted")]
    InvalidEmail,

    #[error("password should be at least {0} characters")]
    WeakPassword(usize),

    #[error("the email address is already in use by another account")]
    EmailInUse,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("not signed in")]
    NotSignedIn,

    #[error("no user record for uid {0}")]
    MissingProfile(String),

    #[error("failed to push image to storage: {0}")]
    ImageUpload(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of a send that left nothing written.
#[derive(Debug, Error)]
pub enum SendError {
    /// Body was empty after trimming; no write attempted.
    #[error("cannot send an empty message")]
    EmptyBody,

    /// The sender's copy could not be written; the recipient copy was not attempted.
    #[error("failed to save message: {0}")]
    SenderCopy(StoreError),
}
