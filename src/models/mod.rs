//! Data models for users, messages and conversation summaries

mod message;
mod summary;
mod user;

pub use message::*;
pub use summary::*;
pub use user::*;
