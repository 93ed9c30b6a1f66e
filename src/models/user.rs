//! User-related models

use serde::{Deserialize, Serialize};

/// Stored shape of a `users/{uid}` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub profile_image_url: String,
}

/// A user as shown in the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserRecord", into = "UserRecord")]
pub struct ChatUser {
    pub uid: String,
    pub email: String,
    /// Part of the email before the first `@`.
    pub username: String,
    pub profile_image_url: String,
}

impl ChatUser {
    pub fn new(
        uid: impl Into<String>,
        email: impl Into<String>,
        profile_image_url: impl Into<String>,
    ) -> Self {
        let email = email.into();
        Self {
            uid: uid.into(),
            username: username_from_email(&email),
            email,
            profile_image_url: profile_image_url.into(),
        }
    }
}

impl From<UserRecord> for ChatUser {
    fn from(record: UserRecord) -> Self {
        Self::new(record.uid, record.email, record.profile_image_url)
    }
}

impl From<ChatUser> for UserRecord {
    fn from(user: ChatUser) -> Self {
        Self {
            uid: user.uid,
            email: user.email,
            profile_image_url: user.profile_image_url,
        }
    }
}

/// Display name derived from an email address.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_local_part() {
        assert_eq!(username_from_email("test@gmail.com"), "test");
        assert_eq!(username_from_email("a@b@c"), "a");
        assert_eq!(username_from_email("nodomain"), "nodomain");
        assert_eq!(username_from_email(""), "");
    }

    #[test]
    fn test_user_decodes_with_missing_fields() {
        let value = serde_json::json!({ "uid": "u1", "email": "ana@example.com" });
        let user: ChatUser = serde_json::from_value(value).unwrap();
        assert_eq!(user.uid, "u1");
        assert_eq!(user.username, "ana");
        assert_eq!(user.profile_image_url, "");
    }

    #[test]
    fn test_user_serializes_record_shape() {
        let user = ChatUser::new("u1", "ana@example.com", "memory://profile-images/u1");
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "uid": "u1",
                "email": "ana@example.com",
                "profileImageUrl": "memory://profile-images/u1",
            })
        );
    }
}
