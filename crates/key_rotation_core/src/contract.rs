use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const EMAIL_TAG_KEY: &str = "emailid";
pub const EMAIL_CHARSET: &str = "UTF-8";
pub const ROTATION_GUIDE_URL: &str =
    "https://docs.aws.amazon.com/IAM/latest/UserGuide/id_credentials_access-keys.html#Using_RotateAccessKey";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub user_name: String,
    pub password_last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessKey {
    pub user_name: String,
    pub access_key_id: String,
    pub status: KeyStatus,
    pub create_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserTag {
    pub key: String,
    pub value: String,
}

/// One page of a `ListUsers` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersPage {
    pub users: Vec<User>,
    pub is_truncated: bool,
    pub marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationBatch {
    pub user_name: String,
    pub email: String,
    pub keys: Vec<AccessKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub account_id: String,
    pub users_scanned: usize,
    pub users_with_console_login: usize,
    pub stale_keys: usize,
    pub owners_with_stale_keys: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub owners_without_email: usize,
    pub lookup_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}
