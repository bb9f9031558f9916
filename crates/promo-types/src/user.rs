//! Users (notification recipients) and groups (monitored chats).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A registered user who receives promotion notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Messaging address used as the send recipient
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Ulid::new().to_string(),
            name: name.into(),
            phone: phone.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A monitored chat group. Messages from groups that are not registered
/// are ignored by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    /// Identifier the messaging transport uses for this chat; unique
    pub external_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(external_id: impl Into<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Ulid::new().to_string(),
            external_id: external_id.into(),
            description,
            created_at: now,
            updated_at: now,
        }
    }
}
