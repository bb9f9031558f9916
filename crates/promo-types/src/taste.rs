//! Taste types.
//!
//! A taste is a user-declared interest label. Its id doubles as the point id
//! in the vector index so the relational row and the vector stay in lock-step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Normalize a taste label for per-user uniqueness: trim and lowercase.
///
/// Idempotent: `normalize_label(&normalize_label(x)) == normalize_label(x)`.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// A user's declared interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taste {
    /// ULID string; also the vector point id
    pub id: String,
    pub user_id: String,
    /// Trimmed, as entered by the user
    pub label: String,
    pub normalized_label: String,
    /// Model that produced the indexed vector
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Taste {
    /// Create a new taste with a fresh id.
    pub fn new(user_id: impl Into<String>, label: &str, embedding_model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Ulid::new().to_string(),
            user_id: user_id.into(),
            label: label.trim().to_string(),
            normalized_label: normalize_label(label),
            embedding_model: embedding_model.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the label in place, keeping id and creation time.
    pub fn relabel(&mut self, label: &str, embedding_model: impl Into<String>) {
        self.label = label.trim().to_string();
        self.normalized_label = normalize_label(label);
        self.embedding_model = embedding_model.into();
        self.updated_at = Utc::now();
    }

    /// Point id used in the vector index.
    pub fn point_id(&self) -> &str {
        &self.id
    }
}

/// Result of a similarity query against the taste index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteVectorMatch {
    pub taste_id: String,
    pub user_id: String,
    /// The text that was actually indexed (possibly an enhanced search label)
    pub label: String,
    /// Label before enhancement, when it differs
    pub original_label: Option<String>,
    pub score: f32,
}
