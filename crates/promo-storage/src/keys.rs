//! Key encoding for secondary indexes.
//!
//! Taste label key format: `{user_id}\0{normalized_label}`.
//! The NUL separator cannot appear in either part, so all of a user's
//! labels share the `{user_id}\0` prefix and sort together.

use crate::error::StorageError;

const SEPARATOR: char = '\0';

/// Key of the per-user taste label index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TasteLabelKey {
    pub user_id: String,
    pub normalized_label: String,
}

impl TasteLabelKey {
    pub fn new(user_id: impl Into<String>, normalized_label: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            normalized_label: normalized_label.into(),
        }
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{}{}", self.user_id, SEPARATOR, self.normalized_label).into_bytes()
    }

    /// Prefix shared by every label key of `user_id`
    pub fn user_prefix(user_id: &str) -> Vec<u8> {
        format!("{}{}", user_id, SEPARATOR).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::MalformedKey(format!("Invalid UTF-8: {}", e)))?;
        let (user_id, label) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| StorageError::MalformedKey(format!("Invalid taste label key: {:?}", s)))?;
        Ok(Self::new(user_id, label))
    }
}
