//! Repository traits and their RocksDB implementations.
//!
//! Services depend on these traits only, so tests can swap in
//! [`InMemoryStore`](crate::InMemoryStore).

use async_trait::async_trait;

use promo_types::{Group, Taste, User};

use crate::db::Storage;
use crate::error::StorageError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save(&self, user: &User) -> Result<(), StorageError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError>;

    /// Batch lookup. Missing ids are skipped silently.
    async fn find_many_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StorageError>;

    async fn find_all(&self) -> Result<Vec<User>, StorageError>;

    /// Delete the user and cascade to their taste rows.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn save(&self, group: &Group) -> Result<(), StorageError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Group>, StorageError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Group>, StorageError>;

    async fn find_all(&self) -> Result<Vec<Group>, StorageError>;

    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait TasteRepository: Send + Sync {
    /// Insert or update. At most one taste per `(user_id, normalized_label)`.
    async fn save(&self, taste: &Taste) -> Result<(), StorageError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Taste>, StorageError>;

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Taste>, StorageError>;

    async fn find_by_user_and_label(
        &self,
        user_id: &str,
        normalized_label: &str,
    ) -> Result<Option<Taste>, StorageError>;

    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

#[async_trait]
impl UserRepository for Storage {
    async fn save(&self, user: &User) -> Result<(), StorageError> {
        self.put_user(user)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError> {
        self.get_user(id)
    }

    async fn find_many_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StorageError> {
        self.get_users(ids)
    }

    async fn find_all(&self) -> Result<Vec<User>, StorageError> {
        self.list_users()
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.delete_user(id)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Storage::ping(self)
    }
}

#[async_trait]
impl GroupRepository for Storage {
    async fn save(&self, group: &Group) -> Result<(), StorageError> {
        self.put_group(group)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Group>, StorageError> {
        self.get_group(id)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Group>, StorageError> {
        self.get_group_by_external_id(external_id)
    }

    async fn find_all(&self) -> Result<Vec<Group>, StorageError> {
        self.list_groups()
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.delete_group(id)
    }
}

#[async_trait]
impl TasteRepository for Storage {
    async fn save(&self, taste: &Taste) -> Result<(), StorageError> {
        self.put_taste(taste)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Taste>, StorageError> {
        self.get_taste(id)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Taste>, StorageError> {
        self.get_tastes_for_user(user_id)
    }

    async fn find_by_user_and_label(
        &self,
        user_id: &str,
        normalized_label: &str,
    ) -> Result<Option<Taste>, StorageError> {
        self.get_taste_by_label(user_id, normalized_label)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.delete_taste(id)
    }
}
