//! In-memory repositories for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use promo_types::{Group, Taste, User};

use crate::error::StorageError;
use crate::repository::{GroupRepository, TasteRepository, UserRepository};

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    tastes: BTreeMap<String, Taste>,
}

/// Hash-map backed store with the same uniqueness and cascade rules as
/// [`Storage`](crate::Storage).
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Number of taste rows across all users.
    pub fn taste_count(&self) -> usize {
        self.tables.lock().map(|t| t.tastes.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn save(&self, user: &User) -> Result<(), StorageError> {
        self.tables()?.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError> {
        Ok(self.tables()?.users.get(id).cloned())
    }

    async fn find_many_by_ids(&self, ids: &[String]) -> Result<Vec<User>, StorageError> {
        let tables = self.tables()?;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn find_all(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.tables()?.users.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut tables = self.tables()?;
        if tables.users.remove(id).is_none() {
            return Ok(false);
        }
        tables.tastes.retain(|_, taste| taste.user_id != id);
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.tables().map(|_| ())
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn save(&self, group: &Group) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        let taken = tables
            .groups
            .values()
            .any(|g| g.external_id == group.external_id && g.id != group.id);
        if taken {
            return Err(StorageError::Conflict(format!(
                "group external id {} already registered",
                group.external_id
            )));
        }
        tables.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Group>, StorageError> {
        Ok(self.tables()?.groups.get(id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Group>, StorageError> {
        Ok(self
            .tables()?
            .groups
            .values()
            .find(|g| g.external_id == external_id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Group>, StorageError> {
        Ok(self.tables()?.groups.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.tables()?.groups.remove(id).is_some())
    }
}

#[async_trait]
impl TasteRepository for InMemoryStore {
    async fn save(&self, taste: &Taste) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        let taken = tables.tastes.values().any(|t| {
            t.user_id == taste.user_id
                && t.normalized_label == taste.normalized_label
                && t.id != taste.id
        });
        if taken {
            return Err(StorageError::Conflict(format!(
                "user {} already has taste '{}'",
                taste.user_id, taste.normalized_label
            )));
        }
        tables.tastes.insert(taste.id.clone(), taste.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Taste>, StorageError> {
        Ok(self.tables()?.tastes.get(id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Taste>, StorageError> {
        let mut tastes: Vec<Taste> = self
            .tables()?
            .tastes
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tastes.sort_by(|a, b| a.normalized_label.cmp(&b.normalized_label));
        Ok(tastes)
    }

    async fn find_by_user_and_label(
        &self,
        user_id: &str,
        normalized_label: &str,
    ) -> Result<Option<Taste>, StorageError> {
        Ok(self
            .tables()?
            .tastes
            .values()
            .find(|t| t.user_id == user_id && t.normalized_label == normalized_label)
            .cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.tables()?.tastes.remove(id).is_some())
    }
}
