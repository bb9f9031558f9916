//! RocksDB wrapper for promo-radar records.
//!
//! Provides:
//! - Database open with column family setup
//! - Record CRUD for users, groups and tastes
//! - Secondary indexes kept in the same WriteBatch as the record
//! - Uniqueness checks serialized by a writer lock

use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use promo_types::{Group, Taste, User};

use crate::column_families::{
    build_cf_descriptors, CF_GROUPS, CF_GROUP_EXTERNAL_IDS, CF_TASTES, CF_TASTE_LABELS, CF_USERS,
};
use crate::error::StorageError;
use crate::keys::TasteLabelKey;

/// Main storage interface for promo-radar records
pub struct Storage {
    db: DB,
    /// Serializes read-check-write sequences that enforce uniqueness
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::MissingColumnFamily(name.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_string(&self, cf_name: &str, key: &[u8]) -> Result<Option<String>, StorageError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::CorruptRecord(e.to_string())),
            None => Ok(None),
        }
    }

    fn scan_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>, StorageError> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    // ==================== Users ====================

    /// Store a user, replacing any previous version.
    pub fn put_user(&self, user: &User) -> Result<(), StorageError> {
        let cf = self.cf(CF_USERS)?;
        self.db
            .put_cf(cf, user.id.as_bytes(), serde_json::to_vec(user)?)?;
        debug!(user_id = %user.id, "Stored user");
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        self.get_json(CF_USERS, user_id.as_bytes())
    }

    /// Batch lookup. Unknown ids are skipped; order follows `user_ids`.
    pub fn get_users(&self, user_ids: &[String]) -> Result<Vec<User>, StorageError> {
        let cf = self.cf(CF_USERS)?;
        let keys = user_ids.iter().map(|id| (cf, id.as_bytes()));
        let mut users = Vec::with_capacity(user_ids.len());
        for result in self.db.multi_get_cf(keys) {
            if let Some(bytes) = result? {
                users.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(users)
    }

    /// All users ordered by id (creation order for ULIDs).
    pub fn list_users(&self) -> Result<Vec<User>, StorageError> {
        self.scan_all(CF_USERS)
    }

    /// Delete a user and all of their taste rows atomically.
    ///
    /// Returns false if the user did not exist.
    pub fn delete_user(&self, user_id: &str) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        if self.get_user(user_id)?.is_none() {
            return Ok(false);
        }

        let users_cf = self.cf(CF_USERS)?;
        let tastes_cf = self.cf(CF_TASTES)?;
        let labels_cf = self.cf(CF_TASTE_LABELS)?;

        let mut batch = WriteBatch::default();
        let label_entries = self.taste_label_entries(user_id)?;
        for (label_key, taste_id) in &label_entries {
            batch.delete_cf(labels_cf, label_key);
            batch.delete_cf(tastes_cf, taste_id.as_bytes());
        }
        batch.delete_cf(users_cf, user_id.as_bytes());
        self.db.write(batch)?;

        debug!(
            user_id,
            tastes = label_entries.len(),
            "Deleted user with tastes"
        );
        Ok(true)
    }

    // ==================== Groups ====================

    /// Store a group. Fails with `Conflict` if another group already uses
    /// the same external id.
    pub fn put_group(&self, group: &Group) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        let groups_cf = self.cf(CF_GROUPS)?;
        let index_cf = self.cf(CF_GROUP_EXTERNAL_IDS)?;

        if let Some(owner) = self.get_string(CF_GROUP_EXTERNAL_IDS, group.external_id.as_bytes())? {
            if owner != group.id {
                return Err(StorageError::Conflict(format!(
                    "group external id {} already registered",
                    group.external_id
                )));
            }
        }

        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get_group(&group.id)? {
            if previous.external_id != group.external_id {
                batch.delete_cf(index_cf, previous.external_id.as_bytes());
            }
        }
        batch.put_cf(groups_cf, group.id.as_bytes(), serde_json::to_vec(group)?);
        batch.put_cf(index_cf, group.external_id.as_bytes(), group.id.as_bytes());
        self.db.write(batch)?;

        debug!(group_id = %group.id, external_id = %group.external_id, "Stored group");
        Ok(())
    }

    pub fn get_group(&self, group_id: &str) -> Result<Option<Group>, StorageError> {
        self.get_json(CF_GROUPS, group_id.as_bytes())
    }

    pub fn get_group_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Group>, StorageError> {
        match self.get_string(CF_GROUP_EXTERNAL_IDS, external_id.as_bytes())? {
            Some(group_id) => self.get_group(&group_id),
            None => Ok(None),
        }
    }

    pub fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        self.scan_all(CF_GROUPS)
    }

    pub fn delete_group(&self, group_id: &str) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let Some(group) = self.get_group(group_id)? else {
            return Ok(false);
        };

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_GROUP_EXTERNAL_IDS)?, group.external_id.as_bytes());
        batch.delete_cf(self.cf(CF_GROUPS)?, group_id.as_bytes());
        self.db.write(batch)?;

        debug!(group_id, "Deleted group");
        Ok(true)
    }

    // ==================== Tastes ====================

    /// Store a taste. Fails with `Conflict` if the user already has a
    /// different taste with the same normalized label.
    pub fn put_taste(&self, taste: &Taste) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        let tastes_cf = self.cf(CF_TASTES)?;
        let labels_cf = self.cf(CF_TASTE_LABELS)?;

        let label_key = TasteLabelKey::new(&taste.user_id, &taste.normalized_label);
        if let Some(owner) = self.get_string(CF_TASTE_LABELS, &label_key.to_bytes())? {
            if owner != taste.id {
                return Err(StorageError::Conflict(format!(
                    "user {} already has taste '{}'",
                    taste.user_id, taste.normalized_label
                )));
            }
        }

        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get_taste(&taste.id)? {
            let previous_key = TasteLabelKey::new(&previous.user_id, &previous.normalized_label);
            if previous_key != label_key {
                batch.delete_cf(labels_cf, previous_key.to_bytes());
            }
        }
        batch.put_cf(tastes_cf, taste.id.as_bytes(), serde_json::to_vec(taste)?);
        batch.put_cf(labels_cf, label_key.to_bytes(), taste.id.as_bytes());
        self.db.write(batch)?;

        debug!(taste_id = %taste.id, user_id = %taste.user_id, "Stored taste");
        Ok(())
    }

    pub fn get_taste(&self, taste_id: &str) -> Result<Option<Taste>, StorageError> {
        self.get_json(CF_TASTES, taste_id.as_bytes())
    }

    pub fn get_taste_by_label(
        &self,
        user_id: &str,
        normalized_label: &str,
    ) -> Result<Option<Taste>, StorageError> {
        let key = TasteLabelKey::new(user_id, normalized_label);
        match self.get_string(CF_TASTE_LABELS, &key.to_bytes())? {
            Some(taste_id) => self.get_taste(&taste_id),
            None => Ok(None),
        }
    }

    /// (label index key, taste id) pairs for one user.
    fn taste_label_entries(&self, user_id: &str) -> Result<Vec<(Vec<u8>, String)>, StorageError> {
        let labels_cf = self.cf(CF_TASTE_LABELS)?;
        let prefix = TasteLabelKey::user_prefix(user_id);

        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator_cf(labels_cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            // Stop once past this user's prefix
            if !key.starts_with(&prefix) {
                break;
            }
            let taste_id = String::from_utf8(value.to_vec())
                .map_err(|e| StorageError::CorruptRecord(e.to_string()))?;
            entries.push((key.to_vec(), taste_id));
        }
        Ok(entries)
    }

    /// All tastes of a user, ordered by normalized label.
    pub fn get_tastes_for_user(&self, user_id: &str) -> Result<Vec<Taste>, StorageError> {
        let mut tastes = Vec::new();
        for (_, taste_id) in self.taste_label_entries(user_id)? {
            if let Some(taste) = self.get_taste(&taste_id)? {
                tastes.push(taste);
            }
        }
        Ok(tastes)
    }

    pub fn delete_taste(&self, taste_id: &str) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let Some(taste) = self.get_taste(taste_id)? else {
            return Ok(false);
        };

        let label_key = TasteLabelKey::new(&taste.user_id, &taste.normalized_label);
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_TASTE_LABELS)?, label_key.to_bytes());
        batch.delete_cf(self.cf(CF_TASTES)?, taste_id.as_bytes());
        self.db.write(batch)?;

        debug!(taste_id, "Deleted taste");
        Ok(true)
    }

    /// Cheap liveness probe used by the health check.
    pub fn ping(&self) -> Result<(), StorageError> {
        let cf = self.cf(CF_USERS)?;
        let mut iter = self.db.iterator_cf(cf, IteratorMode::Start);
        if let Some(item) = iter.next() {
            item?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_families::ALL_CF_NAMES;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_user_roundtrip_and_batch_lookup() {
        let (storage, _temp) = create_test_storage();
        let alice = User::new("Alice", "5511999990001");
        let bob = User::new("Bob", "5511999990002");
        storage.put_user(&alice).unwrap();
        storage.put_user(&bob).unwrap();

        assert_eq!(storage.get_user(&alice.id).unwrap(), Some(alice.clone()));

        let found = storage
            .get_users(&[bob.id.clone(), "missing".to_string(), alice.id.clone()])
            .unwrap();
        assert_eq!(found, vec![bob, alice]);
        assert_eq!(storage.list_users().unwrap().len(), 2);
    }

    #[test]
    fn test_group_external_id_unique() {
        let (storage, _temp) = create_test_storage();
        let group = Group::new("120363@g.us", Some("Deals".to_string()));
        storage.put_group(&group).unwrap();

        let duplicate = Group::new("120363@g.us", None);
        assert!(matches!(
            storage.put_group(&duplicate),
            Err(StorageError::Conflict(_))
        ));

        let found = storage.get_group_by_external_id("120363@g.us").unwrap();
        assert_eq!(found.map(|g| g.id), Some(group.id));
    }

    #[test]
    fn test_group_external_id_change_moves_index() {
        let (storage, _temp) = create_test_storage();
        let mut group = Group::new("old@g.us", None);
        storage.put_group(&group).unwrap();

        group.external_id = "new@g.us".to_string();
        storage.put_group(&group).unwrap();

        assert!(storage.get_group_by_external_id("old@g.us").unwrap().is_none());
        assert!(storage.get_group_by_external_id("new@g.us").unwrap().is_some());

        assert!(storage.delete_group(&group.id).unwrap());
        assert!(storage.get_group_by_external_id("new@g.us").unwrap().is_none());
        assert!(!storage.delete_group(&group.id).unwrap());
    }

    #[test]
    fn test_taste_label_unique_per_user() {
        let (storage, _temp) = create_test_storage();
        let taste = Taste::new("u1", "Games", "m");
        storage.put_taste(&taste).unwrap();

        let duplicate = Taste::new("u1", "games ", "m");
        assert!(matches!(
            storage.put_taste(&duplicate),
            Err(StorageError::Conflict(_))
        ));

        // Same label for another user is fine
        storage.put_taste(&Taste::new("u2", "games", "m")).unwrap();

        let found = storage.get_taste_by_label("u1", "games").unwrap().unwrap();
        assert_eq!(found.id, taste.id);
    }

    #[test]
    fn test_relabel_moves_index() {
        let (storage, _temp) = create_test_storage();
        let mut taste = Taste::new("u1", "games", "m");
        storage.put_taste(&taste).unwrap();

        taste.relabel("Board Games", "m");
        storage.put_taste(&taste).unwrap();

        assert!(storage.get_taste_by_label("u1", "games").unwrap().is_none());
        assert_eq!(storage.get_tastes_for_user("u1").unwrap(), vec![taste]);
    }

    #[test]
    fn test_tastes_for_user_prefix_scan() {
        let (storage, _temp) = create_test_storage();
        storage.put_taste(&Taste::new("u1", "b", "m")).unwrap();
        storage.put_taste(&Taste::new("u1", "a", "m")).unwrap();
        storage.put_taste(&Taste::new("u10", "c", "m")).unwrap();

        let labels: Vec<String> = storage
            .get_tastes_for_user("u1")
            .unwrap()
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn test_delete_user_cascades_tastes() {
        let (storage, _temp) = create_test_storage();
        let user = User::new("Alice", "1");
        storage.put_user(&user).unwrap();
        let taste = Taste::new(&user.id, "games", "m");
        storage.put_taste(&taste).unwrap();
        let other = Taste::new("someone-else", "games", "m");
        storage.put_taste(&other).unwrap();

        assert!(storage.delete_user(&user.id).unwrap());
        assert!(storage.get_user(&user.id).unwrap().is_none());
        assert!(storage.get_taste(&taste.id).unwrap().is_none());
        assert!(storage.get_tastes_for_user(&user.id).unwrap().is_empty());
        assert!(storage.get_taste(&other.id).unwrap().is_some());
        assert!(!storage.delete_user(&user.id).unwrap());
    }

    #[test]
    fn test_delete_taste() {
        let (storage, _temp) = create_test_storage();
        let taste = Taste::new("u1", "games", "m");
        storage.put_taste(&taste).unwrap();

        assert!(storage.delete_taste(&taste.id).unwrap());
        assert!(storage.get_taste_by_label("u1", "games").unwrap().is_none());
        assert!(!storage.delete_taste(&taste.id).unwrap());

        // label is free again
        storage.put_taste(&Taste::new("u1", "Games", "m")).unwrap();
        storage.ping().unwrap();
    }
}
