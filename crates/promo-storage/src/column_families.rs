//! Column family definitions for RocksDB.
//!
//! - users: User records by id
//! - groups: Group records by id
//! - group_external_ids: external id -> group id
//! - tastes: Taste records by id
//! - taste_labels: (user id, normalized label) -> taste id

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for user records
pub const CF_USERS: &str = "users";

/// Column family name for group records
pub const CF_GROUPS: &str = "groups";

/// Column family for the unique group external id index
pub const CF_GROUP_EXTERNAL_IDS: &str = "group_external_ids";

/// Column family name for taste records
pub const CF_TASTES: &str = "tastes";

/// Column family for the unique per-user taste label index
pub const CF_TASTE_LABELS: &str = "taste_labels";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_USERS,
    CF_GROUPS,
    CF_GROUP_EXTERNAL_IDS,
    CF_TASTES,
    CF_TASTE_LABELS,
];

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    ALL_CF_NAMES
        .iter()
        .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
        .collect()
}
