//! Relational record storage for promo-radar.
//!
//! Users, groups and tastes are plain records behind repository traits:
//! - [`Storage`]: RocksDB with one column family per record type plus
//!   secondary indexes for group external ids and per-user taste labels
//! - [`InMemoryStore`]: the same rules over hash maps, for tests
//!
//! Uniqueness rules (group external id, taste `(user_id, normalized_label)`)
//! are enforced on save. Deleting a user cascades to their taste rows; the
//! matching vectors live elsewhere and are removed by the caller.

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod memory;
pub mod repository;

pub use db::Storage;
pub use error::StorageError;
pub use keys::TasteLabelKey;
pub use memory::InMemoryStore;
pub use repository::{GroupRepository, TasteRepository, UserRepository};
