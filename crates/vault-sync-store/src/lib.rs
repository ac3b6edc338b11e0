//! # vault-sync-store
//!
//! Persistence for [`vault-sync`](https://docs.rs/vault-sync) collections.
//!
//! A [`StateStore`] is a namespaced byte key-value store. [`CollectionDb`]
//! layers typed snapshots on top of it and drives whole sync cycles: load
//! the local collection (or start empty), merge the peer snapshot, persist,
//! and hand back the forward delta for the transport.
//!
//! ## Quick Start
//!
//! ```
//! use vault_sync::{Collection, Item};
//! use vault_sync_store::{CollectionDb, MemoryStore};
//!
//! let mut db = CollectionDb::with_store(MemoryStore::new());
//!
//! let mut vault = Collection::new();
//! vault.update([Item::new("github", "hunter2".to_string())]);
//! db.save("vault-1", &vault).unwrap();
//!
//! let loaded: Option<Collection<Item<String>>> = db.load("vault-1").unwrap();
//! assert_eq!(loaded.unwrap(), vault);
//!
//! // A missing key is not an error, just "nothing stored yet".
//! assert!(db.load::<Item<String>>("vault-2").unwrap().is_none());
//! ```
//!
//! ## Backends
//!
//! | Backend | Feature flag | Use case |
//! |---------|-------------|----------|
//! | [`MemoryStore`] | *(always available)* | Testing, prototyping |
//! | `SqliteStore` | `sqlite` | Devices and servers |
//! | `RedbStore` | `redb` | Pure-Rust targets without C deps |

mod db;
mod memory;
#[cfg(feature = "redb")]
mod redb;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub use db::{
    CollectionDb, CollectionDbBuilder, CollectionDbConfig, DbError, PendingDelivery, SyncOutcome,
    DEFAULT_NAMESPACE,
};
pub use memory::MemoryStore;
#[cfg(feature = "redb")]
pub use redb::{RedbError, RedbStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{JournalMode, SqliteConfig, SqliteError, SqliteStore};
pub use traits::StateStore;
