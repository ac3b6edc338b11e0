//! Pure-Rust key-value backend using [`redb`](https://docs.rs/redb).
//!
//! No C dependencies, for targets where SQLite is awkward to cross-compile.
//!
//! Enable with `features = ["redb"]`.
//!
//! ```no_run
//! use vault_sync_store::{RedbStore, StateStore};
//!
//! let mut store = RedbStore::open("/tmp/vault.redb").unwrap();
//! store.put("collections", "vault-1", b"{}").unwrap();
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use thiserror::Error;
use tracing::debug;

use crate::traits::StateStore;

const SNAPSHOT_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("snapshots");

/// Errors returned by [`RedbStore`] operations.
#[derive(Debug, Error)]
#[error("redb error: {0}")]
pub struct RedbError(String);

fn err(e: impl std::fmt::Display) -> RedbError {
    RedbError(e.to_string())
}

/// A pure-Rust persistence backend built on [`redb`].
///
/// Every write runs in its own redb transaction.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RedbError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(err)?;
        Self::create_tables(&db)?;
        debug!(path = %path.display(), "opened redb store");
        Ok(Self { db })
    }

    /// Create an in-memory redb database.
    pub fn open_in_memory() -> Result<Self, RedbError> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(err)?;
        Self::create_tables(&db)?;
        Ok(Self { db })
    }

    fn create_tables(db: &Database) -> Result<(), RedbError> {
        let txn = db.begin_write().map_err(err)?;
        txn.open_table(SNAPSHOT_TABLE).map_err(err)?;
        txn.commit().map_err(err)?;
        Ok(())
    }

    /// All namespaces that hold at least one snapshot, sorted.
    pub fn namespaces(&self) -> Result<Vec<String>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(SNAPSHOT_TABLE).map_err(err)?;

        let mut namespaces = BTreeSet::new();
        for item in table.iter().map_err(err)? {
            let (key_guard, _) = item.map_err(err)?;
            if let Some((ns, _)) = parse_snapshot_key(key_guard.value()) {
                namespaces.insert(ns.to_string());
            }
        }
        Ok(namespaces.into_iter().collect())
    }
}

impl StateStore for RedbStore {
    type Error = RedbError;

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), RedbError> {
        let txn = self.db.begin_write().map_err(err)?;
        {
            let mut table = txn.open_table(SNAPSHOT_TABLE).map_err(err)?;
            table
                .insert(snapshot_key(namespace, key).as_slice(), value)
                .map_err(err)?;
        }
        txn.commit().map_err(err)?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(SNAPSHOT_TABLE).map_err(err)?;
        match table
            .get(snapshot_key(namespace, key).as_slice())
            .map_err(err)?
        {
            Some(guard) => Ok(Some(guard.value().to_vec())),
            None => Ok(None),
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), RedbError> {
        let txn = self.db.begin_write().map_err(err)?;
        {
            let mut table = txn.open_table(SNAPSHOT_TABLE).map_err(err)?;
            table
                .remove(snapshot_key(namespace, key).as_slice())
                .map_err(err)?;
        }
        txn.commit().map_err(err)?;
        Ok(())
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(SNAPSHOT_TABLE).map_err(err)?;

        let lower = namespace_bound(namespace, 0);
        let upper = namespace_bound(namespace, 1);
        let range = table
            .range(lower.as_slice()..upper.as_slice())
            .map_err(err)?;

        let mut keys = Vec::new();
        for item in range {
            let (key_guard, _) = item.map_err(err)?;
            if let Some((_, k)) = parse_snapshot_key(key_guard.value()) {
                keys.push(k.to_string());
            }
        }
        Ok(keys)
    }
}

/// Snapshot key: `namespace \0 key`
fn snapshot_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut k = namespace_bound(namespace, 0);
    k.extend_from_slice(key.as_bytes());
    k
}

/// `namespace` followed by one separator byte. With `0` this is the lower
/// bound of the namespace, with `1` the exclusive upper bound.
fn namespace_bound(namespace: &str, separator: u8) -> Vec<u8> {
    let mut k = Vec::with_capacity(namespace.len() + 1);
    k.extend_from_slice(namespace.as_bytes());
    k.push(separator);
    k
}

fn parse_snapshot_key(key: &[u8]) -> Option<(&str, &str)> {
    let pos = key.iter().position(|&b| b == 0)?;
    let ns = std::str::from_utf8(&key[..pos]).ok()?;
    let k = std::str::from_utf8(&key[pos + 1..]).ok()?;
    Some((ns, k))
}
