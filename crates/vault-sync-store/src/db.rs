//! Typed snapshot persistence and sync sessions.
//!
//! `CollectionDb` wraps a storage backend and stores each collection as its
//! JSON raw snapshot (`{"lastMerged": ..., "items": [...]}`).
//!
//! # Sync cycle
//!
//! ```
//! use vault_sync::clock::ManualClock;
//! use vault_sync::{Collection, Item, Timestamp};
//! use vault_sync_store::{CollectionDb, MemoryStore, SyncOutcome};
//!
//! let clock = ManualClock::new(1_000);
//! let mut db = CollectionDb::with_store(MemoryStore::new());
//!
//! let mut local = Collection::new();
//! local.update_with(&clock, [Item::new("a", 1u32)]);
//! db.save("vault", &local).unwrap();
//!
//! // The peer has never seen "a", so it must be forwarded.
//! clock.advance(10);
//! let remote = Collection::<Item<u32>>::new();
//! match db.sync_with("vault", &remote, &clock).unwrap() {
//!     SyncOutcome::Pending(pending) => {
//!         assert_eq!(pending.forward.added.len(), 1);
//!         // ... transport delivers `pending.forward`, then:
//!         db.acknowledge::<Item<u32>>(&pending).unwrap();
//!     }
//!     SyncOutcome::Converged { .. } => unreachable!(),
//! }
//!
//! let stored = db.load::<Item<u32>>("vault").unwrap().unwrap();
//! assert_eq!(stored.last_merged(), Timestamp::from_millis(1_010));
//! ```

use core::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use vault_sync::clock::{Clock, SystemClock};
use vault_sync::{ChangeSet, Collection, MergeError, Record, Timestamp};

use crate::traits::StateStore;

/// The namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "collections";

/// Error type for `CollectionDb` operations.
#[derive(Debug, Error)]
pub enum DbError<E: fmt::Debug + fmt::Display> {
    /// Error from the underlying storage backend.
    #[error("store error: {0}")]
    Store(E),
    /// A collection could not be encoded.
    #[error("serialization error for `{key}`: {source}")]
    Serialize {
        /// Key being written.
        key: String,
        /// Encoder error.
        source: serde_json::Error,
    },
    /// A stored snapshot is malformed, e.g. an unparsable timestamp.
    #[error("deserialization error for `{key}`: {source}")]
    Deserialize {
        /// Key being read.
        key: String,
        /// Decoder error.
        source: serde_json::Error,
    },
    /// The merge rejected its input.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Configuration for `CollectionDb`.
#[derive(Debug, Clone)]
pub struct CollectionDbConfig {
    /// Namespace all collections are stored under.
    pub namespace: String,
}

impl Default for CollectionDbConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Builder for constructing a `CollectionDb` with custom configuration.
pub struct CollectionDbBuilder<S: StateStore> {
    store: S,
    config: CollectionDbConfig,
}

impl<S: StateStore> CollectionDbBuilder<S> {
    /// Set the namespace.
    pub fn namespace(mut self, ns: &str) -> Self {
        self.config.namespace = ns.to_string();
        self
    }

    /// Build the `CollectionDb`.
    pub fn build(self) -> CollectionDb<S> {
        CollectionDb {
            store: self.store,
            config: self.config,
        }
    }
}

/// Result of [`CollectionDb::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome<T> {
    /// The peer needs nothing. The new watermark is already committed.
    Converged {
        /// Changes applied to the stored collection.
        applied: ChangeSet<T>,
        /// The committed watermark.
        last_merged: Timestamp,
    },
    /// The peer needs the forward delta. Records are persisted but the
    /// watermark is held back until [`CollectionDb::acknowledge`].
    Pending(PendingDelivery<T>),
}

impl<T> SyncOutcome<T> {
    /// Changes applied to the stored collection.
    pub fn applied(&self) -> &ChangeSet<T> {
        match self {
            Self::Converged { applied, .. } => applied,
            Self::Pending(pending) => &pending.applied,
        }
    }

    /// The delta to transmit, if any.
    pub fn forward(&self) -> Option<&ChangeSet<T>> {
        match self {
            Self::Converged { .. } => None,
            Self::Pending(pending) => Some(&pending.forward),
        }
    }
}

/// A forward delta awaiting delivery to the peer.
///
/// If delivery fails, drop this value and sync again: the stored watermark
/// still marks the collection as unconverged, so the next merge produces
/// the same delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery<T> {
    /// Key of the stored collection.
    pub key: String,
    /// Changes applied to the stored collection.
    pub applied: ChangeSet<T>,
    /// Changes to transmit.
    pub forward: ChangeSet<T>,
    /// Watermark currently stored.
    pub previous_watermark: Timestamp,
    /// Watermark to commit once delivery is confirmed.
    pub watermark: Timestamp,
}

/// Typed collection persistence over any [`StateStore`].
pub struct CollectionDb<S: StateStore> {
    store: S,
    config: CollectionDbConfig,
}

impl<S: StateStore> CollectionDb<S> {
    /// Create a `CollectionDb` wrapping the given store with default config.
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            config: CollectionDbConfig::default(),
        }
    }

    /// Create a builder for advanced configuration.
    pub fn builder(store: S) -> CollectionDbBuilder<S> {
        CollectionDbBuilder {
            store,
            config: CollectionDbConfig::default(),
        }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a mutable reference to the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the database, returning the store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &CollectionDbConfig {
        &self.config
    }

    /// Load a collection. `Ok(None)` means nothing is stored under `key`.
    pub fn load<T>(&self, key: &str) -> Result<Option<Collection<T>>, DbError<S::Error>>
    where
        T: Record + DeserializeOwned,
    {
        let Some(bytes) = self
            .store
            .get(&self.config.namespace, key)
            .map_err(DbError::Store)?
        else {
            debug!(key, "no stored collection");
            return Ok(None);
        };

        let collection: Collection<T> =
            serde_json::from_slice(&bytes).map_err(|source| DbError::Deserialize {
                key: key.to_string(),
                source,
            })?;
        debug!(
            key,
            records = collection.len(),
            last_merged = %collection.last_merged(),
            "loaded collection"
        );
        Ok(Some(collection))
    }

    /// Load a collection, or start an empty never-merged one.
    pub fn load_or_default<T>(&self, key: &str) -> Result<Collection<T>, DbError<S::Error>>
    where
        T: Record + DeserializeOwned,
    {
        Ok(self.load(key)?.unwrap_or_default())
    }

    /// Persist a collection, replacing any previous snapshot.
    pub fn save<T>(&mut self, key: &str, collection: &Collection<T>) -> Result<(), DbError<S::Error>>
    where
        T: Record + Serialize,
    {
        let bytes = serde_json::to_vec(collection).map_err(|source| DbError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store
            .put(&self.config.namespace, key, &bytes)
            .map_err(DbError::Store)?;
        debug!(
            key,
            records = collection.len(),
            last_merged = %collection.last_merged(),
            "saved collection"
        );
        Ok(())
    }

    /// Delete a stored collection.
    pub fn delete(&mut self, key: &str) -> Result<(), DbError<S::Error>> {
        self.store
            .delete(&self.config.namespace, key)
            .map_err(DbError::Store)
    }

    /// Keys of all stored collections.
    pub fn keys(&self) -> Result<Vec<String>, DbError<S::Error>> {
        self.store
            .list_keys(&self.config.namespace)
            .map_err(DbError::Store)
    }

    /// Run one sync cycle against a peer snapshot using the system clock.
    ///
    /// See [`sync_with`](Self::sync_with).
    pub fn sync<T>(
        &mut self,
        key: &str,
        remote: &Collection<T>,
    ) -> Result<SyncOutcome<T>, DbError<S::Error>>
    where
        T: Record + Clone + Serialize + DeserializeOwned,
    {
        self.sync_with(key, remote, &SystemClock)
    }

    /// Run one sync cycle against a peer snapshot.
    ///
    /// Loads the stored collection (empty if none), merges `remote` into
    /// it and persists the result. When the merge leaves a forward delta,
    /// the previous watermark is persisted instead of the new one and a
    /// [`PendingDelivery`] is returned.
    pub fn sync_with<T>(
        &mut self,
        key: &str,
        remote: &Collection<T>,
        clock: &impl Clock,
    ) -> Result<SyncOutcome<T>, DbError<S::Error>>
    where
        T: Record + Clone + Serialize + DeserializeOwned,
    {
        let mut local = self.load_or_default::<T>(key)?;
        let report = local.merge_with(remote, clock)?;

        if report.is_converged() {
            self.save(key, &local)?;
            return Ok(SyncOutcome::Converged {
                applied: report.applied,
                last_merged: report.last_merged,
            });
        }

        local.set_last_merged(report.previous_watermark);
        self.save(key, &local)?;
        debug!(
            key,
            forward = report.forward.len(),
            watermark = %report.last_merged,
            "holding watermark until forward delta is delivered"
        );

        Ok(SyncOutcome::Pending(PendingDelivery {
            key: key.to_string(),
            applied: report.applied,
            forward: report.forward,
            previous_watermark: report.previous_watermark,
            watermark: report.last_merged,
        }))
    }

    /// Commit the watermark of a delivered forward delta.
    ///
    /// The check is on the stored watermark only: nothing is committed if
    /// the collection has been deleted or its watermark no longer equals
    /// `pending.previous_watermark`. Unacknowledged syncs leave the watermark
    /// untouched, so any of several such deliveries can still be
    /// acknowledged, and the first one to arrive wins.
    pub fn acknowledge<T>(&mut self, pending: &PendingDelivery<T>) -> Result<(), DbError<S::Error>>
    where
        T: Record + Serialize + DeserializeOwned,
    {
        let Some(mut local) = self.load::<T>(&pending.key)? else {
            warn!(key = %pending.key, "acknowledged collection no longer exists");
            return Ok(());
        };

        if local.last_merged() != pending.previous_watermark {
            warn!(
                key = %pending.key,
                stored = %local.last_merged(),
                expected = %pending.previous_watermark,
                "ignoring stale acknowledgement"
            );
            return Ok(());
        }

        local.set_last_merged(pending.watermark);
        self.save(&pending.key, &local)?;
        debug!(key = %pending.key, watermark = %pending.watermark, "committed watermark");
        Ok(())
    }
}
