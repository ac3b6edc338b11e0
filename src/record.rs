//! Records: the unit of replication, identified by id and stamped on write.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Capability set required of anything stored in a [`Collection`].
///
/// A record exposes a stable unique identifier and a mutable last-modified
/// stamp. Everything else about the record is opaque to the engine.
///
/// [`Collection`]: crate::Collection
///
/// # Example
///
/// ```
/// use vault_sync::{Record, Timestamp};
///
/// #[derive(Clone)]
/// struct Note {
///     id: u32,
///     updated: Option<Timestamp>,
///     text: String,
/// }
///
/// impl Record for Note {
///     type Id = u32;
///
///     fn id(&self) -> &u32 {
///         &self.id
///     }
///
///     fn updated(&self) -> Option<Timestamp> {
///         self.updated
///     }
///
///     fn set_updated(&mut self, at: Timestamp) {
///         self.updated = Some(at);
///     }
/// }
/// ```
pub trait Record {
    /// Identifier type. Ordering only affects iteration order.
    type Id: Ord + Clone + fmt::Debug;

    /// The record's identifier. Must not change once the record is stored.
    fn id(&self) -> &Self::Id;

    /// Last modification time, `None` if the record was never stamped.
    fn updated(&self) -> Option<Timestamp>;

    /// Overwrite the last modification time.
    fn set_updated(&mut self, at: Timestamp);
}

/// A general-purpose record: a string id, a stamp and an arbitrary payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item<V> {
    /// Unique identifier.
    pub id: String,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
    /// Payload.
    pub value: V,
}

impl<V> Item<V> {
    /// Create an unstamped item.
    pub fn new(id: impl Into<String>, value: V) -> Self {
        Self {
            id: id.into(),
            updated: None,
            value,
        }
    }

    /// Create an item with an explicit stamp.
    ///
    /// Useful for testing or when restoring records from another source.
    pub fn with_timestamp(id: impl Into<String>, value: V, updated: Timestamp) -> Self {
        Self {
            id: id.into(),
            updated: Some(updated),
            value,
        }
    }
}

impl<V> Record for Item<V> {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn updated(&self) -> Option<Timestamp> {
        self.updated
    }

    fn set_updated(&mut self, at: Timestamp) {
        self.updated = Some(at);
    }
}
