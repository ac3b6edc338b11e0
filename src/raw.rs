//! Raw snapshot form used for persistence and transport.
//!
//! ```json
//! {
//!   "lastMerged": "2024-01-01T00:00:00.000Z",
//!   "items": [{ "id": "a", "updated": "2024-01-01T00:00:00.000Z", ... }]
//! }
//! ```
//!
//! Timestamps arriving as numbers or offset strings are coerced into
//! [`Timestamp`] while the snapshot is decoded, before the id map is rebuilt.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::{Collection, Record, Timestamp};

/// The serialized shape of a [`Collection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCollection<T> {
    /// Watermark of the last merge.
    pub last_merged: Timestamp,
    /// Every record, in any order.
    pub items: Vec<T>,
}

impl<T: Record + Clone> Collection<T> {
    /// Snapshot the collection into its raw form.
    #[must_use]
    pub fn to_raw(&self) -> RawCollection<T> {
        RawCollection {
            last_merged: self.last_merged,
            items: self.iter().cloned().collect(),
        }
    }
}

impl<T: Record> Collection<T> {
    /// Rebuild a collection from its raw form.
    ///
    /// If several records share an id the last one wins.
    pub fn from_raw(raw: RawCollection<T>) -> Self {
        let total = raw.items.len();
        let items: BTreeMap<T::Id, T> = raw
            .items
            .into_iter()
            .map(|item| (item.id().clone(), item))
            .collect();

        if items.len() != total {
            warn!(
                records = total,
                distinct = items.len(),
                "raw snapshot contains duplicate ids"
            );
        }

        Self {
            items,
            last_merged: raw.last_merged,
        }
    }
}

impl<T: Record> From<RawCollection<T>> for Collection<T> {
    fn from(raw: RawCollection<T>) -> Self {
        Self::from_raw(raw)
    }
}

struct Items<'a, T: Record>(&'a Collection<T>);

impl<T: Record + Serialize> Serialize for Items<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<T: Record + Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Collection", 2)?;
        state.serialize_field("lastMerged", &self.last_merged)?;
        state.serialize_field("items", &Items(self))?;
        state.end()
    }
}

impl<'de, T: Record + Deserialize<'de>> Deserialize<'de> for Collection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawCollection::deserialize(deserializer).map(Self::from_raw)
    }
}
