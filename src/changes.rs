//! Change sets describing what a merge applied or must forward.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Record;

/// The kind of change a record went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The record did not exist on the receiving side.
    Added,
    /// The record existed and its content was replaced.
    Updated,
    /// The record was deleted.
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
        })
    }
}

/// Which replica a change is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Applied to the local collection during the merge.
    Local,
    /// To be transmitted to the peer.
    Forward,
}

/// Records grouped by [`ChangeKind`].
///
/// A single merge never places the same id in more than one list of a set.
///
/// # Example
///
/// ```
/// use vault_sync::{ChangeKind, ChangeSet, Item};
///
/// let mut changes = ChangeSet::new();
/// changes.push(ChangeKind::Added, Item::new("a", 1));
/// changes.push(ChangeKind::Removed, Item::new("b", 2));
///
/// assert_eq!(changes.len(), 2);
/// assert_eq!(changes.added.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ChangeSet<T> {
    /// Records that were added.
    #[serde(default)]
    pub added: Vec<T>,
    /// Records whose content was replaced.
    #[serde(default)]
    pub updated: Vec<T>,
    /// Records that were deleted.
    #[serde(default)]
    pub removed: Vec<T>,
}

impl<T> ChangeSet<T> {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Append a record under the given kind.
    pub fn push(&mut self, kind: ChangeKind, record: T) {
        match kind {
            ChangeKind::Added => self.added.push(record),
            ChangeKind::Updated => self.updated.push(record),
            ChangeKind::Removed => self.removed.push(record),
        }
    }

    /// The list holding records of the given kind.
    #[must_use]
    pub fn of(&self, kind: ChangeKind) -> &[T] {
        match kind {
            ChangeKind::Added => &self.added,
            ChangeKind::Updated => &self.updated,
            ChangeKind::Removed => &self.removed,
        }
    }

    /// Total number of records across all three lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Returns `true` if no list holds a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Iterate over every record together with its kind.
    pub fn iter(&self) -> impl Iterator<Item = (ChangeKind, &T)> {
        let added = self.added.iter().map(|r| (ChangeKind::Added, r));
        let updated = self.updated.iter().map(|r| (ChangeKind::Updated, r));
        let removed = self.removed.iter().map(|r| (ChangeKind::Removed, r));
        added.chain(updated).chain(removed)
    }
}

impl<T: Record> ChangeSet<T> {
    /// Ids of every record in the set.
    pub fn ids(&self) -> impl Iterator<Item = &T::Id> {
        self.iter().map(|(_, record)| record.id())
    }

    /// Look up which list, if any, holds `id`.
    #[must_use]
    pub fn kind_of(&self, id: &T::Id) -> Option<ChangeKind> {
        self.iter()
            .find(|(_, record)| record.id() == id)
            .map(|(kind, _)| kind)
    }
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
