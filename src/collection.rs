//! The replicated collection: records by id plus the last-merge watermark.

use core::borrow::Borrow;
use std::collections::btree_map::{self, BTreeMap};

use crate::clock::{Clock, SystemClock};
use crate::{Record, Timestamp};

/// A replicated collection: records keyed by id plus a merge watermark.
///
/// Deletions leave no tombstone. Whether a missing record was deleted here
/// or never seen is inferred during [`merge`](Collection::merge) by comparing
/// its stamp with [`last_merged`](Collection::last_merged).
///
/// Iteration is ordered by id, so it is stable across calls.
///
/// # Example
///
/// ```
/// use vault_sync::{Collection, Item};
///
/// let mut vault = Collection::new();
/// vault.update([Item::new("github", "hunter2")]);
///
/// let login = vault.get(&"github".to_string()).unwrap();
/// assert_eq!(login.value, "hunter2");
/// assert!(login.updated.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection<T: Record> {
    pub(crate) items: BTreeMap<T::Id, T>,
    pub(crate) last_merged: Timestamp,
}

impl<T: Record> Collection<T> {
    /// Create an empty, never-merged collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            last_merged: Timestamp::EPOCH,
        }
    }

    /// Build a collection from existing records, keeping their stamps.
    ///
    /// When two records share an id the later one wins.
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.id().clone(), item))
                .collect(),
            last_merged: Timestamp::EPOCH,
        }
    }

    /// Set the watermark while building a collection.
    #[must_use]
    pub fn with_last_merged(mut self, at: Timestamp) -> Self {
        self.last_merged = at;
        self
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.get(id)
    }

    /// Check whether a record with this id exists.
    #[must_use]
    pub fn contains(&self, id: &T::Id) -> bool {
        self.items.contains_key(id)
    }

    /// Insert or overwrite records, stamping each with the system time.
    ///
    /// This is the path local edits must take. Use
    /// [`update_with`](Self::update_with) to supply the clock.
    pub fn update(&mut self, items: impl IntoIterator<Item = T>) {
        self.update_with(&SystemClock, items);
    }

    /// Insert or overwrite records, stamping each with `clock.now()`.
    pub fn update_with(&mut self, clock: &impl Clock, items: impl IntoIterator<Item = T>) {
        for mut item in items {
            item.set_updated(clock.now());
            self.items.insert(item.id().clone(), item);
        }
    }

    /// Delete records by id, returning the ones that were present.
    pub fn remove<Q>(&mut self, ids: impl IntoIterator<Item = Q>) -> Vec<T>
    where
        Q: Borrow<T::Id>,
    {
        ids.into_iter()
            .filter_map(|id| self.items.remove(id.borrow()))
            .collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over records in id order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.items.values(),
        }
    }

    /// Iterate over ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &T::Id> {
        self.items.keys()
    }

    /// The watermark of the last successful merge, [`Timestamp::EPOCH`] if
    /// the collection has never been merged.
    #[must_use]
    pub fn last_merged(&self) -> Timestamp {
        self.last_merged
    }

    /// Overwrite the watermark.
    ///
    /// Meant for persistence layers that defer committing a merge's
    /// watermark until its forward delta has been delivered.
    pub fn set_last_merged(&mut self, at: Timestamp) {
        self.last_merged = at;
    }
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the records of a [`Collection`].
pub struct Iter<'a, T: Record> {
    inner: btree_map::Values<'a, T::Id, T>,
}

impl<'a, T: Record> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Record> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T: Record> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Record> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = btree_map::IntoValues<T::Id, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

impl<T: Record> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}
