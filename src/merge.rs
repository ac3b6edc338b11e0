//! Two-replica reconciliation.
//!
//! [`Collection::merge`] folds a peer's snapshot into the local collection
//! and reports two change sets: what was applied locally, and what the peer
//! still needs (the forward delta). Records are reconciled whole; the newer
//! stamp wins.
//!
//! Every record lands in exactly one outcome. Local records the peer lacks
//! are classified as a [`PeerMissing`], every peer record as a
//! [`PeerRecord`]. Classification runs to completion before anything is
//! mutated, so a rejected merge leaves the local collection untouched.

use core::fmt;

use thiserror::Error;
use tracing::{debug, trace};

use crate::changes::{ChangeKind, ChangeSet, Direction};
use crate::clock::{Clock, SystemClock};
use crate::{Collection, Record, Timestamp};

/// Which side of a merge a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The collection being merged into.
    Local,
    /// The peer snapshot.
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Reasons a merge is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// A record that must carry a stamp has none. The caller bypassed
    /// [`Collection::update`] or fed in a corrupted snapshot.
    #[error("record {id} in the {side} collection has no `updated` timestamp")]
    MissingTimestamp {
        /// Debug rendering of the record id.
        id: String,
        /// Collection holding the record.
        side: Side,
    },
}

/// Outcome for a local record that is absent from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMissing {
    /// Untouched since the last merge, so the peer deleted it.
    RemovedByPeer,
    /// Added or edited after the last merge; the peer has not seen it yet.
    UnseenByPeer,
}

impl PeerMissing {
    /// Classify by comparing the record's stamp with the watermark.
    ///
    /// A stamp equal to the watermark counts as untouched. An unstamped
    /// record has never been merged and is therefore unseen.
    #[must_use]
    pub fn classify(updated: Option<Timestamp>, watermark: Timestamp) -> Self {
        match updated {
            Some(stamp) if stamp <= watermark => Self::RemovedByPeer,
            _ => Self::UnseenByPeer,
        }
    }

    /// Where the resulting change goes.
    #[must_use]
    pub fn change(self) -> (Direction, ChangeKind) {
        match self {
            Self::RemovedByPeer => (Direction::Local, ChangeKind::Removed),
            Self::UnseenByPeer => (Direction::Forward, ChangeKind::Added),
        }
    }
}

/// Outcome for a record present in the peer snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRecord {
    /// Absent locally and newer than the watermark: the peer added it.
    AddedByPeer,
    /// Absent locally and not newer than the watermark: deleted here.
    RemovedLocally,
    /// Both sides have it and the peer's copy is newer.
    PeerNewer,
    /// Both sides have it and the local copy is newer.
    LocalNewer,
    /// Both sides have it with identical stamps.
    InSync,
}

impl PeerRecord {
    /// Classify a peer record. `local` is the stamp of the local record with
    /// the same id, or `None` if there is no such record.
    #[must_use]
    pub fn classify(local: Option<Timestamp>, remote: Timestamp, watermark: Timestamp) -> Self {
        match local {
            None if remote > watermark => Self::AddedByPeer,
            None => Self::RemovedLocally,
            Some(local) if remote > local => Self::PeerNewer,
            Some(local) if remote < local => Self::LocalNewer,
            Some(_) => Self::InSync,
        }
    }

    /// Where the resulting change goes, `None` when nothing changes.
    #[must_use]
    pub fn change(self) -> Option<(Direction, ChangeKind)> {
        match self {
            Self::AddedByPeer => Some((Direction::Local, ChangeKind::Added)),
            Self::RemovedLocally => Some((Direction::Forward, ChangeKind::Removed)),
            Self::PeerNewer => Some((Direction::Local, ChangeKind::Updated)),
            Self::LocalNewer => Some((Direction::Forward, ChangeKind::Updated)),
            Self::InSync => None,
        }
    }
}

/// The result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport<T> {
    /// Changes applied to the local collection.
    pub applied: ChangeSet<T>,
    /// Changes the peer needs to converge.
    pub forward: ChangeSet<T>,
    /// The local watermark before the merge.
    pub previous_watermark: Timestamp,
    /// The local watermark after the merge.
    pub last_merged: Timestamp,
}

impl<T> MergeReport<T> {
    /// Returns `true` if the peer needs nothing from this side.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.forward.is_empty()
    }
}

enum Step<'r, T: Record> {
    Missing(T::Id, PeerMissing),
    Incoming(&'r T, PeerRecord),
}

impl<T: Record + Clone> Collection<T> {
    /// Merge a peer snapshot into this collection using the system clock.
    ///
    /// See [`merge_with`](Self::merge_with).
    pub fn merge(&mut self, remote: &Collection<T>) -> Result<MergeReport<T>, MergeError> {
        self.merge_with(remote, &SystemClock)
    }

    /// Merge a peer snapshot into this collection.
    ///
    /// `clock` is sampled once; every stamp written by this merge and the
    /// new watermark share that instant. `remote` is never modified.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::MissingTimestamp`] if a peer record is
    /// unstamped, or a local record is unstamped while it is shared with the
    /// peer or the collection has been merged before. Nothing is modified
    /// in that case.
    ///
    /// # Example
    ///
    /// ```
    /// use vault_sync::clock::ManualClock;
    /// use vault_sync::{Collection, Item, Timestamp};
    ///
    /// let ts = Timestamp::from_millis;
    /// let mut local = Collection::from_items([Item::with_timestamp("a", "old", ts(1))]);
    /// let remote = Collection::from_items([Item::with_timestamp("a", "new", ts(3))]);
    ///
    /// let report = local.merge_with(&remote, &ManualClock::new(10)).unwrap();
    ///
    /// assert_eq!(report.applied.updated.len(), 1);
    /// assert_eq!(local.get(&"a".to_string()).unwrap().value, "new");
    /// assert!(report.is_converged());
    /// ```
    pub fn merge_with(
        &mut self,
        remote: &Collection<T>,
        clock: &impl Clock,
    ) -> Result<MergeReport<T>, MergeError> {
        let steps = self.plan(remote)?;
        let now = clock.now();
        let previous_watermark = self.last_merged;

        let mut applied = ChangeSet::new();
        let mut forward = ChangeSet::new();

        for step in steps {
            let (direction, kind, record) = match step {
                Step::Missing(id, outcome) => {
                    trace!(?id, ?outcome, "local record missing from peer");
                    let (direction, kind) = outcome.change();
                    let record = match outcome {
                        PeerMissing::RemovedByPeer => self.items.remove(&id),
                        PeerMissing::UnseenByPeer => self.items.get_mut(&id).map(|item| {
                            item.set_updated(now);
                            item.clone()
                        }),
                    };
                    (direction, kind, record)
                }
                Step::Incoming(item, outcome) => {
                    let Some((direction, kind)) = outcome.change() else {
                        continue;
                    };
                    trace!(id = ?item.id(), ?outcome, "peer record reconciled");
                    let record = match outcome {
                        PeerRecord::AddedByPeer | PeerRecord::PeerNewer => {
                            self.items.insert(item.id().clone(), item.clone());
                            Some(item.clone())
                        }
                        PeerRecord::RemovedLocally => Some(item.clone()),
                        PeerRecord::LocalNewer => self.items.get(item.id()).cloned(),
                        PeerRecord::InSync => None,
                    };
                    (direction, kind, record)
                }
            };

            if let Some(record) = record {
                match direction {
                    Direction::Local => applied.push(kind, record),
                    Direction::Forward => forward.push(kind, record),
                }
            }
        }

        self.last_merged = if forward.is_empty() {
            remote.last_merged
        } else {
            now
        };

        debug!(
            applied = applied.len(),
            forward = forward.len(),
            previous_watermark = %previous_watermark,
            last_merged = %self.last_merged,
            "merged peer snapshot"
        );

        Ok(MergeReport {
            applied,
            forward,
            previous_watermark,
            last_merged: self.last_merged,
        })
    }

    fn plan<'r>(&self, remote: &'r Collection<T>) -> Result<Vec<Step<'r, T>>, MergeError> {
        let watermark = self.last_merged;
        let mut steps = Vec::with_capacity(self.len() + remote.len());

        for item in self.iter() {
            let shared = remote.contains(item.id());
            let stamp = item.updated();
            if stamp.is_none() && (shared || !watermark.is_epoch()) {
                return Err(missing_timestamp(item, Side::Local));
            }
            if !shared {
                steps.push(Step::Missing(
                    item.id().clone(),
                    PeerMissing::classify(stamp, watermark),
                ));
            }
        }

        for item in remote.iter() {
            let stamp = item
                .updated()
                .ok_or_else(|| missing_timestamp(item, Side::Remote))?;
            let local = self.get(item.id()).and_then(Record::updated);
            steps.push(Step::Incoming(
                item,
                PeerRecord::classify(local, stamp, watermark),
            ));
        }

        Ok(steps)
    }
}

fn missing_timestamp<T: Record>(item: &T, side: Side) -> MergeError {
    MergeError::MissingTimestamp {
        id: format!("{:?}", item.id()),
        side,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::Item;

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn item(id: &str, value: &'static str, at: u64) -> Item<&'static str> {
        Item::with_timestamp(id, value, ts(at))
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn peer_missing_tie_counts_as_deleted() {
        assert_eq!(
            PeerMissing::classify(Some(ts(2)), ts(2)),
            PeerMissing::RemovedByPeer
        );
        assert_eq!(
            PeerMissing::classify(Some(ts(3)), ts(2)),
            PeerMissing::UnseenByPeer
        );
        assert_eq!(PeerMissing::classify(None, ts(0)), PeerMissing::UnseenByPeer);
    }

    #[test]
    fn peer_record_classification() {
        let wm = ts(5);
        assert_eq!(PeerRecord::classify(None, ts(6), wm), PeerRecord::AddedByPeer);
        assert_eq!(PeerRecord::classify(None, ts(5), wm), PeerRecord::RemovedLocally);
        assert_eq!(PeerRecord::classify(Some(ts(1)), ts(2), wm), PeerRecord::PeerNewer);
        assert_eq!(PeerRecord::classify(Some(ts(9)), ts(2), wm), PeerRecord::LocalNewer);
        assert_eq!(PeerRecord::classify(Some(ts(2)), ts(2), wm), PeerRecord::InSync);
    }

    #[test]
    fn changes_map_to_directions() {
        assert_eq!(
            PeerMissing::UnseenByPeer.change(),
            (Direction::Forward, ChangeKind::Added)
        );
        assert_eq!(
            PeerRecord::RemovedLocally.change(),
            Some((Direction::Forward, ChangeKind::Removed))
        );
        assert_eq!(PeerRecord::InSync.change(), None);
    }

    #[test]
    fn peer_deletion_is_applied() {
        let clock = ManualClock::new(100);
        let mut local =
            Collection::from_items([item("a", "x", 1), item("b", "y", 1)]).with_last_merged(ts(2));
        let remote = Collection::from_items([item("a", "x", 1)]).with_last_merged(ts(3));

        let report = local.merge_with(&remote, &clock).unwrap();

        assert!(!local.contains(&key("b")));
        assert_eq!(report.applied.removed, vec![item("b", "y", 1)]);
        assert!(report.forward.is_empty());
        assert_eq!(local.last_merged(), ts(3));
    }

    #[test]
    fn unseen_local_record_is_restamped_and_forwarded() {
        let clock = ManualClock::new(100);
        let mut local =
            Collection::from_items([item("a", "x", 1), item("c", "z", 5)]).with_last_merged(ts(2));
        let remote = Collection::from_items([item("a", "x", 1)]);

        let report = local.merge_with(&remote, &clock).unwrap();

        assert_eq!(local.get(&key("c")).unwrap().updated, Some(ts(100)));
        assert_eq!(report.forward.added, vec![item("c", "z", 100)]);
        assert!(report.applied.is_empty());
        assert_eq!(local.last_merged(), ts(100));
    }

    #[test]
    fn locally_deleted_record_is_forwarded_as_removal() {
        let clock = ManualClock::new(100);
        let mut local = Collection::<Item<&str>>::new().with_last_merged(ts(10));
        let remote = Collection::from_items([item("gone", "v", 4)]);

        let report = local.merge_with(&remote, &clock).unwrap();

        assert!(local.is_empty());
        assert_eq!(report.forward.removed, vec![item("gone", "v", 4)]);
        assert_eq!(local.last_merged(), ts(100));
    }

    #[test]
    fn new_peer_record_is_added() {
        let clock = ManualClock::new(100);
        let mut local = Collection::<Item<&str>>::new().with_last_merged(ts(10));
        let remote = Collection::from_items([item("n", "v", 11)]).with_last_merged(ts(11));

        let report = local.merge_with(&remote, &clock).unwrap();

        assert_eq!(local.get(&key("n")), Some(&item("n", "v", 11)));
        assert_eq!(report.applied.added, vec![item("n", "v", 11)]);
        assert_eq!(local.last_merged(), ts(11));
    }

    #[test]
    fn newer_local_record_is_forwarded_unchanged() {
        let clock = ManualClock::new(100);
        let mut local = Collection::from_items([item("y", "mine", 5)]);
        let remote = Collection::from_items([item("y", "theirs", 2)]);

        let report = local.merge_with(&remote, &clock).unwrap();

        assert_eq!(local.get(&key("y")), Some(&item("y", "mine", 5)));
        assert_eq!(report.forward.updated, vec![item("y", "mine", 5)]);
        assert!(report.applied.is_empty());
    }

    #[test]
    fn unstamped_remote_record_is_rejected() {
        let clock = ManualClock::new(100);
        let mut local = Collection::from_items([item("a", "x", 1)]);
        let before = local.clone();
        let remote = Collection::from_items([Item::new("a", "x")]);

        let err = local.merge_with(&remote, &clock).unwrap_err();

        assert_eq!(
            err,
            MergeError::MissingTimestamp {
                id: "\"a\"".into(),
                side: Side::Remote
            }
        );
        assert_eq!(local, before);
    }

    #[test]
    fn unstamped_shared_local_record_is_rejected() {
        let clock = ManualClock::new(100);
        let mut local = Collection::from_items([Item::new("a", "x")]);
        let remote = Collection::from_items([item("a", "x", 1)]);

        let err = local.merge_with(&remote, &clock).unwrap_err();
        assert!(matches!(
            err,
            MergeError::MissingTimestamp {
                side: Side::Local,
                ..
            }
        ));
    }

    #[test]
    fn unstamped_local_record_after_merge_is_rejected() {
        let clock = ManualClock::new(100);
        let mut local = Collection::from_items([Item::new("a", "x")]).with_last_merged(ts(5));
        let remote = Collection::new();

        assert!(local.merge_with(&remote, &clock).is_err());
        assert!(local.get(&key("a")).unwrap().updated.is_none());
    }

    #[test]
    fn unstamped_local_record_before_first_merge_is_forwarded() {
        let clock = ManualClock::new(100);
        let mut local = Collection::from_items([Item::new("fresh", "x")]);
        let remote = Collection::new();

        let report = local.merge_with(&remote, &clock).unwrap();

        assert_eq!(report.forward.added, vec![item("fresh", "x", 100)]);
        assert_eq!(local.last_merged(), ts(100));
    }

    #[test]
    fn report_carries_watermarks() {
        let clock = ManualClock::new(100);
        let mut local = Collection::from_items([item("c", "z", 50)]).with_last_merged(ts(20));
        let remote = Collection::new().with_last_merged(ts(30));

        let report = local.merge_with(&remote, &clock).unwrap();

        assert_eq!(report.previous_watermark, ts(20));
        assert_eq!(report.last_merged, ts(100));
        assert!(!report.is_converged());
    }

    #[test]
    fn report_placement_follows_outcome_mapping() {
        let clock = ManualClock::new(100);
        let wm = ts(10);
        let mut local = Collection::from_items([
            item("removed-by-peer", "a", 5),
            item("unseen-by-peer", "b", 20),
            item("peer-newer", "c", 11),
            item("local-newer", "d", 30),
        ])
        .with_last_merged(wm);
        let remote = Collection::from_items([
            item("added-by-peer", "e", 40),
            item("removed-locally", "f", 3),
            item("peer-newer", "c", 12),
            item("local-newer", "d", 29),
        ]);

        let report = local.merge_with(&remote, &clock).unwrap();

        let expected = [
            ("removed-by-peer", Some(PeerMissing::RemovedByPeer.change())),
            ("unseen-by-peer", Some(PeerMissing::UnseenByPeer.change())),
            ("added-by-peer", PeerRecord::AddedByPeer.change()),
            ("removed-locally", PeerRecord::RemovedLocally.change()),
            ("peer-newer", PeerRecord::PeerNewer.change()),
            ("local-newer", PeerRecord::LocalNewer.change()),
        ];
        for (id, change) in expected {
            let (direction, kind) = change.unwrap();
            let (placed, other) = match direction {
                Direction::Local => (&report.applied, &report.forward),
                Direction::Forward => (&report.forward, &report.applied),
            };
            assert_eq!(placed.kind_of(&key(id)), Some(kind), "{id}");
            assert_eq!(other.kind_of(&key(id)), None, "{id}");
        }
    }

    #[test]
    fn merge_uses_system_clock() {
        let mut local = Collection::from_items([item("c", "z", 50)]).with_last_merged(ts(20));
        let report = local.merge(&Collection::new()).unwrap();
        assert!(report.last_merged > ts(100));
    }
}
