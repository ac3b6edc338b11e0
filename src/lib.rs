//! # vault-sync
//!
//! Offline-first reconciliation of two independently modified replicas of
//! the same record collection.
//!
//! Every device (and every server) edits its own [`Collection`] while
//! disconnected. On reconnect one side merges the other's snapshot. The
//! merge keeps legitimate edits, honors deletions made on either side, and
//! reports the minimal set of changes the peer still needs, so the two
//! replicas usually converge in one round trip.
//!
//! ## Quick Start
//!
//! ```
//! use vault_sync::clock::ManualClock;
//! use vault_sync::prelude::*;
//!
//! let clock = ManualClock::new(1_000);
//!
//! let mut phone = Collection::new();
//! phone.update_with(&clock, [Item::new("github", "hunter2")]);
//!
//! clock.advance(10);
//! let mut laptop = Collection::new();
//! laptop.update_with(&clock, [Item::new("email", "correct horse")]);
//!
//! clock.advance(10);
//! let report = phone.merge_with(&laptop, &clock).unwrap();
//!
//! assert_eq!(report.applied.added.len(), 1); // email arrived
//! assert_eq!(report.forward.added.len(), 1); // github goes back to the laptop
//! assert_eq!(phone.len(), 2);
//! ```
//!
//! ## Deletions without tombstones
//!
//! Removing a record leaves nothing behind. Each collection instead keeps a
//! watermark ([`Collection::last_merged`]): a record missing from the peer
//! whose stamp is not newer than the watermark was deleted by the peer,
//! while a newer one is a local addition the peer has not seen yet. The
//! same rule run in reverse tells the peer about local deletions.
//!
//! ## Time
//!
//! Stamps come from a [`Clock`](clock::Clock). The `update` and `merge`
//! shorthands use [`SystemClock`](clock::SystemClock); the `_with` variants
//! take any clock, which keeps tests deterministic.

#![warn(missing_docs)]

mod changes;
mod collection;
mod merge;
mod raw;
mod record;
mod timestamp;

pub mod clock;
pub mod prelude;

pub use changes::{ChangeKind, ChangeSet, Direction};
pub use collection::{Collection, Iter};
pub use merge::{MergeError, MergeReport, PeerMissing, PeerRecord, Side};
pub use raw::RawCollection;
pub use record::{Item, Record};
pub use timestamp::{Timestamp, TimestampError};
