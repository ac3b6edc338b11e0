//! Time sources for stamping records and watermarks.
//!
//! The engine never reads the wall clock directly. Every operation that
//! stamps a record takes a [`Clock`], and merge samples it exactly once so
//! that all stamps written by one merge share an instant.
//!
//! # Example
//!
//! ```
//! use vault_sync::clock::{Clock, ManualClock};
//! use vault_sync::Timestamp;
//!
//! let clock = ManualClock::new(1_000);
//! assert_eq!(clock.now(), Timestamp::from_millis(1_000));
//!
//! clock.advance(500);
//! assert_eq!(clock.now(), Timestamp::from_millis(1_500));
//! ```

use core::sync::atomic::{AtomicU64, Ordering};

use crate::Timestamp;

/// A source of "now".
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Timestamp::from_millis(millis)
    }
}

/// A clock that only moves when told to.
///
/// Interior mutability lets a shared reference be handed to the engine
/// while the test keeps advancing it.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `millis`.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Adapts a plain function returning milliseconds.
///
/// Useful on targets where the caller already owns a monotonic source.
#[derive(Debug, Clone, Copy)]
pub struct FnClock(pub fn() -> u64);

impl Clock for FnClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis((self.0)())
    }
}
