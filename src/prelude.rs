//! Convenient re-exports for common usage.
//!
//! ```
//! use vault_sync::prelude::*;
//! ```

pub use crate::ChangeKind;
pub use crate::ChangeSet;
pub use crate::Collection;
pub use crate::Item;
pub use crate::MergeReport;
pub use crate::Record;
pub use crate::Timestamp;
