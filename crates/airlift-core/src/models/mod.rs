//! Cached data model.
//!
//! All entities are immutable values. Derived fields are memoized in
//! write-once cells, so any number of readers may share them without locking.

mod asset_key;
mod binding;
mod envelope;
mod records;
mod snapshot;

pub use asset_key::AssetKey;
pub use binding::{AssetBindingEntry, TaskAssetBinding, TaskHandle, TaskHandleBindingInfo};
pub use envelope::{CacheEnvelope, MappedTasks};
pub use records::{DagRecord, Metadata, TaskRecord};
pub use snapshot::DagSnapshot;
