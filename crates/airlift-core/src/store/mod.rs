//! Persistence of the cache envelope.
//!
//! A store holds at most one envelope and replaces it as a single unit:
//! readers see either the previous complete envelope or the new one.
//! - `FileEnvelopeStore`: temp file + fsync + atomic rename
//! - `SqliteEnvelopeStore`: one row per namespace/key in a shared database

mod file;
mod sqlite;

pub use file::FileEnvelopeStore;
pub use sqlite::SqliteEnvelopeStore;

use crate::error::Result;
use crate::models::CacheEnvelope;

/// Options for file-backed stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Copy the previous envelope to a `.bak` file before replacing it.
    pub keep_backup: bool,
}

/// Single-writer, multi-reader storage for one envelope.
///
/// All operations are synchronous.
pub trait EnvelopeStore: Send + Sync {
    /// Load and decode the stored envelope.
    ///
    /// Returns `None` if nothing has been stored yet.
    fn load(&self) -> Result<Option<CacheEnvelope>>;

    /// Atomically replace the stored envelope.
    fn replace(&self, envelope: &CacheEnvelope) -> Result<()>;

    /// Remove the stored envelope. Returns whether one existed.
    fn clear(&self) -> Result<bool>;
}
