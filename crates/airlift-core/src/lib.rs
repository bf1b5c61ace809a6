//! Airlift Core - cached snapshot of orchestrator dags mapped onto asset keys.
//!
//! Fetching dag and task metadata from the orchestrator API and scanning the
//! asset definitions are both expensive. This crate holds the result of doing
//! that once: a versioned [`CacheEnvelope`] that is built in a single pass,
//! persisted as one unit, and afterwards answers every lookup by dag id or by
//! asset key without contacting the orchestrator again.
//!
//! # Example
//!
//! ```rust,ignore
//! use airlift_core::{AssetKey, DefinitionsDataBuilder, EnvelopeStore, FileEnvelopeStore};
//!
//! let mut builder = DefinitionsDataBuilder::new();
//! builder.add_dag(dag_record, source_code);
//! builder.add_task(task_record)?;
//! builder.map_asset(AssetKey::from("warehouse/table"), handle)?;
//!
//! let store = FileEnvelopeStore::new("cache/airflow-definitions.json");
//! store.replace(&builder.build()?)?;
//!
//! let envelope = store.load()?.expect("envelope was just stored");
//! let leaves = envelope.leaf_asset_keys("etl_dag");
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod models;
pub mod serdes;
pub mod store;

// Re-export commonly used types
pub use builder::DefinitionsDataBuilder;
pub use config::SchemaConfig;
pub use error::{AirliftError, Result};
pub use models::{
    AssetBindingEntry, AssetKey, CacheEnvelope, DagRecord, DagSnapshot, MappedTasks, Metadata,
    TaskAssetBinding, TaskHandle, TaskHandleBindingInfo, TaskRecord,
};
pub use store::{EnvelopeStore, FileEnvelopeStore, SqliteEnvelopeStore, StoreOptions};
