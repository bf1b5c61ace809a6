//! The top-level persisted object.
//!
//! A `CacheEnvelope` is what gets encoded, stored, loaded and decoded. It is
//! never updated in place: a newer snapshot means a whole new envelope.

use super::asset_key::AssetKey;
use super::binding::{AssetBindingEntry, TaskAssetBinding};
use super::records::TaskRecord;
use super::snapshot::DagSnapshot;
use crate::config::SchemaConfig;
use crate::error::{AirliftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;
use tracing::warn;

/// Asset key to the tasks bound to it.
pub type MappedTasks = HashMap<AssetKey, Vec<TaskAssetBinding>>;

/// Data cached to avoid repeated calls to the orchestrator API and repeated
/// scans of the asset definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    schema_version: u64,
    /// Added in schema version 3; absent from older envelopes.
    #[serde(default)]
    key_scoped_data_items: Vec<AssetBindingEntry>,
    dag_datas: BTreeMap<String, DagSnapshot>,
    #[serde(skip)]
    mapped_tasks: OnceLock<MappedTasks>,
}

impl CacheEnvelope {
    pub fn new(
        key_scoped_data_items: Vec<AssetBindingEntry>,
        dag_datas: BTreeMap<String, DagSnapshot>,
    ) -> Result<Self> {
        let envelope = Self {
            schema_version: SchemaConfig::CURRENT_VERSION,
            key_scoped_data_items,
            dag_datas,
            mapped_tasks: OnceLock::new(),
        };
        envelope.validate()?;
        Ok(envelope)
    }

    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    pub fn key_scoped_data_items(&self) -> &[AssetBindingEntry] {
        &self.key_scoped_data_items
    }

    pub fn dag_datas(&self) -> &BTreeMap<String, DagSnapshot> {
        &self.dag_datas
    }

    /// Asset key to bound tasks, flattened from `key_scoped_data_items`.
    ///
    /// Built on first access and cached for the envelope's lifetime. When an
    /// asset key appears in more than one entry the later entry wins.
    pub fn all_mapped_tasks(&self) -> &MappedTasks {
        self.mapped_tasks
            .get_or_init(|| aggregate_mapped_tasks(&self.key_scoped_data_items))
    }

    pub fn mapped_tasks_for(&self, asset_key: &AssetKey) -> Option<&[TaskAssetBinding]> {
        self.all_mapped_tasks().get(asset_key).map(Vec::as_slice)
    }

    pub fn dag_snapshot(&self, dag_id: &str) -> Option<&DagSnapshot> {
        self.dag_datas.get(dag_id)
    }

    pub fn task_info(&self, dag_id: &str, task_id: &str) -> Option<&TaskRecord> {
        self.dag_snapshot(dag_id)?.task_info(task_id)
    }

    pub fn leaf_asset_keys(&self, dag_id: &str) -> Option<&BTreeSet<AssetKey>> {
        self.dag_snapshot(dag_id).map(DagSnapshot::leaf_asset_keys)
    }

    pub fn dag_ids(&self) -> impl Iterator<Item = &str> {
        self.dag_datas.keys().map(String::as_str)
    }

    /// Re-check every construction invariant, e.g. after decoding.
    pub fn validate(&self) -> Result<()> {
        for (dag_id, snapshot) in &self.dag_datas {
            if dag_id != snapshot.dag_id() {
                return Err(AirliftError::invariant(
                    "CacheEnvelope",
                    format!(
                        "dag_datas key '{}' holds snapshot of dag '{}'",
                        dag_id,
                        snapshot.dag_id()
                    ),
                ));
            }
            snapshot.validate()?;
        }

        for item in &self.key_scoped_data_items {
            item.validate()?;
        }

        Ok(())
    }

    pub(crate) fn restamp(mut self) -> Self {
        self.schema_version = SchemaConfig::CURRENT_VERSION;
        self
    }
}

impl PartialEq for CacheEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.schema_version == other.schema_version
            && self.key_scoped_data_items == other.key_scoped_data_items
            && self.dag_datas == other.dag_datas
    }
}

impl Eq for CacheEnvelope {}

#[cfg(test)]
thread_local! {
    static AGGREGATIONS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

fn aggregate_mapped_tasks(items: &[AssetBindingEntry]) -> MappedTasks {
    #[cfg(test)]
    AGGREGATIONS.with(|count| count.set(count.get() + 1));

    let mut mapped = MappedTasks::with_capacity(items.len());
    for item in items {
        if mapped
            .insert(item.asset_key().clone(), item.mapped_tasks().to_vec())
            .is_some()
        {
            warn!(
                "Asset {} appears in more than one binding entry; keeping the later one",
                item.asset_key()
            );
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::binding::{TaskHandle, TaskHandleBindingInfo};
    use crate::models::records::{DagRecord, Metadata};
    use serde_json::json;

    fn aggregations() -> usize {
        AGGREGATIONS.with(|count| count.get())
    }

    fn binding(dag_id: &str, task_id: &str) -> TaskAssetBinding {
        let mut metadata = Metadata::new();
        metadata.insert("downstream_task_ids".into(), json!([]));
        TaskAssetBinding::new(
            TaskRecord::new("http://af", dag_id, task_id, metadata),
            TaskHandle::new(dag_id, task_id).unwrap(),
            None,
        )
        .unwrap()
    }

    fn entry(key: &str, bindings: Vec<TaskAssetBinding>) -> AssetBindingEntry {
        AssetBindingEntry::new(AssetKey::from(key), bindings).unwrap()
    }

    #[test]
    fn test_all_mapped_tasks_computed_once() {
        let envelope = CacheEnvelope::new(
            vec![entry("a", vec![binding("d", "t1")]), entry("b", vec![binding("d", "t2")])],
            BTreeMap::new(),
        )
        .unwrap();

        let before = aggregations();
        let first = envelope.all_mapped_tasks();
        let second = envelope.all_mapped_tasks();

        assert_eq!(first, second);
        assert!(std::ptr::eq(first, second));
        assert_eq!(aggregations() - before, 1);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_duplicate_asset_key_keeps_later_entry() {
        let envelope = CacheEnvelope::new(
            vec![
                entry("a", vec![binding("d", "first")]),
                entry("a", vec![binding("d", "second")]),
            ],
            BTreeMap::new(),
        )
        .unwrap();

        let mapped = envelope.mapped_tasks_for(&AssetKey::from("a")).unwrap();
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].task_handle().task_id(), "second");
    }

    #[test]
    fn test_missing_lookups_are_none() {
        let envelope = CacheEnvelope::new(vec![], BTreeMap::new()).unwrap();
        assert!(envelope.dag_snapshot("nonexistent_dag").is_none());
        assert!(envelope.task_info("nonexistent_dag", "t").is_none());
        assert!(envelope.leaf_asset_keys("nonexistent_dag").is_none());
        assert!(envelope.mapped_tasks_for(&AssetKey::from("x")).is_none());
    }

    #[test]
    fn test_rejects_misfiled_snapshot() {
        let mut metadata = Metadata::new();
        metadata.insert("file_token".into(), json!("tok"));
        let snapshot = DagSnapshot::new(
            DagRecord::new("http://af", "real_dag", metadata),
            "",
            BTreeMap::new(),
            BTreeMap::<String, TaskHandleBindingInfo>::new(),
            BTreeSet::new(),
        )
        .unwrap();

        let result = CacheEnvelope::new(
            vec![],
            BTreeMap::from([("other_dag".to_string(), snapshot)]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_equality_ignores_memo() {
        let envelope = CacheEnvelope::new(vec![entry("a", vec![binding("d", "t")])], BTreeMap::new())
            .unwrap();
        let copy = envelope.clone();
        envelope.all_mapped_tasks();
        assert_eq!(envelope, copy);
    }
}
