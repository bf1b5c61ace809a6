//! Assembles a `CacheEnvelope` from orchestrator facts and asset-graph scan
//! results.
//!
//! The orchestrator client reports dags and tasks; the asset-graph scanner
//! reports which asset keys each task produces and how assets depend on each
//! other. The builder turns those facts into per-dag snapshots and the
//! asset-keyed binding index in one pass.

use crate::error::{AirliftError, Result};
use crate::models::{
    AssetBindingEntry, AssetKey, CacheEnvelope, DagRecord, DagSnapshot, TaskAssetBinding,
    TaskHandle, TaskHandleBindingInfo, TaskRecord,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug)]
struct DagFacts {
    record: DagRecord,
    source_code: String,
    tasks: BTreeMap<String, TaskRecord>,
}

/// Collects facts, then produces one immutable envelope.
#[derive(Debug, Default)]
pub struct DefinitionsDataBuilder {
    dags: BTreeMap<String, DagFacts>,
    /// Asset key to bound task handles, in insertion order.
    asset_tasks: BTreeMap<AssetKey, Vec<TaskHandle>>,
    migration_states: BTreeMap<TaskHandle, Option<bool>>,
    /// Upstream asset to its downstream assets.
    downstream_assets: BTreeMap<AssetKey, BTreeSet<AssetKey>>,
}

impl DefinitionsDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dag. Registering the same dag id twice replaces the record
    /// and source but keeps tasks already added.
    pub fn add_dag(&mut self, record: DagRecord, source_code: impl Into<String>) -> &mut Self {
        let source_code = source_code.into();
        self.dags
            .entry(record.dag_id().to_string())
            .and_modify(|facts| {
                facts.record = record.clone();
                facts.source_code = source_code.clone();
            })
            .or_insert_with(|| DagFacts {
                record,
                source_code,
                tasks: BTreeMap::new(),
            });
        self
    }

    /// Register a task of an already registered dag.
    pub fn add_task(&mut self, record: TaskRecord) -> Result<&mut Self> {
        TaskHandle::of(&record)?;
        let facts = self.dags.get_mut(record.dag_id()).ok_or_else(|| {
            AirliftError::invariant(
                "DefinitionsDataBuilder",
                format!(
                    "task '{}' refers to unregistered dag '{}'",
                    record.task_id(),
                    record.dag_id()
                ),
            )
        })?;
        facts.tasks.insert(record.task_id().to_string(), record);
        Ok(self)
    }

    /// Bind an asset key to a registered task. Binding the same pair twice is
    /// a no-op.
    pub fn map_asset(&mut self, asset_key: AssetKey, handle: TaskHandle) -> Result<&mut Self> {
        self.require_task(&handle)?;
        let handles = self.asset_tasks.entry(asset_key).or_default();
        if !handles.contains(&handle) {
            handles.push(handle);
        }
        Ok(self)
    }

    pub fn set_migration_state(
        &mut self,
        handle: TaskHandle,
        migration_state: Option<bool>,
    ) -> Result<&mut Self> {
        self.require_task(&handle)?;
        self.migration_states.insert(handle, migration_state);
        Ok(self)
    }

    /// Record that `downstream` consumes `upstream`.
    pub fn add_asset_dependency(&mut self, upstream: AssetKey, downstream: AssetKey) -> &mut Self {
        self.downstream_assets
            .entry(upstream)
            .or_default()
            .insert(downstream);
        self
    }

    fn require_task(&self, handle: &TaskHandle) -> Result<&TaskRecord> {
        self.dags
            .get(handle.dag_id())
            .and_then(|facts| facts.tasks.get(handle.task_id()))
            .ok_or_else(|| {
                AirliftError::invariant(
                    "DefinitionsDataBuilder",
                    format!("task {} has not been registered", handle),
                )
            })
    }

    fn migration_state(&self, handle: &TaskHandle) -> Option<bool> {
        self.migration_states.get(handle).copied().flatten()
    }

    /// Assets bound to each task, keyed by handle.
    fn assets_by_task(&self) -> BTreeMap<&TaskHandle, BTreeSet<AssetKey>> {
        let mut by_task: BTreeMap<&TaskHandle, BTreeSet<AssetKey>> = BTreeMap::new();
        for (asset_key, handles) in &self.asset_tasks {
            for handle in handles {
                by_task.entry(handle).or_default().insert(asset_key.clone());
            }
        }
        by_task
    }

    /// Assets of a dag with no downstream asset inside the same dag.
    fn leaf_asset_keys(&self, dag_assets: &BTreeSet<AssetKey>) -> BTreeSet<AssetKey> {
        dag_assets
            .iter()
            .filter(|key| {
                self.downstream_assets
                    .get(*key)
                    .map_or(true, |downstream| downstream.is_disjoint(dag_assets))
            })
            .cloned()
            .collect()
    }

    fn build_snapshot(
        &self,
        facts: &DagFacts,
        assets_by_task: &BTreeMap<&TaskHandle, BTreeSet<AssetKey>>,
    ) -> Result<DagSnapshot> {
        let mut bindings = BTreeMap::new();
        let mut dag_assets = BTreeSet::new();

        for task in facts.tasks.values() {
            let handle = TaskHandle::of(task)?;
            let assets = assets_by_task.get(&handle).cloned().unwrap_or_default();
            dag_assets.extend(assets.iter().cloned());
            bindings.insert(
                task.task_id().to_string(),
                TaskHandleBindingInfo::new(self.migration_state(&handle), assets),
            );
        }

        let leaves = self.leaf_asset_keys(&dag_assets);

        DagSnapshot::new(
            facts.record.clone(),
            facts.source_code.clone(),
            facts.tasks.clone(),
            bindings,
            leaves,
        )
    }

    fn build_entries(&self) -> Result<Vec<AssetBindingEntry>> {
        self.asset_tasks
            .iter()
            .map(|(asset_key, handles)| {
                let mapped = handles
                    .iter()
                    .map(|handle| {
                        let task = self.require_task(handle)?;
                        TaskAssetBinding::new(
                            task.clone(),
                            handle.clone(),
                            self.migration_state(handle),
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                AssetBindingEntry::new(asset_key.clone(), mapped)
            })
            .collect()
    }

    /// Produce the envelope. The builder can keep collecting facts and build
    /// again; each call yields an independent envelope.
    pub fn build(&self) -> Result<CacheEnvelope> {
        let assets_by_task = self.assets_by_task();

        let dag_datas = self
            .dags
            .iter()
            .map(|(dag_id, facts)| {
                self.build_snapshot(facts, &assets_by_task)
                    .map(|snapshot| (dag_id.clone(), snapshot))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let entries = self.build_entries()?;

        debug!(
            "Built envelope: {} dags, {} tasks, {} mapped assets",
            dag_datas.len(),
            self.dags.values().map(|facts| facts.tasks.len()).sum::<usize>(),
            entries.len()
        );

        CacheEnvelope::new(entries, dag_datas)
    }
}
