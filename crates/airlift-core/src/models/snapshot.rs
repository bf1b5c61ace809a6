//! Pre-computed data about a single dag.

use super::asset_key::AssetKey;
use super::binding::TaskHandleBindingInfo;
use super::records::{DagRecord, TaskRecord};
use crate::error::{AirliftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Read-only aggregate for one dag: its record, source, tasks, per-task
/// binding data and leaf asset keys.
///
/// `task_infos` and `task_handle_bindings` are keyed by task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagSnapshot {
    dag_id: String,
    #[serde(alias = "task_handle_data")]
    task_handle_bindings: BTreeMap<String, TaskHandleBindingInfo>,
    dag_info: DagRecord,
    source_code: String,
    leaf_asset_keys: BTreeSet<AssetKey>,
    task_infos: BTreeMap<String, TaskRecord>,
}

impl DagSnapshot {
    /// Build a snapshot, checking that every task belongs to `dag_info`'s dag
    /// and that leaf keys come from this dag's bindings.
    pub fn new(
        dag_info: DagRecord,
        source_code: impl Into<String>,
        task_infos: BTreeMap<String, TaskRecord>,
        task_handle_bindings: BTreeMap<String, TaskHandleBindingInfo>,
        leaf_asset_keys: BTreeSet<AssetKey>,
    ) -> Result<Self> {
        let snapshot = Self {
            dag_id: dag_info.dag_id().to_string(),
            task_handle_bindings,
            dag_info,
            source_code: source_code.into(),
            leaf_asset_keys,
            task_infos,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn dag_info(&self) -> &DagRecord {
        &self.dag_info
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn task_info(&self, task_id: &str) -> Option<&TaskRecord> {
        self.task_infos.get(task_id)
    }

    pub fn handle_binding(&self, task_id: &str) -> Option<&TaskHandleBindingInfo> {
        self.task_handle_bindings.get(task_id)
    }

    /// Assets in this dag with no downstream consumer inside the same dag.
    pub fn leaf_asset_keys(&self) -> &BTreeSet<AssetKey> {
        &self.leaf_asset_keys
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.task_infos.keys().map(String::as_str)
    }

    pub fn task_infos(&self) -> impl Iterator<Item = &TaskRecord> {
        self.task_infos.values()
    }

    /// Every asset key bound to some task of this dag.
    pub fn asset_keys(&self) -> BTreeSet<&AssetKey> {
        self.task_handle_bindings
            .values()
            .flat_map(|info| info.asset_keys_in_task())
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dag_id != self.dag_info.dag_id() {
            return Err(AirliftError::invariant(
                "DagSnapshot",
                format!(
                    "dag_id '{}' does not match dag_info '{}'",
                    self.dag_id,
                    self.dag_info.dag_id()
                ),
            ));
        }

        for (task_id, task) in &self.task_infos {
            if task.dag_id() != self.dag_id || task.task_id() != task_id {
                return Err(AirliftError::invariant(
                    "DagSnapshot",
                    format!(
                        "task entry '{}' holds {}.{}, expected a task of dag '{}'",
                        task_id,
                        task.dag_id(),
                        task.task_id(),
                        self.dag_id
                    ),
                ));
            }
        }

        if let Some(task_id) = self
            .task_handle_bindings
            .keys()
            .find(|task_id| !self.task_infos.contains_key(*task_id))
        {
            return Err(AirliftError::invariant(
                "DagSnapshot",
                format!(
                    "binding for task '{}' has no task in dag '{}'",
                    task_id, self.dag_id
                ),
            ));
        }

        let bound = self.asset_keys();
        if let Some(key) = self.leaf_asset_keys.iter().find(|key| !bound.contains(key)) {
            return Err(AirliftError::invariant(
                "DagSnapshot",
                format!(
                    "leaf asset {} is not bound to any task of dag '{}'",
                    key, self.dag_id
                ),
            ));
        }

        Ok(())
    }
}
