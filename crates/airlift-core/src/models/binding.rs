//! Task handles and their association with internal asset keys.

use super::asset_key::AssetKey;
use super::records::TaskRecord;
use crate::error::{AirliftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable composite key `(dag_id, task_id)` identifying one task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawTaskHandle")]
pub struct TaskHandle {
    dag_id: String,
    task_id: String,
}

#[derive(Deserialize)]
struct RawTaskHandle {
    dag_id: String,
    task_id: String,
}

impl TaskHandle {
    /// Both ids must be non-empty.
    pub fn new(dag_id: impl Into<String>, task_id: impl Into<String>) -> Result<Self> {
        let dag_id = dag_id.into();
        let task_id = task_id.into();

        if dag_id.is_empty() {
            return Err(AirliftError::invariant("TaskHandle", "dag_id must not be empty"));
        }
        if task_id.is_empty() {
            return Err(AirliftError::invariant(
                "TaskHandle",
                format!("task_id must not be empty (dag '{}')", dag_id),
            ));
        }

        Ok(Self { dag_id, task_id })
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Handle of the task a record describes.
    pub fn of(task_info: &TaskRecord) -> Result<Self> {
        Self::new(task_info.dag_id(), task_info.task_id())
    }
}

impl TryFrom<RawTaskHandle> for TaskHandle {
    type Error = AirliftError;

    fn try_from(raw: RawTaskHandle) -> Result<Self> {
        Self::new(raw.dag_id, raw.task_id)
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dag_id, self.task_id)
    }
}

/// One task bound to one internal asset.
///
/// `migration_state` is tri-state: `Some(true)` migrated, `Some(false)` known
/// not migrated, `None` unknown or not applicable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTaskAssetBinding")]
pub struct TaskAssetBinding {
    task_info: TaskRecord,
    task_handle: TaskHandle,
    migration_state: Option<bool>,
}

#[derive(Deserialize)]
struct RawTaskAssetBinding {
    task_info: TaskRecord,
    task_handle: TaskHandle,
    #[serde(alias = "migrated")]
    migration_state: Option<bool>,
}

impl TaskAssetBinding {
    /// Fails with `ConstructionInvariantViolation` when the handle does not
    /// name the same task as `task_info`.
    pub fn new(
        task_info: TaskRecord,
        task_handle: TaskHandle,
        migration_state: Option<bool>,
    ) -> Result<Self> {
        if task_handle.dag_id() != task_info.dag_id()
            || task_handle.task_id() != task_info.task_id()
        {
            return Err(AirliftError::invariant(
                "TaskAssetBinding",
                format!(
                    "handle {} does not match task record {}.{}",
                    task_handle,
                    task_info.dag_id(),
                    task_info.task_id()
                ),
            ));
        }

        Ok(Self {
            task_info,
            task_handle,
            migration_state,
        })
    }

    pub fn task_info(&self) -> &TaskRecord {
        &self.task_info
    }

    pub fn task_handle(&self) -> &TaskHandle {
        &self.task_handle
    }

    pub fn migration_state(&self) -> Option<bool> {
        self.migration_state
    }
}

impl TryFrom<RawTaskAssetBinding> for TaskAssetBinding {
    type Error = AirliftError;

    fn try_from(raw: RawTaskAssetBinding) -> Result<Self> {
        Self::new(raw.task_info, raw.task_handle, raw.migration_state)
    }
}

/// Known data about one task handle within a dag.
///
/// An empty `asset_keys_in_task` says nothing about migration status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandleBindingInfo {
    migration_state: Option<bool>,
    asset_keys_in_task: BTreeSet<AssetKey>,
}

impl TaskHandleBindingInfo {
    pub fn new(migration_state: Option<bool>, asset_keys_in_task: BTreeSet<AssetKey>) -> Self {
        Self {
            migration_state,
            asset_keys_in_task,
        }
    }

    pub fn migration_state(&self) -> Option<bool> {
        self.migration_state
    }

    pub fn asset_keys_in_task(&self) -> &BTreeSet<AssetKey> {
        &self.asset_keys_in_task
    }
}

/// All tasks bound to a single asset key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBindingEntry {
    asset_key: AssetKey,
    mapped_tasks: Vec<TaskAssetBinding>,
}

impl AssetBindingEntry {
    /// An asset with no mapped tasks has no entry at all, so `mapped_tasks`
    /// must be non-empty.
    pub fn new(asset_key: AssetKey, mapped_tasks: Vec<TaskAssetBinding>) -> Result<Self> {
        let entry = Self {
            asset_key,
            mapped_tasks,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn asset_key(&self) -> &AssetKey {
        &self.asset_key
    }

    pub fn mapped_tasks(&self) -> &[TaskAssetBinding] {
        &self.mapped_tasks
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.mapped_tasks.is_empty() {
            return Err(AirliftError::invariant(
                "AssetBindingEntry",
                format!("asset {} has no mapped tasks", self.asset_key),
            ));
        }
        Ok(())
    }
}
