//! Orchestrator-reported records for a single dag or task.
//!
//! The `metadata` mapping is stored exactly as the orchestrator reported it.
//! Only a handful of keys are load-bearing, and those are validated when the
//! derived accessor is first used rather than at construction.

use crate::config::DAGS_URL_SEGMENT;
use crate::error::{AirliftError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Opaque metadata mapping as reported by the orchestrator.
pub type Metadata = Map<String, Value>;

const DOWNSTREAM_TASK_IDS: &str = "downstream_task_ids";
const FILE_TOKEN: &str = "file_token";

/// One external task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(alias = "webserver_url")]
    display_base_url: String,
    dag_id: String,
    task_id: String,
    metadata: Metadata,
    /// Memoized `downstream_task_ids`; the record never changes, so this is
    /// never invalidated.
    #[serde(skip)]
    downstream_task_ids: OnceLock<Vec<String>>,
}

impl TaskRecord {
    pub fn new(
        display_base_url: impl Into<String>,
        dag_id: impl Into<String>,
        task_id: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            display_base_url: display_base_url.into(),
            dag_id: dag_id.into(),
            task_id: task_id.into(),
            metadata,
            downstream_task_ids: OnceLock::new(),
        }
    }

    pub fn display_base_url(&self) -> &str {
        &self.display_base_url
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Url of the owning dag in the orchestrator's UI.
    pub fn dag_url(&self) -> String {
        format!("{}{}{}", self.display_base_url, DAGS_URL_SEGMENT, self.dag_id)
    }

    /// Ids of the tasks directly downstream of this one.
    ///
    /// Fails with `SchemaContractViolation` when `downstream_task_ids` is
    /// missing from the metadata or is not a list of strings. A successful
    /// read is computed once and reused.
    pub fn downstream_task_ids(&self) -> Result<&[String]> {
        if let Some(ids) = self.downstream_task_ids.get() {
            return Ok(ids.as_slice());
        }

        let ids = string_list(&self.metadata, DOWNSTREAM_TASK_IDS)?;
        // A concurrent first read may have won; both computed the same value.
        Ok(self.downstream_task_ids.get_or_init(|| ids).as_slice())
    }
}

impl PartialEq for TaskRecord {
    fn eq(&self, other: &Self) -> bool {
        self.display_base_url == other.display_base_url
            && self.dag_id == other.dag_id
            && self.task_id == other.task_id
            && self.metadata == other.metadata
    }
}

impl Eq for TaskRecord {}

/// One external dag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagRecord {
    #[serde(alias = "webserver_url")]
    display_base_url: String,
    dag_id: String,
    metadata: Metadata,
}

impl DagRecord {
    pub fn new(
        display_base_url: impl Into<String>,
        dag_id: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            display_base_url: display_base_url.into(),
            dag_id: dag_id.into(),
            metadata,
        }
    }

    pub fn display_base_url(&self) -> &str {
        &self.display_base_url
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn url(&self) -> String {
        format!("{}{}{}", self.display_base_url, DAGS_URL_SEGMENT, self.dag_id)
    }

    /// Token identifying the dag's source file, read straight from metadata.
    pub fn file_token(&self) -> Result<&str> {
        match self.metadata.get(FILE_TOKEN) {
            Some(Value::String(token)) => Ok(token.as_str()),
            Some(other) => Err(AirliftError::contract(
                "DagRecord",
                FILE_TOKEN,
                format!("expected a string, found {}", type_name(other)),
            )),
            None => Err(AirliftError::contract(
                "DagRecord",
                FILE_TOKEN,
                "missing required metadata key",
            )),
        }
    }
}

fn string_list(metadata: &Metadata, key: &str) -> Result<Vec<String>> {
    let value = metadata
        .get(key)
        .ok_or_else(|| AirliftError::contract("TaskRecord", key, "missing required metadata key"))?;

    let Value::Array(items) = value else {
        return Err(AirliftError::contract(
            "TaskRecord",
            key,
            format!("expected a list of strings, found {}", type_name(value)),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(AirliftError::contract(
                "TaskRecord",
                key,
                format!("element {} is {}, expected a string", index, type_name(other)),
            )),
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("test metadata must be an object"),
        }
    }

    fn task(meta: Value) -> TaskRecord {
        TaskRecord::new("http://airflow:8080", "etl_dag", "extract", metadata(meta))
    }

    #[test]
    fn test_task_dag_url() {
        let t = task(json!({ "downstream_task_ids": [] }));
        assert_eq!(t.dag_url(), "http://airflow:8080/dags/etl_dag");
    }

    #[test]
    fn test_dag_url() {
        let d = DagRecord::new("http://airflow:8080", "etl_dag", Metadata::new());
        assert_eq!(d.url(), "http://airflow:8080/dags/etl_dag");
    }

    #[test]
    fn test_downstream_task_ids() {
        let t = task(json!({ "downstream_task_ids": ["load", "report"] }));
        assert_eq!(t.downstream_task_ids().unwrap(), ["load", "report"]);
    }

    #[test]
    fn test_downstream_task_ids_memoized() {
        let t = task(json!({ "downstream_task_ids": ["load"] }));
        let first = t.downstream_task_ids().unwrap();
        let second = t.downstream_task_ids().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_downstream_task_ids_missing() {
        let t = task(json!({ "owner": "data" }));
        let err = t.downstream_task_ids().unwrap_err();
        assert!(matches!(
            err,
            AirliftError::SchemaContractViolation { ref key, .. } if key == "downstream_task_ids"
        ));
    }

    #[test]
    fn test_downstream_task_ids_wrong_type() {
        let t = task(json!({ "downstream_task_ids": "load" }));
        assert!(t.downstream_task_ids().unwrap_err().is_contract_violation());

        let t = task(json!({ "downstream_task_ids": ["load", 3] }));
        let err = t.downstream_task_ids().unwrap_err();
        assert!(err.to_string().contains("element 1 is a number"));
    }

    #[test]
    fn test_file_token() {
        let d = DagRecord::new("http://af", "d", metadata(json!({ "file_token": "abc" })));
        assert_eq!(d.file_token().unwrap(), "abc");

        let d = DagRecord::new("http://af", "d", Metadata::new());
        assert!(matches!(
            d.file_token(),
            Err(AirliftError::SchemaContractViolation { .. })
        ));

        let d = DagRecord::new("http://af", "d", metadata(json!({ "file_token": 7 })));
        assert!(d.file_token().is_err());
    }

    #[test]
    fn test_equality_ignores_memo() {
        let a = task(json!({ "downstream_task_ids": ["load"] }));
        let b = a.clone();
        a.downstream_task_ids().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_accepts_webserver_url_field() {
        let t: TaskRecord = serde_json::from_value(json!({
            "webserver_url": "http://af",
            "dag_id": "d",
            "task_id": "t",
            "metadata": { "downstream_task_ids": [] }
        }))
        .unwrap();
        assert_eq!(t.display_base_url(), "http://af");
    }
}
