//! Plain-text rendering of envelope lookups.

use airlift_core::{AssetKey, CacheEnvelope};
use anyhow::{anyhow, Result};
use std::fmt::Write;

fn migration_label(state: Option<bool>) -> &'static str {
    match state {
        Some(true) => "migrated",
        Some(false) => "not migrated",
        None => "unknown",
    }
}

pub fn summary(envelope: &CacheEnvelope) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "schema version: {}", envelope.schema_version())?;
    writeln!(out, "dags: {}", envelope.dag_datas().len())?;
    for (dag_id, snapshot) in envelope.dag_datas() {
        writeln!(
            out,
            "  {} ({} tasks, {} leaf assets)",
            dag_id,
            snapshot.task_ids().count(),
            snapshot.leaf_asset_keys().len()
        )?;
    }

    let mut assets: Vec<_> = envelope.all_mapped_tasks().keys().collect();
    assets.sort();
    writeln!(out, "mapped assets: {}", assets.len())?;
    for key in assets {
        writeln!(out, "  {}", key)?;
    }
    Ok(out)
}

pub fn dag(envelope: &CacheEnvelope, dag_id: &str) -> Result<String> {
    let snapshot = envelope
        .dag_snapshot(dag_id)
        .ok_or_else(|| anyhow!("Dag '{}' is not in the cache", dag_id))?;

    let mut out = String::new();
    writeln!(out, "dag: {}", snapshot.dag_id())?;
    writeln!(out, "url: {}", snapshot.dag_info().url())?;
    if let Ok(token) = snapshot.dag_info().file_token() {
        writeln!(out, "file token: {}", token)?;
    }

    writeln!(out, "tasks:")?;
    for task in snapshot.task_infos() {
        let downstream = task.downstream_task_ids()?.join(", ");
        let binding = snapshot.handle_binding(task.task_id());
        let state = binding.and_then(|b| b.migration_state());
        let assets: Vec<_> = binding
            .map(|b| b.asset_keys_in_task().iter().map(AssetKey::to_user_string).collect())
            .unwrap_or_default();

        writeln!(
            out,
            "  {} [{}] -> [{}] assets: [{}]",
            task.task_id(),
            migration_label(state),
            downstream,
            assets.join(", ")
        )?;
    }

    let leaves: Vec<_> = snapshot
        .leaf_asset_keys()
        .iter()
        .map(AssetKey::to_user_string)
        .collect();
    writeln!(out, "leaf assets: [{}]", leaves.join(", "))?;
    Ok(out)
}

pub fn asset(envelope: &CacheEnvelope, key: &AssetKey) -> Result<String> {
    let mapped = envelope
        .mapped_tasks_for(key)
        .ok_or_else(|| anyhow!("Asset '{}' has no mapped tasks", key))?;

    let mut out = String::new();
    writeln!(out, "asset: {}", key)?;
    for binding in mapped {
        writeln!(
            out,
            "  {} [{}] {}",
            binding.task_handle(),
            migration_label(binding.migration_state()),
            binding.task_info().dag_url()
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlift_core::{DagRecord, DefinitionsDataBuilder, Metadata, TaskHandle, TaskRecord};
    use serde_json::json;

    fn envelope() -> CacheEnvelope {
        let mut dag_meta = Metadata::new();
        dag_meta.insert("file_token".into(), json!("etl.py"));
        let mut task_meta = Metadata::new();
        task_meta.insert("downstream_task_ids".into(), json!([]));

        let mut builder = DefinitionsDataBuilder::new();
        builder.add_dag(DagRecord::new("http://af", "etl_dag", dag_meta), "");
        builder
            .add_task(TaskRecord::new("http://af", "etl_dag", "load", task_meta))
            .unwrap();
        let handle = TaskHandle::new("etl_dag", "load").unwrap();
        builder
            .map_asset(AssetKey::from("warehouse/table"), handle.clone())
            .unwrap()
            .set_migration_state(handle, Some(true))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_summary_lists_dags_and_assets() {
        let text = summary(&envelope()).unwrap();
        assert!(text.contains("dags: 1"));
        assert!(text.contains("etl_dag (1 tasks, 1 leaf assets)"));
        assert!(text.contains("  warehouse/table"));
    }

    #[test]
    fn test_dag_report() {
        let text = dag(&envelope(), "etl_dag").unwrap();
        assert!(text.contains("url: http://af/dags/etl_dag"));
        assert!(text.contains("file token: etl.py"));
        assert!(text.contains("load [migrated] -> [] assets: [warehouse/table]"));
        assert!(dag(&envelope(), "nonexistent_dag").is_err());
    }

    #[test]
    fn test_asset_report() {
        let text = asset(&envelope(), &AssetKey::from("warehouse/table")).unwrap();
        assert!(text.contains("etl_dag.load [migrated] http://af/dags/etl_dag"));
        assert!(asset(&envelope(), &AssetKey::from("nope")).is_err());
    }
}
