//! Versioned encoding of the cache envelope.
//!
//! The envelope is JSON carrying a `schema_version` tag. Decoding accepts any
//! version in `SchemaConfig::MIN_SUPPORTED_VERSION..=CURRENT_VERSION`:
//! - fields added later (`key_scoped_data_items`) default to empty when absent
//!   from a payload older than the version that introduced them, and are
//!   required from that version on
//! - fields since removed (`existing_asset_data`) are ignored
//! - fields present since version 1 are always required
//!
//! A decoded envelope is re-stamped with the current version, so encoding it
//! again upgrades the stored payload.

use crate::config::SchemaConfig;
use crate::error::{AirliftError, Result};
use crate::models::CacheEnvelope;
use serde_json::Value;
use tracing::debug;

const SCHEMA_VERSION_KEY: &str = "schema_version";
const KEY_SCOPED_DATA_KEY: &str = "key_scoped_data_items";

/// Encode an envelope to bytes.
pub fn encode(envelope: &CacheEnvelope) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(envelope).map_err(|e| AirliftError::Json {
        message: format!("Failed to encode envelope: {}", e),
        source: Some(e),
    })?;

    debug!(
        "Encoded envelope v{} ({} dags, {} bytes)",
        envelope.schema_version(),
        envelope.dag_datas().len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Decode bytes produced by `encode` (this or any supported older version).
pub fn decode(bytes: &[u8]) -> Result<CacheEnvelope> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| AirliftError::Json {
        message: format!("Failed to parse envelope: {}", e),
        source: Some(e),
    })?;

    let version = schema_version(&value)?;
    if !SchemaConfig::is_supported(version) {
        return Err(AirliftError::UnsupportedSchemaVersion {
            found: version,
            supported: SchemaConfig::supported_range(),
        });
    }
    if version >= SchemaConfig::KEY_SCOPED_DATA_SINCE
        && value.get(KEY_SCOPED_DATA_KEY).is_none()
    {
        return Err(AirliftError::contract(
            "CacheEnvelope",
            KEY_SCOPED_DATA_KEY,
            format!("missing required field in schema v{}", version),
        ));
    }

    let envelope: CacheEnvelope = serde_json::from_value(value).map_err(|e| AirliftError::Json {
        message: format!("Failed to decode envelope v{}: {}", version, e),
        source: Some(e),
    })?;
    envelope.validate()?;

    if version < SchemaConfig::KEY_SCOPED_DATA_SINCE {
        debug!(
            "Envelope v{} predates key_scoped_data_items; no asset bindings loaded",
            version
        );
    }
    if version < SchemaConfig::CURRENT_VERSION {
        debug!(
            "Upgraded envelope from schema v{} to v{}",
            version,
            SchemaConfig::CURRENT_VERSION
        );
    }

    Ok(envelope.restamp())
}

fn schema_version(value: &Value) -> Result<u64> {
    let Value::Object(fields) = value else {
        return Err(AirliftError::contract(
            "CacheEnvelope",
            SCHEMA_VERSION_KEY,
            "envelope is not a mapping",
        ));
    };

    match fields.get(SCHEMA_VERSION_KEY) {
        Some(tag) => tag.as_u64().ok_or_else(|| {
            AirliftError::contract(
                "CacheEnvelope",
                SCHEMA_VERSION_KEY,
                format!("expected an unsigned integer, found {}", tag),
            )
        }),
        None => Err(AirliftError::contract(
            "CacheEnvelope",
            SCHEMA_VERSION_KEY,
            "missing version tag",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v1_payload() -> Value {
        json!({
            "schema_version": 1,
            "existing_asset_data": { "whatever": [1, 2, 3] },
            "dag_datas": {
                "etl_dag": {
                    "dag_id": "etl_dag",
                    "task_handle_data": {
                        "load": { "migration_state": true, "asset_keys_in_task": [["warehouse", "table"]] }
                    },
                    "dag_info": {
                        "webserver_url": "http://af",
                        "dag_id": "etl_dag",
                        "metadata": { "file_token": "tok" }
                    },
                    "source_code": "",
                    "leaf_asset_keys": [["warehouse", "table"]],
                    "task_infos": {
                        "load": {
                            "webserver_url": "http://af",
                            "dag_id": "etl_dag",
                            "task_id": "load",
                            "metadata": { "downstream_task_ids": [] }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_decode_v1_defaults_later_fields() {
        let bytes = serde_json::to_vec(&v1_payload()).unwrap();
        let envelope = decode(&bytes).unwrap();

        assert_eq!(envelope.schema_version(), SchemaConfig::CURRENT_VERSION);
        assert!(envelope.key_scoped_data_items().is_empty());
        assert!(envelope.all_mapped_tasks().is_empty());

        let snapshot = envelope.dag_snapshot("etl_dag").unwrap();
        assert_eq!(snapshot.handle_binding("load").unwrap().migration_state(), Some(true));
        assert_eq!(snapshot.dag_info().file_token().unwrap(), "tok");
    }

    #[test]
    fn test_decode_requires_original_fields() {
        let mut payload = v1_payload();
        payload.as_object_mut().unwrap().remove("dag_datas");
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert!(matches!(decode(&bytes), Err(AirliftError::Json { .. })));
    }

    #[test]
    fn test_decode_v3_requires_key_scoped_data() {
        let bytes = serde_json::to_vec(&json!({ "schema_version": 3, "dag_datas": {} })).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            AirliftError::SchemaContractViolation { ref key, .. } if key == "key_scoped_data_items"
        ));

        let bytes = serde_json::to_vec(&json!({
            "schema_version": 3,
            "key_scoped_data_items": [],
            "dag_datas": {}
        }))
        .unwrap();
        assert!(decode(&bytes).unwrap().key_scoped_data_items().is_empty());
    }

    #[test]
    fn test_decode_v2_defaults_key_scoped_data() {
        let mut payload = v1_payload();
        payload["schema_version"] = json!(2);
        let bytes = serde_json::to_vec(&payload).unwrap();

        let envelope = decode(&bytes).unwrap();
        assert_eq!(envelope.schema_version(), SchemaConfig::CURRENT_VERSION);
        assert!(envelope.key_scoped_data_items().is_empty());
        assert!(envelope.dag_snapshot("etl_dag").is_some());
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let bytes = serde_json::to_vec(&json!({ "schema_version": 99, "dag_datas": {} })).unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(AirliftError::UnsupportedSchemaVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_decode_requires_version_tag() {
        let bytes = serde_json::to_vec(&json!({ "dag_datas": {} })).unwrap();
        assert!(decode(&bytes).unwrap_err().is_contract_violation());

        let bytes = serde_json::to_vec(&json!({ "schema_version": "3", "dag_datas": {} })).unwrap();
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode(b"not json"), Err(AirliftError::Json { .. })));
        assert!(decode(b"[1, 2]").unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_decode_validates_invariants() {
        let mut payload = v1_payload();
        payload["dag_datas"]["etl_dag"]["leaf_asset_keys"] = json!([["not", "bound"]]);
        let bytes = serde_json::to_vec(&payload).unwrap();
        assert!(decode(&bytes).unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_reencode_upgrades_and_is_stable() {
        let bytes = serde_json::to_vec(&v1_payload()).unwrap();
        let envelope = decode(&bytes).unwrap();

        let upgraded = encode(&envelope).unwrap();
        let value: Value = serde_json::from_slice(&upgraded).unwrap();
        assert_eq!(value["schema_version"], json!(SchemaConfig::CURRENT_VERSION));
        assert!(value.get("existing_asset_data").is_none());

        let again = encode(&decode(&upgraded).unwrap()).unwrap();
        assert_eq!(upgraded, again);
    }
}
