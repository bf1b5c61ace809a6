//! Centralized configuration for the airlift definitions cache.
//!
//! Schema version history of the persisted envelope:
//! - 1: created
//! - 2: removed `existing_asset_data`
//! - 3: added `key_scoped_data_items`

/// Envelope schema versioning.
pub struct SchemaConfig;

impl SchemaConfig {
    pub const CURRENT_VERSION: u64 = 3;
    pub const MIN_SUPPORTED_VERSION: u64 = 1;
    /// First version that carries `key_scoped_data_items`.
    pub const KEY_SCOPED_DATA_SINCE: u64 = 3;

    pub fn is_supported(version: u64) -> bool {
        (Self::MIN_SUPPORTED_VERSION..=Self::CURRENT_VERSION).contains(&version)
    }

    pub fn supported_range() -> String {
        format!("{}..={}", Self::MIN_SUPPORTED_VERSION, Self::CURRENT_VERSION)
    }
}

/// File names used by the file-backed store.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_FILE_NAME: &'static str = "airflow-definitions.json";
    pub const BACKUP_EXTENSION: &'static str = "json.bak";
    pub const TEMP_SUFFIX: &'static str = "tmp";
}

/// Keys used by the SQLite-backed store.
pub struct StoreConfig;

impl StoreConfig {
    pub const NAMESPACE: &'static str = "airlift";
    pub const ENVELOPE_KEY: &'static str = "serialized_airflow_definitions_data";
}

/// Path segment between the orchestrator's webserver url and a dag id.
pub const DAGS_URL_SEGMENT: &str = "/dags/";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_versions() {
        assert!(SchemaConfig::is_supported(1));
        assert!(SchemaConfig::is_supported(SchemaConfig::CURRENT_VERSION));
        assert!(!SchemaConfig::is_supported(0));
        assert!(!SchemaConfig::is_supported(SchemaConfig::CURRENT_VERSION + 1));
        assert_eq!(SchemaConfig::supported_range(), "1..=3");
    }
}
