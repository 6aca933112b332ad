pub mod feed;
pub mod projector;
pub mod store;

pub use feed::FeedConfig;
pub use projector::{ProjectorConfig, SoldPolicy};
pub use store::{StoreConfig, SynchronousMode};

use crate::error::{MercatoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything an indexer deployment needs, loadable from one JSON file
///
/// ```json
/// {
///   "store": { "path": "/var/lib/mercato/listings.db" },
///   "feed": { "base_dir": "/var/lib/mercato/feed" },
///   "projector": { "sold_policy": "terminal" }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MercatoConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub projector: ProjectorConfig,
}

impl MercatoConfig {
    /// Defaults with the store and feed placed under `data_dir`:
    /// - `{data_dir}/listings.db`
    /// - `{data_dir}/feed/`
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::default().with_data_dir(data_dir)
    }

    /// Relocate the store and feed under `data_dir`, keeping other settings.
    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        self.store.path = data_dir.join("listings.db");
        self.feed.base_dir = data_dir.join("feed");
        self
    }

    /// Load from a JSON file; missing sections take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| MercatoError::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: MercatoConfig = serde_json::from_str(
            r#"{ "projector": { "sold_policy": "terminal", "batch_events_max": 10 } }"#,
        )
        .unwrap();

        assert_eq!(config.projector.sold_policy, SoldPolicy::Terminal);
        assert_eq!(config.projector.batch_events_max, 10);
        assert!(config.projector.enforce_key_order);
        assert_eq!(config.store.path, PathBuf::from("./data/listings.db"));
        assert!(config.store.wal_mode);

        let config: MercatoConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.projector.sold_policy, SoldPolicy::Permissive);
    }

    #[test]
    fn test_data_dir_relocates_store_and_feed() {
        let config = MercatoConfig::for_data_dir("/tmp/indexer");
        assert_eq!(config.store.path, PathBuf::from("/tmp/indexer/listings.db"));
        assert_eq!(config.feed.base_dir, PathBuf::from("/tmp/indexer/feed"));
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = MercatoConfig::load(&path).unwrap_err();
        assert!(matches!(err, MercatoError::Config(_)));
    }
}
