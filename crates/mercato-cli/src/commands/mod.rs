pub mod ingest;
pub mod listings;
pub mod project;
pub mod rejected;
pub mod show;
pub mod status;

use alloy_primitives::{Address, U256};
use anyhow::{bail, Context as _, Result};
use mercato_core::MercatoConfig;
use mercato_file_log::FileEventLog;
use mercato_sqlite::SqliteListingStore;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Resolved configuration shared by every command
pub struct Context {
    pub config: MercatoConfig,
}

impl Context {
    /// `--data-dir` wins over the paths of a `--config` file; with neither,
    /// everything lives under `./data`
    pub fn load(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let config = match (config_path, data_dir) {
            (Some(path), data_dir) => {
                let config = MercatoConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?;
                match data_dir {
                    Some(dir) => config.with_data_dir(dir),
                    None => config,
                }
            }
            (None, data_dir) => {
                MercatoConfig::for_data_dir(data_dir.unwrap_or_else(|| PathBuf::from("./data")))
            }
        };

        tracing::debug!(
            "Using store {} and feed {}",
            config.store.path.display(),
            config.feed.base_dir.display()
        );
        Ok(Self { config })
    }

    pub fn open_feed(&self) -> Result<Arc<FileEventLog>> {
        let log = FileEventLog::open(self.config.feed.clone()).with_context(|| {
            format!("Failed to open event feed {}", self.config.feed.base_dir.display())
        })?;
        Ok(Arc::new(log))
    }

    /// Feed handle for commands that never append
    pub fn open_feed_reader(&self) -> Result<Arc<FileEventLog>> {
        let log = FileEventLog::open_read_only(self.config.feed.clone()).with_context(|| {
            format!("Failed to read event feed {}", self.config.feed.base_dir.display())
        })?;
        Ok(Arc::new(log))
    }

    pub fn open_store(&self) -> Result<Arc<SqliteListingStore>> {
        let store = SqliteListingStore::open(self.config.store.clone()).with_context(|| {
            format!("Failed to open listing store {}", self.config.store.path.display())
        })?;
        Ok(Arc::new(store))
    }
}

pub fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("Invalid {} address '{}'", field, value))
}

/// Decimal or `0x` hex token id
pub fn parse_token_id(value: &str) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() {
        bail!("Token id must not be empty");
    }
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(value, 10),
    };
    parsed.with_context(|| format!("Invalid token id '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_token_id_formats() {
        assert_eq!(parse_token_id("42").unwrap(), U256::from(42u64));
        assert_eq!(parse_token_id(" 0x2a ").unwrap(), U256::from(42u64));
        assert!(parse_token_id("").is_err());
        assert!(parse_token_id("forty").is_err());
    }

    #[test]
    fn test_addresses_accept_any_case() {
        let lower = parse_address("nft", "0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        let mixed = parse_address("nft", "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01").unwrap();
        assert_eq!(lower, mixed);
        assert!(parse_address("nft", "0x1234").is_err());
    }

    #[test]
    fn test_data_dir_defaults() {
        let ctx = Context::load(None, None).unwrap();
        assert_eq!(ctx.config.store.path, Path::new("./data").join("listings.db"));

        let ctx = Context::load(Some(PathBuf::from("/srv/mercato")), None).unwrap();
        assert_eq!(ctx.config.feed.base_dir, Path::new("/srv/mercato").join("feed"));
    }
}
