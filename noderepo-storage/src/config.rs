use std::path::Path;

use noderepo_bus::BusConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{StoreError, StoreResult};

/// Storage engine configuration.
///
/// ```toml
/// prefix = "nodes"
/// read_only = false
/// remove_batch_size = 1024
///
/// [bus]
/// hub_capacity = 512
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Table and channel name prefix.
    pub prefix: String,
    /// Reject every write with [`StoreError::ReadOnly`].
    pub read_only: bool,
    /// Rows soft-deleted per batch by `remove`.
    pub remove_batch_size: usize,
    pub bus: BusConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: "nodes".to_string(),
            read_only: false,
            remove_batch_size: 1024,
            bus: BusConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded store configuration from {:?}", path);
        Ok(config)
    }

    /// Checks values that would otherwise surface as SQL errors.
    pub fn validate(&self) -> StoreResult<()> {
        if self.prefix.is_empty()
            || !self
                .prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StoreError::InvalidConfig(format!(
                "prefix must match [A-Za-z0-9_]+, got {:?}",
                self.prefix
            )));
        }
        if self.remove_batch_size == 0 {
            return Err(StoreError::InvalidConfig(
                "remove_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn nodes_table(&self) -> String {
        format!("{}_nodes", self.prefix)
    }

    #[must_use]
    pub fn audit_table(&self) -> String {
        format!("{}_nodes_audit", self.prefix)
    }

    /// Channel every [`ModelEvent`](noderepo_types::ModelEvent) is published on.
    #[must_use]
    pub fn event_channel(&self) -> String {
        format!("{}_manager_action", self.prefix)
    }
}
