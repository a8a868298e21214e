use crate::error::{KanbanError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Tuning for sparse position allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// Gap left between neighbours when appending, prepending or renumbering
    pub position_step: i64,
    /// Position given to the first item of an empty list
    pub default_position: i64,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            position_step: 1000,
            default_position: 1000,
        }
    }
}

impl ReorderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.position_step < 2 {
            return Err(KanbanError::ConfigError(format!(
                "position_step must be at least 2, got {}",
                self.position_step
            )));
        }
        if self.default_position < 0 {
            return Err(KanbanError::ConfigError(format!(
                "default_position must not be negative, got {}",
                self.default_position
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| KanbanError::ConfigError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config from a JSON file, falling back to defaults when the
    /// file does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no reorder config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await?;
        Self::from_json(&contents)
    }
}
