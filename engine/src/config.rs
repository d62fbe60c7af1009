//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the outbox and sync driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Failed attempts after which a record is dead-lettered.
    /// `None` retries forever on every drain.
    pub max_attempts: Option<u32>,
}

impl EngineConfig {
    /// Dead-letter records after `max` failed attempts (0 is treated as 1).
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max.max(1));
        self
    }
}
