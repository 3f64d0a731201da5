use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    history::{DEFAULT_HISTORY_BYTE_BUDGET, DEFAULT_HISTORY_CAPACITY},
    rules::evaluator::{DEFAULT_EXPLODE_CAP, check_explode_cap},
};

pub const DEFAULT_PARSE_CACHE_CAPACITY: usize = 256;

/// Options recognised by [`crate::engine::DiceEngine`].
///
/// Missing fields take their defaults when deserialised, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub require_secure_randomness: bool,
    pub explode_cap: u32,
    pub history_capacity: usize,
    pub history_byte_budget: usize,
    pub parse_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            require_secure_randomness: false,
            explode_cap: DEFAULT_EXPLODE_CAP,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_byte_budget: DEFAULT_HISTORY_BYTE_BUDGET,
            parse_cache_capacity: DEFAULT_PARSE_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_require_secure_randomness(mut self, require: bool) -> Self {
        self.require_secure_randomness = require;
        self
    }

    pub fn with_explode_cap(mut self, cap: u32) -> Self {
        self.explode_cap = cap;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_history_byte_budget(mut self, bytes: usize) -> Self {
        self.history_byte_budget = bytes;
        self
    }

    pub fn with_parse_cache_capacity(mut self, capacity: usize) -> Self {
        self.parse_cache_capacity = capacity;
        self
    }

    /// Rejects settings no engine can honour, such as an oversized explode cap.
    pub fn validate(&self) -> Result<()> {
        check_explode_cap(self.explode_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "requireSecureRandomness": true, "explodeCap": 5 }"#)
                .unwrap();
        assert!(config.require_secure_randomness);
        assert_eq!(config.explode_cap, 5);
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.parse_cache_capacity, DEFAULT_PARSE_CACHE_CAPACITY);
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.require_secure_randomness);
        assert_eq!(config.explode_cap, 100);
        assert_eq!(config.history_capacity, 1000);
    }

    #[test]
    fn test_validate_explode_cap() {
        assert!(EngineConfig::default().validate().is_ok());
        let config: EngineConfig = serde_json::from_str(r#"{ "explodeCap": 4000000000 }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(crate::error::Error::InvalidArgument(_))
        ));
    }
}
