use crate::PartialHistoryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of events between checkpoints when none is configured.
pub const DEFAULT_GRANULARITY: u64 = 50_000;

/// Configuration of a partial history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialHistoryConfig {
    /// Events between two checkpoints. Larger values store fewer intervals
    /// and replay more events per query.
    pub granularity: u64,

    /// Upper bound on the total time a query waits for checkpoint
    /// registration and the history build together. `None` waits forever.
    pub checkpoint_timeout: Option<Duration>,

    /// Upper bound on how long a query waits for its replay. `None` waits
    /// forever.
    pub replay_timeout: Option<Duration>,
}

impl Default for PartialHistoryConfig {
    fn default() -> Self {
        Self {
            granularity: DEFAULT_GRANULARITY,
            checkpoint_timeout: None,
            replay_timeout: None,
        }
    }
}

impl PartialHistoryConfig {
    pub fn with_granularity(granularity: u64) -> Self {
        Self {
            granularity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), PartialHistoryError> {
        if self.granularity == 0 {
            return Err(PartialHistoryError::InvalidGranularity {
                granularity: self.granularity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_granularity_is_rejected() {
        assert!(PartialHistoryConfig::with_granularity(0).validate().is_err());
        assert!(PartialHistoryConfig::with_granularity(1).validate().is_ok());
        assert!(PartialHistoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: PartialHistoryConfig = serde_json::from_str(r#"{"granularity": 10}"#).unwrap();
        assert_eq!(config.granularity, 10);
        assert_eq!(config.replay_timeout, None);

        let config: PartialHistoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PartialHistoryConfig::default());
    }
}
