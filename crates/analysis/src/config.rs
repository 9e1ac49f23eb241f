use crate::AnalysisError;
use serde::{Deserialize, Serialize};
use tracestate_partial::PartialHistoryConfig;
use tracestate_provider::DEFAULT_QUEUE_SIZE;

/// Which history backend an analysis stores its intervals in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    /// Every interval is stored.
    #[default]
    Full,
    /// Only checkpoint-crossing intervals are stored; the rest is replayed.
    Partial(PartialHistoryConfig),
}

/// Configuration of a [`StateSystemAnalysis`](crate::StateSystemAnalysis).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Identifier of the analysis, also the state system id.
    pub id: String,

    pub backend: BackendKind,

    /// Capacity of the provider's event queue.
    pub queue_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            id: "analysis".to_string(),
            backend: BackendKind::Full,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl AnalysisConfig {
    pub fn full(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn partial(id: impl Into<String>, partial: PartialHistoryConfig) -> Self {
        Self {
            id: id.into(),
            backend: BackendKind::Partial(partial),
            ..Self::default()
        }
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.id.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "analysis id must not be empty".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(AnalysisError::InvalidConfig(
                "queue_size must be at least 1".to_string(),
            ));
        }
        if let BackendKind::Partial(partial) = &self.backend {
            partial.validate()?;
        }
        Ok(())
    }
}
