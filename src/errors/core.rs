use thiserror::Error;

use crate::activation::report::ActivationReport;
use crate::activation::{DuplicateOutputError, GraphError};
use crate::binder::BindingError;
use crate::units::{DiscoveryError, FactoryError};

/// Umbrella error type for the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Duplicate output: {0}")]
    DuplicateOutput(#[from] DuplicateOutputError),

    #[error("Factory error: {0}")]
    Factory(#[from] FactoryError),

    #[error("Property sources are frozen; cannot add layer '{layer}'")]
    FrozenSources { layer: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Check if the error is a discovery error
    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::Discovery(_))
    }

    /// Check if the error is a binding error
    pub fn is_binding(&self) -> bool {
        matches!(self, Self::Binding(_))
    }

    /// Check if the error is an ordering error
    pub fn is_graph(&self) -> bool {
        matches!(self, Self::Graph(_))
    }
}

/// Aggregated startup failure: the fatal error together with the per-unit
/// report at the point of failure, so a single surface carries the full
/// context instead of a chain of low-level errors.
#[derive(Debug, Error)]
#[error("Activation run failed: {error}")]
pub struct ActivationFailure {
    #[source]
    pub error: EngineError,
    pub report: ActivationReport,
}

impl ActivationFailure {
    /// A failure raised before any unit was attempted; the report is empty.
    pub(crate) fn early(error: EngineError) -> Self {
        Self {
            error,
            report: ActivationReport::new(
                uuid::Uuid::new_v4(),
                chrono::Utc::now(),
                std::time::Duration::ZERO,
                Vec::new(),
            ),
        }
    }

    pub(crate) fn discovery(error: DiscoveryError) -> Self {
        Self::early(EngineError::Discovery(error))
    }
}
