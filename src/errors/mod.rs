pub mod core;

pub use self::core::{ActivationFailure, EngineError};

// Convenience re-exports of the per-subsystem error types.
pub use crate::activation::{DuplicateOutputError, GraphError};
pub use crate::binder::BindingError;
pub use crate::units::{DiscoveryError, FactoryError};
