pub mod errors;
pub mod properties;
pub mod binder;
pub mod units;
pub mod conditions;
pub mod activation;
pub mod startup;

// Re-export key types for convenience (specific exports to avoid ambiguity)
pub use errors::{
    ActivationFailure, BindingError, DiscoveryError, DuplicateOutputError, EngineError,
    FactoryError, GraphError,
};
pub use properties::{PropertyLayer, PropertySourceStack, StandardRank};
pub use binder::{bind, BoundConfig, ConfigField, ConfigSchema, FieldKind, PropertyValue};
pub use units::{
    ConfigurationUnit, Factory, FactoryContext, OutputKey, OutputSelector, UnitCatalog,
    UnitDefinitionSource, UnitRegistry,
};
pub use conditions::Condition;
pub use activation::{Activation, ActivationReport, Activator, OutputRegistry, UnitState};
pub use startup::{Startup, StartupStats};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine information
pub const ENGINE_NAME: &str = "ignition";

/// Get engine version
pub fn version() -> &'static str {
    VERSION
}

/// Get engine name
pub fn name() -> &'static str {
    ENGINE_NAME
}
