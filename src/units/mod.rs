pub mod definition;
pub mod manifest;
pub mod registry;

pub use definition::{
    ConfigRequest, ConfigurationUnit, Factory, FactoryContext, FactoryError, OutputKey,
    OutputSelector,
};
pub use manifest::{parse_manifest, MANIFEST_KEY};
pub use registry::{DiscoveryError, UnitCatalog, UnitDefinitionSource, UnitRegistry};
