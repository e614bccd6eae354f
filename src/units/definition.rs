use std::any::{Any, TypeId};
use std::sync::Arc;

use thiserror::Error;

use crate::activation::OutputRegistry;
use crate::binder::{BoundConfig, ConfigSchema};
use crate::conditions::Condition;

/// Output identifier combining type and optional qualifier name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub qualifier: Option<String>,
}

impl OutputKey {
    /// Create an output key for a type
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: None,
        }
    }

    /// Create a qualified output key for a type
    pub fn named<T: 'static + ?Sized>(qualifier: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: Some(qualifier.into()),
        }
    }

    /// Short display form for logs and error messages.
    pub fn describe(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{} ('{}')", self.type_name, q),
            None => self.type_name.to_string(),
        }
    }
}

/// Selector used by conditions and factory inputs to reference an output.
pub type OutputSelector = OutputKey;

/// Factory error type
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Construction failed in factory '{factory}': {message}")]
    ConstructionFailed { factory: String, message: String },

    #[error("Unresolved input {input} for factory '{factory}'")]
    UnresolvedInput { factory: String, input: String },

    #[error("Factory '{factory}' requested no configuration")]
    NoConfigRequested { factory: String },
}

impl FactoryError {
    /// Create a construction failure error
    pub fn failed(factory: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstructionFailed {
            factory: factory.into(),
            message: message.into(),
        }
    }
}

/// A configuration-binding request: namespace prefix plus declared schema.
#[derive(Debug, Clone)]
pub struct ConfigRequest {
    pub prefix: String,
    pub schema: ConfigSchema,
}

/// Resolution context handed to a factory while it executes.
///
/// Outputs are resolved from the registry as it stands mid-activation;
/// earlier factories of the same unit are already registered.
pub struct FactoryContext<'a> {
    factory: &'a str,
    outputs: &'a OutputRegistry,
    unit_config: Option<&'a BoundConfig>,
    factory_config: Option<&'a BoundConfig>,
}

impl<'a> FactoryContext<'a> {
    pub(crate) fn new(
        factory: &'a str,
        outputs: &'a OutputRegistry,
        unit_config: Option<&'a BoundConfig>,
        factory_config: Option<&'a BoundConfig>,
    ) -> Self {
        Self {
            factory,
            outputs,
            unit_config,
            factory_config,
        }
    }

    /// Resolve a required input by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, FactoryError> {
        self.outputs
            .get::<T>()
            .ok_or_else(|| FactoryError::UnresolvedInput {
                factory: self.factory.to_string(),
                input: OutputKey::of::<T>().describe(),
            })
    }

    /// Resolve a required input by type and qualifier.
    pub fn get_named<T: Send + Sync + 'static>(
        &self,
        qualifier: &str,
    ) -> Result<Arc<T>, FactoryError> {
        self.outputs
            .get_named::<T>(qualifier)
            .ok_or_else(|| FactoryError::UnresolvedInput {
                factory: self.factory.to_string(),
                input: OutputKey::named::<T>(qualifier).describe(),
            })
    }

    /// Resolve an optional input by type.
    pub fn try_get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.outputs.get::<T>()
    }

    /// The bound configuration requested by this factory, falling back to
    /// the owning unit's configuration.
    pub fn config(&self) -> Result<&BoundConfig, FactoryError> {
        self.factory_config
            .or(self.unit_config)
            .ok_or_else(|| FactoryError::NoConfigRequested {
                factory: self.factory.to_string(),
            })
    }
}

type ProduceFn =
    Box<dyn Fn(&FactoryContext<'_>) -> Result<Arc<dyn Any + Send + Sync>, FactoryError> + Send + Sync>;

/// A named production rule: declares its typed inputs and produces exactly
/// one output object. Executes at most once per process run.
pub struct Factory {
    name: String,
    output: OutputKey,
    inputs: Vec<OutputKey>,
    config_request: Option<ConfigRequest>,
    produce: ProduceFn,
}

impl Factory {
    /// Create a factory producing an output of type `T`.
    pub fn new<T, F>(name: impl Into<String>, produce: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&FactoryContext<'_>) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            output: OutputKey::of::<T>(),
            inputs: Vec::new(),
            config_request: None,
            produce: Box::new(move |ctx| {
                produce(ctx).map(|value| Arc::new(value) as Arc<dyn Any + Send + Sync>)
            }),
        }
    }

    /// Qualify the produced output so several outputs of one type can
    /// coexist in the registry.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.output.qualifier = Some(qualifier.into());
        self
    }

    /// Declare a required input resolved by type.
    pub fn requires<D: Send + Sync + 'static>(mut self) -> Self {
        self.inputs.push(OutputKey::of::<D>());
        self
    }

    /// Declare a required input resolved by type and qualifier.
    pub fn requires_named<D: Send + Sync + 'static>(mut self, qualifier: impl Into<String>) -> Self {
        self.inputs.push(OutputKey::named::<D>(qualifier));
        self
    }

    /// Declare a configuration binding for this factory.
    pub fn with_config(mut self, prefix: impl Into<String>, schema: ConfigSchema) -> Self {
        self.config_request = Some(ConfigRequest {
            prefix: prefix.into(),
            schema,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &OutputKey {
        &self.output
    }

    pub fn inputs(&self) -> &[OutputKey] {
        &self.inputs
    }

    pub fn config_request(&self) -> Option<&ConfigRequest> {
        self.config_request.as_ref()
    }

    pub(crate) fn produce(
        &self,
        ctx: &FactoryContext<'_>,
    ) -> Result<Arc<dyn Any + Send + Sync>, FactoryError> {
        (self.produce)(ctx)
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("name", &self.name)
            .field("output", &self.output)
            .field("inputs", &self.inputs)
            .field("config_request", &self.config_request)
            .finish()
    }
}

/// A named, conditionally-activated bundle of factories plus import and
/// ordering metadata.
pub struct ConfigurationUnit {
    name: String,
    imports: Vec<String>,
    conditions: Vec<Condition>,
    factories: Vec<Factory>,
    properties: Option<ConfigRequest>,
    defaults: Vec<(String, String)>,
}

impl ConfigurationUnit {
    /// Create a new configuration unit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            imports: Vec::new(),
            conditions: Vec::new(),
            factories: Vec::new(),
            properties: None,
            defaults: Vec::new(),
        }
    }

    /// Import another unit; imported units activate first.
    pub fn with_import(mut self, unit: impl Into<String>) -> Self {
        self.imports.push(unit.into());
        self
    }

    /// Guard activation behind a condition. Several conditions combine as
    /// all-of.
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a factory, executed in declaration order.
    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Declare the unit's configuration namespace and schema, bound once and
    /// shared by all its factories.
    pub fn with_properties(mut self, prefix: impl Into<String>, schema: ConfigSchema) -> Self {
        self.properties = Some(ConfigRequest {
            prefix: prefix.into(),
            schema,
        });
        self
    }

    /// Bundle a built-in default property (absolute key) with this unit.
    /// Defaults form the lowest-precedence layer of the property stack.
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn factories(&self) -> &[Factory] {
        &self.factories
    }

    pub fn properties(&self) -> Option<&ConfigRequest> {
        self.properties.as_ref()
    }

    pub fn defaults(&self) -> &[(String, String)] {
        &self.defaults
    }
}

impl std::fmt::Debug for ConfigurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationUnit")
            .field("name", &self.name)
            .field("imports", &self.imports)
            .field("conditions", &self.conditions.len())
            .field("factories", &self.factories)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{ConfigField, FieldKind};

    #[derive(Debug)]
    struct CargoService {
        #[allow(dead_code)]
        carrier: String,
    }

    #[test]
    fn output_keys_distinguish_qualifiers() {
        let plain = OutputKey::of::<CargoService>();
        let named = OutputKey::named::<CargoService>("express");
        assert_ne!(plain, named);
        assert_eq!(plain.type_id, named.type_id);
        assert!(named.describe().contains("express"));
    }

    #[test]
    fn factory_builder_declares_inputs_and_config() {
        let schema = ConfigSchema::new().field(ConfigField::new("cargo-name", FieldKind::String));
        let factory = Factory::new::<CargoService, _>("cargo_service", |_ctx| {
            Ok(CargoService { carrier: "DHL".into() })
        })
        .requires::<String>()
        .requires_named::<i64>("retries")
        .with_config("myshop.delivery", schema);

        assert_eq!(factory.name(), "cargo_service");
        assert_eq!(factory.inputs().len(), 2);
        assert_eq!(factory.inputs()[1].qualifier.as_deref(), Some("retries"));
        assert!(factory.config_request().is_some());
        assert_eq!(factory.output().type_id, TypeId::of::<CargoService>());
    }

    #[test]
    fn unit_builder_accumulates_metadata() {
        let unit = ConfigurationUnit::new("delivery")
            .with_import("core")
            .when(Condition::property_present("myshop.delivery.cargo-name"))
            .with_default("myshop.delivery.cargo-name", "PPL")
            .with_factory(Factory::new::<CargoService, _>("cargo_service", |_| {
                Ok(CargoService { carrier: "PPL".into() })
            }));

        assert_eq!(unit.name(), "delivery");
        assert_eq!(unit.imports(), ["core".to_string()]);
        assert_eq!(unit.conditions().len(), 1);
        assert_eq!(unit.factories().len(), 1);
        assert_eq!(unit.defaults().len(), 1);
    }
}
