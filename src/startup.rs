use std::time::Instant;

use crate::activation::{Activation, Activator};
use crate::errors::ActivationFailure;
use crate::properties::{PropertyLayer, PropertySourceStack, StandardRank};
use crate::units::{UnitDefinitionSource, UnitRegistry};

/// Orchestrates a full startup run: unit discovery from manifests, unit
/// default collection, property stack freezing, and activation.
///
/// The property stack assembled here is frozen before activation; the
/// resulting [`Activation`] hands the frozen outputs and report to the
/// application assembler.
pub struct Startup {
    manifest_sources: Vec<String>,
    catalog: Option<Box<dyn UnitDefinitionSource>>,
    stack: PropertySourceStack,
}

impl Startup {
    pub fn new() -> Self {
        Self {
            manifest_sources: Vec::new(),
            catalog: None,
            stack: PropertySourceStack::new(),
        }
    }

    /// Add a manifest source; multiple sources merge in order.
    pub fn with_manifest(mut self, source: impl Into<String>) -> Self {
        self.manifest_sources.push(source.into());
        self
    }

    /// Provide the unit-definition lookup.
    pub fn with_units(mut self, catalog: impl UnitDefinitionSource + 'static) -> Self {
        self.catalog = Some(Box::new(catalog));
        self
    }

    /// Add a property layer assembled by the caller (files, overrides, ...).
    pub fn with_property_layer(mut self, layer: PropertyLayer) -> Result<Self, ActivationFailure> {
        // The stack is only frozen inside run(), so this cannot fail here;
        // keep the Result so misuse surfaces instead of panicking.
        self.stack.add_layer(layer).map_err(ActivationFailure::early)?;
        Ok(self)
    }

    /// Add a snapshot of the process environment as the highest-precedence
    /// layer.
    pub fn with_environment(self) -> Result<Self, ActivationFailure> {
        self.with_property_layer(crate::properties::environment_layer())
    }

    /// Discover, order, and activate. Returns the frozen outputs, the
    /// report, and phase timings.
    pub fn run(mut self) -> Result<(Activation, StartupStats), ActivationFailure> {
        let total_start = Instant::now();
        let mut stats = StartupStats::default();

        tracing::info!(manifests = self.manifest_sources.len(), "Starting engine");

        let discovery_start = Instant::now();
        let sources: Vec<&str> = self.manifest_sources.iter().map(String::as_str).collect();
        let catalog = self.catalog.take();
        let registry = match &catalog {
            Some(catalog) => UnitRegistry::discover(&sources, catalog.as_ref())
                .map_err(ActivationFailure::discovery)?,
            None => UnitRegistry::discover(&sources, &EmptyCatalog)
                .map_err(ActivationFailure::discovery)?,
        };
        stats.discovery_time = discovery_start.elapsed();

        let units = registry.into_units();
        stats.unit_count = units.len();

        // Built-in unit defaults form the lowest-precedence layer.
        let defaults: Vec<(String, String)> = units
            .iter()
            .flat_map(|u| u.defaults().iter().cloned())
            .collect();
        if !defaults.is_empty() {
            self = self.with_property_layer(PropertyLayer::new(
                "unit-defaults",
                StandardRank::UnitDefaults.value(),
                defaults,
            ))?;
        }
        self.stack.freeze();

        let activation_start = Instant::now();
        let activation = Activator::new(units).activate(&self.stack)?;
        stats.activation_time = activation_start.elapsed();
        stats.total_time = total_start.elapsed();

        tracing::info!(
            units = stats.unit_count,
            total = ?stats.total_time,
            "Startup completed"
        );

        Ok((activation, stats))
    }
}

impl Default for Startup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Startup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Startup")
            .field("manifest_sources", &self.manifest_sources.len())
            .field("layers", &self.stack.layer_count())
            .finish()
    }
}

struct EmptyCatalog;

impl UnitDefinitionSource for EmptyCatalog {
    fn lookup(&self, _id: &str) -> Option<crate::units::ConfigurationUnit> {
        None
    }
}

/// Phase timings for a startup run
#[derive(Debug, Clone, Default)]
pub struct StartupStats {
    pub unit_count: usize,
    pub discovery_time: std::time::Duration,
    pub activation_time: std::time::Duration,
    pub total_time: std::time::Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{ConfigField, ConfigSchema, FieldKind};
    use crate::units::{ConfigurationUnit, Factory, UnitCatalog};

    #[derive(Debug)]
    struct Greeting {
        text: String,
    }

    fn catalog() -> UnitCatalog {
        UnitCatalog::new().with("greeter", || {
            let schema = ConfigSchema::new()
                .field(ConfigField::new("text", FieldKind::String).with_default("hello"));
            ConfigurationUnit::new("greeter")
                .with_properties("app.greeting", schema)
                .with_default("app.greeting.text", "hello from defaults")
                .with_factory(Factory::new::<Greeting, _>("greeting", |ctx| {
                    Ok(Greeting {
                        text: ctx.config()?.get_str("text").unwrap_or_default().to_string(),
                    })
                }))
        })
    }

    #[test]
    fn startup_runs_discovery_and_activation() {
        let (activation, stats) = Startup::new()
            .with_manifest("ignition.units = greeter")
            .with_units(catalog())
            .run()
            .unwrap();

        assert_eq!(stats.unit_count, 1);
        let greeting = activation.outputs.get::<Greeting>().unwrap();
        assert_eq!(greeting.text, "hello from defaults");
    }

    #[test]
    fn caller_layers_override_unit_defaults() {
        let (activation, _) = Startup::new()
            .with_manifest("ignition.units = greeter")
            .with_units(catalog())
            .with_property_layer(PropertyLayer::new(
                "application",
                StandardRank::Application.value(),
                vec![("app.greeting.text", "hello from file")],
            ))
            .unwrap()
            .run()
            .unwrap();

        let greeting = activation.outputs.get::<Greeting>().unwrap();
        assert_eq!(greeting.text, "hello from file");
    }

    #[test]
    fn unknown_manifest_unit_surfaces_discovery_failure() {
        let failure = Startup::new()
            .with_manifest("ignition.units = ghost")
            .with_units(UnitCatalog::new())
            .run()
            .unwrap_err();

        assert!(failure.error.is_discovery());
    }
}
