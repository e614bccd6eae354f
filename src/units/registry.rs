use std::collections::{HashSet, VecDeque};

use thiserror::Error;

use crate::units::definition::ConfigurationUnit;
use crate::units::manifest::parse_manifest;

/// Discovery error type
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Unknown configuration unit '{id}' listed in manifest")]
    UnknownUnit { id: String },

    #[error("Unit '{unit}' imports unresolvable unit '{import}'")]
    MissingImport { unit: String, import: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },
}

/// Pluggable lookup resolving a unit identifier to its declared body.
pub trait UnitDefinitionSource {
    fn lookup(&self, id: &str) -> Option<ConfigurationUnit>;
}

type DefinitionFn = Box<dyn Fn() -> ConfigurationUnit + Send + Sync>;

/// Catalog of unit definitions keyed by identifier. Definitions are stored
/// as constructor functions so every discovery run gets a fresh unit body.
#[derive(Default)]
pub struct UnitCatalog {
    definitions: Vec<(String, DefinitionFn)>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit definition under an identifier
    pub fn register<F>(&mut self, id: impl Into<String>, definition: F)
    where
        F: Fn() -> ConfigurationUnit + Send + Sync + 'static,
    {
        self.definitions.push((id.into(), Box::new(definition)));
    }

    /// Builder-style registration
    pub fn with<F>(mut self, id: impl Into<String>, definition: F) -> Self
    where
        F: Fn() -> ConfigurationUnit + Send + Sync + 'static,
    {
        self.register(id, definition);
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl UnitDefinitionSource for UnitCatalog {
    fn lookup(&self, id: &str) -> Option<ConfigurationUnit> {
        self.definitions
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, definition)| definition())
    }
}

impl std::fmt::Debug for UnitCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitCatalog")
            .field("definitions", &self.definitions.len())
            .finish()
    }
}

/// Discovered configuration units in activation-candidate order.
#[derive(Debug)]
pub struct UnitRegistry {
    units: Vec<ConfigurationUnit>,
}

impl UnitRegistry {
    /// Discover declared units from manifest sources.
    ///
    /// Order is the manifests' declaration order; duplicate identifiers
    /// collapse to the first-seen definition. Imports naming units outside
    /// the manifest are resolved through the lookup transitively and
    /// appended; an unresolvable import fails discovery, because a dangling
    /// import makes activation ordering impossible.
    pub fn discover(
        manifest_sources: &[&str],
        lookup: &dyn UnitDefinitionSource,
    ) -> Result<Self, DiscoveryError> {
        let mut ids = Vec::new();
        for source in manifest_sources {
            ids.extend(parse_manifest(source)?);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut units: Vec<ConfigurationUnit> = Vec::new();

        for id in ids {
            if !seen.insert(id.clone()) {
                tracing::warn!(unit = %id, "Duplicate unit declaration ignored (first-seen wins)");
                continue;
            }
            let unit = lookup
                .lookup(&id)
                .ok_or_else(|| DiscoveryError::UnknownUnit { id: id.clone() })?;
            tracing::debug!(unit = %id, imports = ?unit.imports(), "Discovered configuration unit");
            units.push(unit);
        }

        // Pull in units referenced only through imports.
        let mut queue: VecDeque<(String, String)> = units
            .iter()
            .flat_map(|u| {
                u.imports()
                    .iter()
                    .map(|i| (u.name().to_string(), i.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        while let Some((importer, import)) = queue.pop_front() {
            if seen.contains(&import) {
                continue;
            }
            let unit = lookup
                .lookup(&import)
                .ok_or_else(|| DiscoveryError::MissingImport {
                    unit: importer,
                    import: import.clone(),
                })?;
            tracing::debug!(unit = %import, "Discovered configuration unit via import");
            for transitive in unit.imports() {
                queue.push_back((import.clone(), transitive.clone()));
            }
            seen.insert(import);
            units.push(unit);
        }

        tracing::info!(count = units.len(), "Unit discovery complete");

        Ok(Self { units })
    }

    pub fn units(&self) -> &[ConfigurationUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<ConfigurationUnit> {
        self.units
    }

    pub fn get(&self, name: &str) -> Option<&ConfigurationUnit> {
        self.units.iter().find(|u| u.name() == name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
