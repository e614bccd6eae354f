use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::units::OutputKey;

/// Two factories claimed the same (type, qualifier) identity.
#[derive(Debug, Error)]
#[error("Output {}{} already registered; factory '{}' attempted to register it again", .type_name, .qualifier.as_ref().map(|q| format!(" ('{}')", q)).unwrap_or_default(), .factory)]
pub struct DuplicateOutputError {
    pub type_name: &'static str,
    pub qualifier: Option<String>,
    pub factory: String,
}

/// Store of produced singleton objects, keyed by type and optional
/// qualifier.
///
/// Populated monotonically by the executor during activation; there is no
/// public mutation API, so once activation hands the registry to the
/// consumer it is effectively frozen and safe to share for reads.
#[derive(Default)]
pub struct OutputRegistry {
    entries: HashMap<OutputKey, Arc<dyn Any + Send + Sync>>,
}

impl OutputRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a produced output. Re-registering an existing identity is
    /// fatal: singleton identity must be unique.
    pub(crate) fn register(
        &mut self,
        key: OutputKey,
        value: Arc<dyn Any + Send + Sync>,
        factory: &str,
    ) -> Result<(), DuplicateOutputError> {
        if self.entries.contains_key(&key) {
            return Err(DuplicateOutputError {
                type_name: key.type_name,
                qualifier: key.qualifier,
                factory: factory.to_string(),
            });
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Resolve an output by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&OutputKey::of::<T>())
            .and_then(|entry| entry.clone().downcast::<T>().ok())
    }

    /// Resolve an output by type and qualifier.
    pub fn get_named<T: Send + Sync + 'static>(&self, qualifier: &str) -> Option<Arc<T>> {
        self.entries
            .get(&OutputKey::named::<T>(qualifier))
            .and_then(|entry| entry.clone().downcast::<T>().ok())
    }

    /// Check whether an output matching the selector is registered.
    pub fn contains(&self, selector: &OutputKey) -> bool {
        self.entries.contains_key(selector)
    }

    pub fn contains_type<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.contains_key(&OutputKey::of::<T>())
    }

    /// Registered output identities, for reporting and diagnostics.
    pub fn keys(&self) -> impl Iterator<Item = &OutputKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRegistry")
            .field("outputs", &self.entries.len())
            .finish()
    }
}
