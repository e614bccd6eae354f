use std::collections::BTreeSet;

use crate::errors::EngineError;
use crate::properties::layer::{canonical_key, PropertyLayer};

/// An ordered sequence of property layers, highest precedence first.
///
/// Lookup returns the first layer (by precedence) defining the key; equal
/// ranks are resolved most-recently-added-first, so explicit override layers
/// can shadow an earlier layer of the same rank. Once frozen no further
/// layers can be added and the stack is safe to share read-only across
/// threads.
#[derive(Debug, Default)]
pub struct PropertySourceStack {
    layers: Vec<(u64, PropertyLayer)>,
    next_seq: u64,
    frozen: bool,
}

impl PropertySourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer. Fails once the stack has been frozen.
    pub fn add_layer(&mut self, layer: PropertyLayer) -> Result<(), EngineError> {
        if self.frozen {
            return Err(EngineError::FrozenSources {
                layer: layer.name().to_string(),
            });
        }

        tracing::debug!(
            layer = layer.name(),
            rank = layer.rank(),
            keys = layer.len(),
            "Registered property layer"
        );

        let seq = self.next_seq;
        self.next_seq += 1;
        self.layers.push((seq, layer));
        // Precedence order: rank descending, then most recently added first.
        self.layers
            .sort_by(|(sa, la), (sb, lb)| lb.rank().cmp(&la.rank()).then(sb.cmp(sa)));
        Ok(())
    }

    /// Mark the stack complete. Read-only concurrent use is permitted only
    /// after this point.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Resolve a key by precedence order, first match wins. The key may be
    /// given in any relaxed form (kebab, camel, upper-snake).
    pub fn resolve(&self, key: &str) -> Option<&str> {
        let canonical = canonical_key(key);
        self.layers
            .iter()
            .find_map(|(_, layer)| layer.get_canonical(&canonical))
    }

    /// Resolve a key together with the name of the defining layer.
    pub fn resolve_with_origin(&self, key: &str) -> Option<(&str, &str)> {
        let canonical = canonical_key(key);
        self.layers.iter().find_map(|(_, layer)| {
            layer
                .get_canonical(&canonical)
                .map(|value| (value, layer.name()))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    /// Union of relative keys below a namespace prefix across all layers,
    /// needed when binding nested structures and sequences.
    pub fn keys_under(&self, prefix: &str) -> BTreeSet<String> {
        let canonical = canonical_key(prefix);
        let mut out = BTreeSet::new();
        for (_, layer) in &self.layers {
            layer.collect_keys_under(&canonical, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, rank: i32, pairs: Vec<(&str, &str)>) -> PropertyLayer {
        PropertyLayer::new(name, rank, pairs)
    }

    #[test]
    fn highest_rank_wins_regardless_of_insertion_order() {
        let mut stack = PropertySourceStack::new();
        stack
            .add_layer(layer("env", 30, vec![("myshop.delivery.cargo-name", "DHL")]))
            .unwrap();
        stack
            .add_layer(layer("defaults", 0, vec![("myshop.delivery.cargo-name", "PPL")]))
            .unwrap();

        assert_eq!(stack.resolve("myshop.delivery.cargo-name"), Some("DHL"));

        let mut reversed = PropertySourceStack::new();
        reversed
            .add_layer(layer("defaults", 0, vec![("myshop.delivery.cargo-name", "PPL")]))
            .unwrap();
        reversed
            .add_layer(layer("env", 30, vec![("myshop.delivery.cargo-name", "DHL")]))
            .unwrap();

        assert_eq!(reversed.resolve("myshop.delivery.cargo-name"), Some("DHL"));
    }

    #[test]
    fn equal_rank_ties_resolve_to_most_recently_added() {
        let mut stack = PropertySourceStack::new();
        stack.add_layer(layer("base", 10, vec![("key", "base")])).unwrap();
        stack.add_layer(layer("override", 10, vec![("key", "override")])).unwrap();

        assert_eq!(stack.resolve("key"), Some("override"));
    }

    #[test]
    fn normalization_is_an_equivalence_across_query_forms() {
        let mut stack = PropertySourceStack::new();
        stack.add_layer(layer("app", 10, vec![("cargo-name", "DHL")])).unwrap();

        assert_eq!(stack.resolve("cargo-name"), Some("DHL"));
        assert_eq!(stack.resolve("cargoName"), Some("DHL"));
        assert_eq!(stack.resolve("CARGO_NAME"), Some("DHL"));
    }

    #[test]
    fn environment_variable_overrides_property_key() {
        let mut stack = PropertySourceStack::new();
        stack.add_layer(layer("app", 10, vec![("a.b-c", "file")])).unwrap();
        stack
            .add_layer(PropertyLayer::environment("env", 30, vec![("A_B_C", "env")]))
            .unwrap();

        assert_eq!(stack.resolve("a.b-c"), Some("env"));
        assert_eq!(stack.resolve("a.bC"), Some("env"));
    }

    #[test]
    fn missing_key_is_undefined() {
        let stack = PropertySourceStack::new();
        assert_eq!(stack.resolve("nope"), None);
        assert!(!stack.contains("nope"));
    }

    #[test]
    fn frozen_stack_rejects_new_layers() {
        let mut stack = PropertySourceStack::new();
        stack.add_layer(layer("app", 10, vec![("key", "v")])).unwrap();
        stack.freeze();

        let result = stack.add_layer(layer("late", 40, vec![("key", "w")]));
        assert!(matches!(result, Err(EngineError::FrozenSources { .. })));
        assert_eq!(stack.resolve("key"), Some("v"));
    }

    #[test]
    fn keys_under_unions_all_layers() {
        let mut stack = PropertySourceStack::new();
        stack
            .add_layer(layer("defaults", 0, vec![("myshop.delivery.retries", "3")]))
            .unwrap();
        stack
            .add_layer(layer("app", 10, vec![("myshop.delivery.cargo-name", "DHL")]))
            .unwrap();

        let keys = stack.keys_under("myshop.delivery");
        assert!(keys.contains("retries"));
        assert!(keys.contains("cargo-name"));
    }

    #[test]
    fn resolve_with_origin_names_the_defining_layer() {
        let mut stack = PropertySourceStack::new();
        stack.add_layer(layer("defaults", 0, vec![("key", "v")])).unwrap();

        assert_eq!(stack.resolve_with_origin("key"), Some(("v", "defaults")));
    }
}
