use std::path::Path;

use crate::errors::EngineError;
use crate::properties::layer::PropertyLayer;
use crate::properties::stack::PropertySourceStack;

/// Fixed precedence ranks for the standard property stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StandardRank {
    /// Built-in defaults bundled with each configuration unit.
    UnitDefaults,
    /// Base application file.
    Application,
    /// Profile-specific application file.
    Profile,
    /// Process environment, highest precedence.
    Environment,
}

impl StandardRank {
    pub fn value(self) -> i32 {
        match self {
            StandardRank::UnitDefaults => 0,
            StandardRank::Application => 10,
            StandardRank::Profile => 20,
            StandardRank::Environment => 30,
        }
    }
}

/// Load a structured property document into a standard layer.
///
/// YAML (`.yaml`/`.yml`) and JSON (`.json`) documents are supported; nested
/// mappings flatten into dotted keys and sequences into indexed keys
/// (`zones.0`). Null values are treated as absent.
pub fn file_layer(
    name: impl Into<String>,
    rank: StandardRank,
    path: &Path,
) -> Result<PropertyLayer, EngineError> {
    let text = std::fs::read_to_string(path)?;
    let pairs = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let doc: serde_json::Value = serde_json::from_str(&text)?;
            flatten_json(&doc)
        }
        _ => {
            let doc: serde_yaml::Value = serde_yaml::from_str(&text)?;
            flatten_yaml(&doc)
        }
    };
    Ok(PropertyLayer::new(name, rank.value(), pairs))
}

/// Snapshot the process environment into an environment layer.
pub fn environment_layer() -> PropertyLayer {
    PropertyLayer::environment(
        "environment",
        StandardRank::Environment.value(),
        std::env::vars(),
    )
}

/// Assemble the standard stack from a configuration directory: base
/// application file, then the profile-specific file, then the process
/// environment. Unit defaults are contributed later by the units themselves,
/// and the caller freezes the stack once assembly is complete.
pub fn load_standard_stack(
    dir: &Path,
    profile: Option<&str>,
) -> Result<PropertySourceStack, EngineError> {
    let mut stack = PropertySourceStack::new();

    if let Some(path) = find_document(dir, "application") {
        stack.add_layer(file_layer("application", StandardRank::Application, &path)?)?;
    }

    if let Some(profile) = profile {
        let base = format!("application-{}", profile);
        if let Some(path) = find_document(dir, &base) {
            stack.add_layer(file_layer(base, StandardRank::Profile, &path)?)?;
        }
    }

    stack.add_layer(environment_layer())?;

    tracing::info!(
        layers = stack.layer_count(),
        profile = profile.unwrap_or("<none>"),
        "Assembled standard property stack"
    );

    Ok(stack)
}

fn find_document(dir: &Path, base: &str) -> Option<std::path::PathBuf> {
    ["yaml", "yml", "json"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", base, ext)))
        .find(|p| p.is_file())
}

/// Flatten a YAML document into dotted key/value pairs.
pub fn flatten_yaml(doc: &serde_yaml::Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_yaml_into(doc, "", &mut out);
    out
}

fn flatten_yaml_into(value: &serde_yaml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        serde_yaml::Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        serde_yaml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        serde_yaml::Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_yaml_into(item, &join(prefix, &i.to_string()), out);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    flatten_yaml_into(v, &join(prefix, key), out);
                }
            }
        }
        serde_yaml::Value::Tagged(tagged) => flatten_yaml_into(&tagged.value, prefix, out),
    }
}

/// Flatten a JSON document into dotted key/value pairs.
pub fn flatten_json(doc: &serde_json::Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_json_into(doc, "", &mut out);
    out
}

fn flatten_json_into(value: &serde_json::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        serde_json::Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_json_into(item, &join(prefix, &i.to_string()), out);
            }
        }
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                flatten_json_into(v, &join(prefix, k), out);
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn flatten_yaml_nests_and_indexes() {
        let doc: serde_yaml::Value = serde_yaml::from_str(
            r#"
myshop:
  delivery:
    cargo-name: DHL
    retries: 3
    zones:
      - east
      - west
  metrics:
    enabled: true
    ignored: null
"#,
        )
        .unwrap();

        let pairs: HashMap<String, String> = flatten_yaml(&doc).into_iter().collect();
        assert_eq!(pairs.get("myshop.delivery.cargo-name").map(String::as_str), Some("DHL"));
        assert_eq!(pairs.get("myshop.delivery.retries").map(String::as_str), Some("3"));
        assert_eq!(pairs.get("myshop.delivery.zones.0").map(String::as_str), Some("east"));
        assert_eq!(pairs.get("myshop.delivery.zones.1").map(String::as_str), Some("west"));
        assert_eq!(pairs.get("myshop.metrics.enabled").map(String::as_str), Some("true"));
        assert!(!pairs.contains_key("myshop.metrics.ignored"));
    }

    #[test]
    fn flatten_json_matches_yaml_shape() {
        let doc: serde_json::Value =
            serde_json::from_str(r#"{"a": {"b": [1, 2], "c": false}}"#).unwrap();
        let pairs: HashMap<String, String> = flatten_json(&doc).into_iter().collect();
        assert_eq!(pairs.get("a.b.0").map(String::as_str), Some("1"));
        assert_eq!(pairs.get("a.c").map(String::as_str), Some("false"));
    }

    #[test]
    fn file_layer_reads_yaml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "myshop:\n  delivery:\n    cargo-name: DHL").unwrap();

        let layer = file_layer("application", StandardRank::Application, &path).unwrap();
        assert_eq!(layer.rank(), 10);
        assert_eq!(layer.get_canonical("myshop.delivery.cargo-name"), Some("DHL"));
    }

    #[test]
    fn standard_stack_prefers_profile_over_application() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("application.yaml"),
            "loader-test:\n  mode: base\n  only-base: x\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("application-prod.yaml"),
            "loader-test:\n  mode: prod\n",
        )
        .unwrap();

        let stack = load_standard_stack(dir.path(), Some("prod")).unwrap();
        assert_eq!(stack.resolve("loader-test.mode"), Some("prod"));
        assert_eq!(stack.resolve("loader-test.only-base"), Some("x"));
    }

    #[test]
    #[serial]
    fn environment_layer_overrides_files() {
        std::env::set_var("IGNITION_LOADER_TEST_KEY", "from-env");

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("application.yaml"),
            "ignition-loader-test-key: from-file\n",
        )
        .unwrap();

        let stack = load_standard_stack(dir.path(), None).unwrap();
        assert_eq!(stack.resolve("ignition-loader-test-key"), Some("from-env"));

        std::env::remove_var("IGNITION_LOADER_TEST_KEY");
    }
}
