use crate::properties::canonical_key;

/// Declared kind of a configuration field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Duration,
    /// Homogeneous sequence of the given element kind.
    List(Box<FieldKind>),
    /// Nested structure bound under the field's sub-prefix.
    Nested(ConfigSchema),
}

impl FieldKind {
    /// Human-readable name used in coercion error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Duration => "duration",
            FieldKind::List(_) => "list",
            FieldKind::Nested(_) => "structure",
        }
    }
}

/// Configuration field definition.
///
/// Field names are canonicalized at construction, so schemas may declare
/// `cargoName` and still bind `cargo-name` keys.
#[derive(Debug, Clone)]
pub struct ConfigField {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<String>,
    pub description: Option<String>,
}

impl ConfigField {
    /// Create a new configuration field
    pub fn new(name: impl AsRef<str>, kind: FieldKind) -> Self {
        Self {
            name: canonical_key(name.as_ref()),
            kind,
            required: false,
            default: None,
            description: None,
        }
    }

    /// Make field required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set default value (raw form, coerced like any resolved value)
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set description, surfaced as a hint in missing-property errors
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Explicit schema for a bound configuration structure.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    pub fields: Vec<ConfigField>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to this schema
    pub fn field(mut self, field: ConfigField) -> Self {
        self.fields.push(field);
        self
    }

    /// Get field by canonical name
    pub fn get(&self, name: &str) -> Option<&ConfigField> {
        let canonical = canonical_key(name);
        self.fields.iter().find(|f| f.name == canonical)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_builder_collects_fields() {
        let schema = ConfigSchema::new()
            .field(ConfigField::new("cargo-name", FieldKind::String).required())
            .field(ConfigField::new("retries", FieldKind::Integer).with_default("3"));

        assert_eq!(schema.len(), 2);
        assert!(schema.get("cargo-name").is_some());
        assert!(schema.get("cargoName").is_some());
        assert_eq!(schema.get("retries").and_then(|f| f.default.as_deref()), Some("3"));
    }

    #[test]
    fn field_names_are_canonicalized() {
        let field = ConfigField::new("cargoName", FieldKind::String);
        assert_eq!(field.name, "cargo-name");
    }
}
