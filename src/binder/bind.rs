use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::binder::schema::{ConfigField, ConfigSchema, FieldKind};
use crate::binder::value::{BoundConfig, PropertyValue};
use crate::properties::{canonical_key, PropertySourceStack};

/// Binding error type
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Missing required property '{}'{}", .key, .hint.as_ref().map(|h| format!(" ({})", h)).unwrap_or_default())]
    MissingProperty { key: String, hint: Option<String> },

    #[error("Cannot coerce property '{key}' value '{value}' into {expected}")]
    CoercionFailed {
        key: String,
        expected: &'static str,
        value: String,
    },

    #[error("Bound configuration under '{prefix}' does not match the target structure: {message}")]
    StructureMismatch { prefix: String, message: String },
}

impl BindingError {
    /// Create a missing required property error
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingProperty {
            key: key.into(),
            hint: None,
        }
    }

    /// Create a coercion failure error
    pub fn coercion(
        key: impl Into<String>,
        expected: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::CoercionFailed {
            key: key.into(),
            expected,
            value: value.into(),
        }
    }
}

/// Bind a namespaced slice of the property stack into a typed structure.
///
/// For each schema field the fully-qualified key is `prefix + "." + name`,
/// resolved through the stack's precedence order and coerced to the declared
/// kind. Unknown keys under the prefix are ignored. Binding is pure: the
/// stack is never mutated, and binding twice from an unchanged stack yields
/// structurally equal results.
pub fn bind(
    prefix: &str,
    stack: &PropertySourceStack,
    schema: &ConfigSchema,
) -> Result<BoundConfig, BindingError> {
    let canonical_prefix = canonical_key(prefix);
    let root = bind_fields(&canonical_prefix, stack, schema)?;
    Ok(BoundConfig::new(canonical_prefix, root))
}

fn bind_fields(
    prefix: &str,
    stack: &PropertySourceStack,
    schema: &ConfigSchema,
) -> Result<BTreeMap<String, PropertyValue>, BindingError> {
    let mut out = BTreeMap::new();
    for field in &schema.fields {
        let key = format!("{}.{}", prefix, field.name);
        if let Some(value) = bind_field(&key, stack, field)? {
            out.insert(field.name.clone(), value);
        }
    }
    Ok(out)
}

fn bind_field(
    key: &str,
    stack: &PropertySourceStack,
    field: &ConfigField,
) -> Result<Option<PropertyValue>, BindingError> {
    match &field.kind {
        FieldKind::Nested(schema) => {
            let nested = bind_fields(key, stack, schema)?;
            if nested.is_empty() && stack.keys_under(key).is_empty() {
                if field.required {
                    return Err(BindingError::MissingProperty {
                        key: key.to_string(),
                        hint: field.description.clone(),
                    });
                }
                return Ok(None);
            }
            Ok(Some(PropertyValue::Struct(nested)))
        }
        FieldKind::List(element) => {
            let items = bind_list(key, stack, element)?;
            match items {
                Some(items) => Ok(Some(PropertyValue::List(items))),
                None => {
                    if let Some(default) = &field.default {
                        let items = split_scalar_list(key, default, element)?;
                        return Ok(Some(PropertyValue::List(items)));
                    }
                    if field.required {
                        return Err(BindingError::MissingProperty {
                            key: key.to_string(),
                            hint: field.description.clone(),
                        });
                    }
                    Ok(None)
                }
            }
        }
        kind => {
            let raw = stack.resolve(key).map(str::to_string).or_else(|| field.default.clone());
            match raw {
                Some(raw) => Ok(Some(coerce(key, kind, &raw)?)),
                None if field.required => Err(BindingError::MissingProperty {
                    key: key.to_string(),
                    hint: field.description.clone(),
                }),
                None => Ok(None),
            }
        }
    }
}

/// Bind a sequence field from indexed keys (`key.0`, `key.1`, ...) or, for
/// scalar elements, from a single comma-separated value.
fn bind_list(
    key: &str,
    stack: &PropertySourceStack,
    element: &FieldKind,
) -> Result<Option<Vec<PropertyValue>>, BindingError> {
    let mut indices: Vec<usize> = stack
        .keys_under(key)
        .iter()
        .filter_map(|rel| rel.split('.').next())
        .filter_map(|first| first.parse::<usize>().ok())
        .collect();
    indices.sort_unstable();
    indices.dedup();

    if !indices.is_empty() {
        let mut items = Vec::with_capacity(indices.len());
        for index in indices {
            let item_key = format!("{}.{}", key, index);
            match element {
                FieldKind::Nested(schema) => {
                    items.push(PropertyValue::Struct(bind_fields(&item_key, stack, schema)?));
                }
                kind => {
                    let raw = stack
                        .resolve(&item_key)
                        .ok_or_else(|| BindingError::missing(&item_key))?;
                    items.push(coerce(&item_key, kind, raw)?);
                }
            }
        }
        return Ok(Some(items));
    }

    if let Some(raw) = stack.resolve(key) {
        return Ok(Some(split_scalar_list(key, raw, element)?));
    }

    Ok(None)
}

fn split_scalar_list(
    key: &str,
    raw: &str,
    element: &FieldKind,
) -> Result<Vec<PropertyValue>, BindingError> {
    if matches!(element, FieldKind::Nested(_) | FieldKind::List(_)) {
        return Err(BindingError::coercion(key, element.describe(), raw));
    }
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| coerce(key, element, part))
        .collect()
}

fn coerce(key: &str, kind: &FieldKind, raw: &str) -> Result<PropertyValue, BindingError> {
    let trimmed = raw.trim();
    match kind {
        FieldKind::String => Ok(PropertyValue::String(raw.to_string())),
        FieldKind::Integer => trimmed
            .parse::<i64>()
            .map(PropertyValue::Integer)
            .map_err(|_| BindingError::coercion(key, "integer", raw)),
        FieldKind::Float => trimmed
            .parse::<f64>()
            .map(PropertyValue::Float)
            .map_err(|_| BindingError::coercion(key, "float", raw)),
        FieldKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(PropertyValue::Boolean(true)),
            "false" | "no" | "off" | "0" => Ok(PropertyValue::Boolean(false)),
            _ => Err(BindingError::coercion(key, "boolean", raw)),
        },
        FieldKind::Duration => parse_duration(trimmed)
            .map(PropertyValue::Duration)
            .ok_or_else(|| BindingError::coercion(key, "duration", raw)),
        FieldKind::List(_) | FieldKind::Nested(_) => {
            Err(BindingError::coercion(key, kind.describe(), raw))
        }
    }
}

/// Parse `100ms`, `10s`, `5m`, `2h` or a bare integer (milliseconds).
fn parse_duration(raw: &str) -> Option<Duration> {
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => raw.split_at(pos),
        None => (raw, "ms"),
    };
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount * 60)),
        "h" => Some(Duration::from_secs(amount * 3600)),
        _ => None,
    }
}
