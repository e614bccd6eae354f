use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::binder::bind::BindingError;
use crate::properties::canonical_key;

/// A typed property value materialized by the binder.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Duration(Duration),
    List(Vec<PropertyValue>),
    Struct(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            PropertyValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert into a JSON value for the serde bridge. Durations become
    /// whole milliseconds.
    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
            PropertyValue::Integer(i) => serde_json::Value::Number((*i).into()),
            PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropertyValue::Boolean(b) => serde_json::Value::Bool(*b),
            PropertyValue::Duration(d) => {
                serde_json::Value::Number((d.as_millis() as u64).into())
            }
            PropertyValue::List(items) => {
                serde_json::Value::Array(items.iter().map(PropertyValue::to_json).collect())
            }
            PropertyValue::Struct(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// A typed structure populated from layered properties under a namespace
/// prefix. Immutable once bound.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundConfig {
    prefix: String,
    root: BTreeMap<String, PropertyValue>,
}

impl BoundConfig {
    pub(crate) fn new(prefix: String, root: BTreeMap<String, PropertyValue>) -> Self {
        Self { prefix, root }
    }

    /// The namespace prefix this configuration was bound from.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Walk a dot-separated relative path (any relaxed key form) to a value.
    pub fn get(&self, path: &str) -> Option<&PropertyValue> {
        let canonical = canonical_key(path);
        let mut segments = canonical.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            match current {
                PropertyValue::Struct(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(PropertyValue::as_str)
    }

    pub fn get_integer(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(PropertyValue::as_integer)
    }

    pub fn get_boolean(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(PropertyValue::as_boolean)
    }

    pub fn get_duration(&self, path: &str) -> Option<Duration> {
        self.get(path).and_then(PropertyValue::as_duration)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Deserialize the bound tree into a user structure through serde.
    /// Field keys are canonical kebab-case, so target structs typically
    /// carry `#[serde(rename_all = "kebab-case")]`. Durations arrive as
    /// whole milliseconds.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, BindingError> {
        let json = PropertyValue::Struct(self.root.clone()).to_json();
        serde_json::from_value(json).map_err(|e| BindingError::StructureMismatch {
            prefix: self.prefix.clone(),
            message: e.to_string(),
        })
    }
}
