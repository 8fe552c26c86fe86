//! Runtime values produced while evaluating definitions and bindings.

use crate::element::ArtifactElement;
use crate::selection::FieldSelection;
use serde::{Deserialize, Serialize};

/// A materialized value.
///
/// Bindings evaluate to plain data, `gql.field` calls to a [`FieldSelection`],
/// and definition calls to an [`ArtifactElement`]. Values are cached per file
/// so that re-evaluated files can read the values of unchanged dependencies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
    /// `null`
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// An array.
    Array(Vec<Value>),
    /// An object with properties in insertion order.
    Object(Vec<(String, Value)>),
    /// A single field selection from `gql.field`.
    Field(FieldSelection),
    /// A built definition.
    Element(Box<ArtifactElement>),
}

impl Value {
    /// A short name for the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Field(_) => "field",
            Value::Element(element) => element.kind().as_str(),
        }
    }

    /// Returns the string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up an object property. Later properties shadow earlier ones.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(entries) => entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Converts a JSON document, e.g. an injected module, into a value.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<ArtifactElement> for Value {
    fn from(element: ArtifactElement) -> Self {
        Value::Element(Box::new(element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::SelectionPrebuild;

    #[test]
    fn json_conversion() {
        let json = serde_json::json!({ "scalars": ["ID", "String"], "depth": 2, "strict": true });
        let value = Value::from_json(&json);
        assert_eq!(
            value.get("scalars"),
            Some(&Value::Array(vec![Value::String("ID".into()), Value::String("String".into())]))
        );
        assert_eq!(value.get("depth"), Some(&Value::Number(2.0)));
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn later_properties_shadow_earlier_ones() {
        let value = Value::Object(vec![
            ("a".into(), Value::Number(1.0)),
            ("a".into(), Value::Number(2.0)),
        ]);
        assert_eq!(value.get("a"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn element_type_names_use_kind() {
        let value = Value::from(ArtifactElement::Model {
            prebuild: SelectionPrebuild {
                typename: "User".into(),
                fields: vec![],
            },
        });
        assert_eq!(value.type_name(), "model");
        assert_eq!(Value::Null.type_name(), "null");
    }

    #[test]
    fn values_survive_serialization() {
        let value = Value::Object(vec![
            ("field".into(), Value::Field(FieldSelection::leaf("id"))),
            ("list".into(), Value::Array(vec![Value::Bool(true), Value::Null])),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
