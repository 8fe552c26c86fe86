//! Field selections, argument values and variable definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal or variable argument value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ArgValue {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string literal.
    String(String),
    /// A `$name` variable reference, stored without the `$`.
    Variable(String),
    /// `[a, b]`
    List(Vec<ArgValue>),
    /// `{ a: 1 }`, in source order.
    Object(Vec<(String, ArgValue)>),
}

impl ArgValue {
    /// Calls `f` with every variable name referenced by this value.
    pub fn visit_variables(&self, f: &mut impl FnMut(&str)) {
        match self {
            ArgValue::Variable(name) => f(name),
            ArgValue::List(items) => {
                for item in items {
                    item.visit_variables(f);
                }
            }
            ArgValue::Object(entries) => {
                for (_, value) in entries {
                    value.visit_variables(f);
                }
            }
            ArgValue::Null | ArgValue::Bool(_) | ArgValue::Number(_) | ArgValue::String(_) => {}
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => f.write_str("null"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::Number(n) => write!(f, "{n}"),
            ArgValue::String(s) => {
                // JSON string escaping matches GraphQL string literals.
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
            ArgValue::Variable(name) => write!(f, "${name}"),
            ArgValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            ArgValue::Object(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// One selected field with its arguments and sub-selections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    /// The field name.
    pub name: String,
    /// Arguments in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<(String, ArgValue)>,
    /// Nested selections.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSelection>,
}

impl FieldSelection {
    /// A leaf field without arguments.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Adds `field` to `fields`, merging it into an existing selection with
    /// the same name and arguments instead of repeating it.
    pub fn merge_into(fields: &mut Vec<FieldSelection>, field: FieldSelection) {
        match fields
            .iter()
            .position(|f| f.name == field.name && f.args == field.args)
        {
            Some(i) => {
                for child in field.fields {
                    Self::merge_into(&mut fields[i].fields, child);
                }
            }
            None => fields.push(field),
        }
    }

    /// Calls `f` with every variable referenced in this field or below it.
    pub fn visit_variables(&self, f: &mut impl FnMut(&str)) {
        for (_, value) in &self.args {
            value.visit_variables(f);
        }
        for field in &self.fields {
            field.visit_variables(f);
        }
    }
}

/// A declared operation variable such as `$id: ID!`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    /// The variable name without `$`.
    pub name: String,
    /// The GraphQL type, e.g. `ID!`.
    pub type_name: String,
}

impl fmt::Display for VariableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}: {}", self.name, self.type_name)
    }
}
