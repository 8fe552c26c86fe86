//! The `gql` builder methods available to definitions.
//!
//! ```text
//! gql.model(typename, { fields })
//! gql.fragment(typename, { fields })
//! gql.slice(operationType, { variables?, fields })
//! gql.operation(operationType, name, { variables?, fields?, slices? })
//! gql.field(name, args?, fields?)
//! ```
//!
//! A field list accepts field names, `gql.field` results, `{ name: [...] }`
//! objects and spread elements. Argument strings starting with `$` are
//! variable references.

use std::collections::BTreeSet;

use kiln_artifact::{
    render_document, ArgValue, ArtifactElement, FieldSelection, OperationPrebuild, OperationType,
    SelectionPrebuild, SlicePrebuild, Value, VariableDefinition,
};

use crate::interp::Eval;

pub(crate) fn call(method: &str, args: Vec<Value>) -> Eval<Value> {
    match method {
        "model" | "fragment" => selection(method, &args),
        "slice" => slice(&args),
        "operation" => operation(&args),
        "field" => field(&args).map(Value::Field),
        other => Err(format!("`gql.{other}` is not a builder method")),
    }
}

fn arg<'a>(args: &'a [Value], index: usize, what: &str) -> Eval<&'a Value> {
    args.get(index).ok_or_else(|| format!("missing {what} argument"))
}

fn string_arg<'a>(args: &'a [Value], index: usize, what: &str) -> Eval<&'a str> {
    let value = arg(args, index, what)?;
    value
        .as_str()
        .ok_or_else(|| format!("{what} must be a string, found a {}", value.type_name()))
}

fn options<'a>(args: &'a [Value], index: usize) -> Eval<&'a Value> {
    match arg(args, index, "options")? {
        value @ Value::Object(_) => Ok(value),
        other => Err(format!("options must be an object, found a {}", other.type_name())),
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn name_arg<'a>(args: &'a [Value], index: usize, what: &str) -> Eval<&'a str> {
    let name = string_arg(args, index, what)?;
    if !is_name(name) {
        return Err(format!("`{name}` is not a valid GraphQL name"));
    }
    Ok(name)
}

fn selection(method: &str, args: &[Value]) -> Eval<Value> {
    let typename = name_arg(args, 0, "typename")?;
    let fields = required_fields(options(args, 1)?)?;
    let prebuild = SelectionPrebuild {
        typename: typename.to_string(),
        fields,
    };
    let element = if method == "model" {
        ArtifactElement::Model { prebuild }
    } else {
        ArtifactElement::Fragment { prebuild }
    };
    Ok(element.into())
}

fn slice(args: &[Value]) -> Eval<Value> {
    let operation_type: OperationType = string_arg(args, 0, "operation type")?.parse()?;
    let options = options(args, 1)?;
    let variables = variables(options)?;
    let fields = required_fields(options)?;
    check_variables(&variables, &fields)?;
    Ok(ArtifactElement::Slice {
        prebuild: SlicePrebuild {
            operation_type,
            variables,
            fields,
        },
    }
    .into())
}

fn operation(args: &[Value]) -> Eval<Value> {
    let operation_type: OperationType = string_arg(args, 0, "operation type")?.parse()?;
    let name = name_arg(args, 1, "operation name")?;
    let options = options(args, 2)?;
    let mut variables = variables(options)?;
    let mut fields = match options.get("fields") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => to_fields(value)?,
    };

    match options.get("slices") {
        None | Some(Value::Null) => {}
        Some(Value::Array(slices)) => {
            for value in slices {
                let Value::Element(element) = value else {
                    return Err(format!("`slices` must contain slices, found a {}", value.type_name()));
                };
                let ArtifactElement::Slice { prebuild } = element.as_ref() else {
                    return Err(format!("`slices` must contain slices, found a {}", value.type_name()));
                };
                if prebuild.operation_type != operation_type {
                    return Err(format!(
                        "a {} slice cannot be used in a {operation_type}",
                        prebuild.operation_type
                    ));
                }
                for variable in &prebuild.variables {
                    merge_variable(&mut variables, variable.clone())?;
                }
                for field in &prebuild.fields {
                    FieldSelection::merge_into(&mut fields, field.clone());
                }
            }
        }
        Some(other) => return Err(format!("`slices` must be an array, found a {}", other.type_name())),
    }

    if fields.is_empty() {
        return Err(format!("operation `{name}` selects no fields"));
    }
    check_variables(&variables, &fields)?;

    let document = render_document(operation_type, name, &variables, &fields);
    Ok(ArtifactElement::Operation {
        prebuild: OperationPrebuild {
            operation_type,
            operation_name: name.to_string(),
            document,
            variable_names: variables.iter().map(|v| v.name.clone()).collect(),
            variables,
            fields,
        },
    }
    .into())
}

fn field(args: &[Value]) -> Eval<FieldSelection> {
    let name = name_arg(args, 0, "field name")?;
    // `gql.field(name, [children])` skips the arguments.
    let (field_args, children) = match (args.get(1), args.get(2)) {
        (Some(list @ Value::Array(_)), None) => (None, Some(list)),
        pair => pair,
    };
    let fields = match children {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => to_fields(value)?,
    };
    Ok(FieldSelection {
        name: name.to_string(),
        args: to_args(field_args)?,
        fields,
    })
}

fn required_fields(options: &Value) -> Eval<Vec<FieldSelection>> {
    let value = options
        .get("fields")
        .ok_or_else(|| "`fields` is required".to_string())?;
    to_fields(value)
}

fn to_fields(value: &Value) -> Eval<Vec<FieldSelection>> {
    let Value::Array(items) = value else {
        return Err(format!("`fields` must be an array, found a {}", value.type_name()));
    };
    let mut fields = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(name) if is_name(name) => {
                FieldSelection::merge_into(&mut fields, FieldSelection::leaf(name.as_str()));
            }
            Value::String(name) => return Err(format!("`{name}` is not a valid field name")),
            Value::Field(field) => FieldSelection::merge_into(&mut fields, field.clone()),
            Value::Object(entries) => {
                for (name, children) in entries {
                    if !is_name(name) {
                        return Err(format!("`{name}` is not a valid field name"));
                    }
                    let field = FieldSelection {
                        name: name.clone(),
                        args: Vec::new(),
                        fields: to_fields(children)?,
                    };
                    FieldSelection::merge_into(&mut fields, field);
                }
            }
            Value::Element(element) => {
                for field in element.fields() {
                    FieldSelection::merge_into(&mut fields, field.clone());
                }
            }
            other => return Err(format!("a {} is not a valid field selection", other.type_name())),
        }
    }
    Ok(fields)
}

fn to_args(value: Option<&Value>) -> Eval<Vec<(String, ArgValue)>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), to_arg(value)?)))
            .collect(),
        Some(other) => Err(format!("field arguments must be an object, found a {}", other.type_name())),
    }
}

fn to_arg(value: &Value) -> Eval<ArgValue> {
    Ok(match value {
        Value::Null => ArgValue::Null,
        Value::Bool(b) => ArgValue::Bool(*b),
        Value::Number(n) => ArgValue::Number(*n),
        Value::String(s) => match s.strip_prefix('$') {
            Some(name) if is_name(name) => ArgValue::Variable(name.to_string()),
            _ => ArgValue::String(s.clone()),
        },
        Value::Array(items) => ArgValue::List(items.iter().map(to_arg).collect::<Eval<_>>()?),
        Value::Object(entries) => ArgValue::Object(
            entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), to_arg(value)?)))
                .collect::<Eval<_>>()?,
        ),
        other => return Err(format!("a {} cannot be used as an argument", other.type_name())),
    })
}

fn variables(options: &Value) -> Eval<Vec<VariableDefinition>> {
    let mut variables = Vec::new();
    match options.get("variables") {
        None | Some(Value::Null) => {}
        Some(Value::Object(entries)) => {
            for (name, type_name) in entries {
                let Some(type_name) = type_name.as_str() else {
                    return Err(format!(
                        "the type of variable `${name}` must be a string, found a {}",
                        type_name.type_name()
                    ));
                };
                let name = name.strip_prefix('$').unwrap_or(name);
                if !is_name(name) {
                    return Err(format!("`{name}` is not a valid variable name"));
                }
                merge_variable(
                    &mut variables,
                    VariableDefinition {
                        name: name.to_string(),
                        type_name: type_name.to_string(),
                    },
                )?;
            }
        }
        Some(other) => return Err(format!("`variables` must be an object, found a {}", other.type_name())),
    }
    Ok(variables)
}

fn merge_variable(variables: &mut Vec<VariableDefinition>, variable: VariableDefinition) -> Eval<()> {
    match variables.iter().find(|v| v.name == variable.name) {
        Some(existing) if existing.type_name != variable.type_name => Err(format!(
            "variable `${}` is declared as both `{}` and `{}`",
            variable.name, existing.type_name, variable.type_name
        )),
        Some(_) => Ok(()),
        None => {
            variables.push(variable);
            Ok(())
        }
    }
}

fn check_variables(variables: &[VariableDefinition], fields: &[FieldSelection]) -> Eval<()> {
    let declared: BTreeSet<&str> = variables.iter().map(|v| v.name.as_str()).collect();
    let mut undeclared = None;
    for field in fields {
        field.visit_variables(&mut |name| {
            if undeclared.is_none() && !declared.contains(name) {
                undeclared = Some(name.to_string());
            }
        });
    }
    match undeclared {
        Some(name) => Err(format!("variable `${name}` is used but not declared")),
        None => Ok(()),
    }
}
