//! GraphQL document rendering.

use crate::element::OperationType;
use crate::selection::{FieldSelection, VariableDefinition};

const INDENT: &str = "  ";

/// Renders an operation document with two-space indentation:
///
/// ```text
/// query GetUser($id: ID!) {
///   user(id: $id) {
///     id
///   }
/// }
/// ```
pub fn render_document(
    operation_type: OperationType,
    name: &str,
    variables: &[VariableDefinition],
    fields: &[FieldSelection],
) -> String {
    let mut out = format!("{operation_type} {name}");
    if !variables.is_empty() {
        let list: Vec<String> = variables.iter().map(|v| v.to_string()).collect();
        out.push('(');
        out.push_str(&list.join(", "));
        out.push(')');
    }
    out.push_str(" {\n");
    render_fields(&mut out, fields, 1);
    out.push('}');
    out
}

fn render_fields(out: &mut String, fields: &[FieldSelection], depth: usize) {
    let indent = INDENT.repeat(depth);
    for field in fields {
        out.push_str(&indent);
        out.push_str(&field.name);
        if !field.args.is_empty() {
            let args: Vec<String> = field
                .args
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            out.push('(');
            out.push_str(&args.join(", "));
            out.push(')');
        }
        if !field.fields.is_empty() {
            out.push_str(" {\n");
            render_fields(out, &field.fields, depth + 1);
            out.push_str(&indent);
            out.push('}');
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::ArgValue;

    #[test]
    fn renders_nested_selection_with_variables() {
        let fields = vec![FieldSelection {
            name: "user".into(),
            args: vec![("id".into(), ArgValue::Variable("id".into()))],
            fields: vec![FieldSelection::leaf("id"), FieldSelection::leaf("name")],
        }];
        let variables = vec![VariableDefinition {
            name: "id".into(),
            type_name: "ID!".into(),
        }];
        assert_eq!(
            render_document(OperationType::Query, "GetUser", &variables, &fields),
            "query GetUser($id: ID!) {\n  user(id: $id) {\n    id\n    name\n  }\n}"
        );
    }

    #[test]
    fn no_parentheses_without_variables() {
        let doc = render_document(
            OperationType::Mutation,
            "Ping",
            &[],
            &[FieldSelection::leaf("ping")],
        );
        assert_eq!(doc, "mutation Ping {\n  ping\n}");
    }
}
