//! Artifact elements: the resolved value of one definition.

use crate::selection::{FieldSelection, VariableDefinition};
use kiln_analyzer::DefinitionKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The root operation type of a slice or operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// `query`
    Query,
    /// `mutation`
    Mutation,
    /// `subscription`
    Subscription,
}

impl OperationType {
    /// The GraphQL keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(OperationType::Query),
            "mutation" => Ok(OperationType::Mutation),
            "subscription" => Ok(OperationType::Subscription),
            other => Err(format!(
                "unknown operation type `{other}`, expected query, mutation or subscription"
            )),
        }
    }
}

/// The built payload of a model or fragment: a typed selection set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPrebuild {
    /// The GraphQL type the selection applies to.
    pub typename: String,
    /// The selected fields.
    pub fields: Vec<FieldSelection>,
}

/// The built payload of a slice: a reusable piece of an operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlicePrebuild {
    /// The operation type the slice can be embedded in.
    pub operation_type: OperationType,
    /// Variables the slice needs.
    pub variables: Vec<VariableDefinition>,
    /// Root fields the slice selects.
    pub fields: Vec<FieldSelection>,
}

/// The built payload of an operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPrebuild {
    /// `query`, `mutation` or `subscription`.
    pub operation_type: OperationType,
    /// The operation name, unique across the build.
    pub operation_name: String,
    /// The rendered GraphQL document.
    pub document: String,
    /// Declared variable names in declaration order.
    pub variable_names: Vec<String>,
    /// Declared variables, including those merged from slices.
    pub variables: Vec<VariableDefinition>,
    /// Root fields, including those merged from slices.
    pub fields: Vec<FieldSelection>,
}

/// The resolved value of one definition, tagged by kind.
///
/// Serialized as `{ "kind": "operation", "prebuild": { ... } }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactElement {
    /// `gql.model(...)`
    Model {
        /// The built selection.
        prebuild: SelectionPrebuild,
    },
    /// `gql.fragment(...)`
    Fragment {
        /// The built selection.
        prebuild: SelectionPrebuild,
    },
    /// `gql.slice(...)`
    Slice {
        /// The built slice.
        prebuild: SlicePrebuild,
    },
    /// `gql.operation(...)`
    Operation {
        /// The built operation.
        prebuild: OperationPrebuild,
    },
}

impl ArtifactElement {
    /// The definition kind that produced this element.
    pub fn kind(&self) -> DefinitionKind {
        match self {
            ArtifactElement::Model { .. } => DefinitionKind::Model,
            ArtifactElement::Fragment { .. } => DefinitionKind::Fragment,
            ArtifactElement::Slice { .. } => DefinitionKind::Slice,
            ArtifactElement::Operation { .. } => DefinitionKind::Operation,
        }
    }

    /// The operation name, for operations.
    pub fn operation_name(&self) -> Option<&str> {
        match self {
            ArtifactElement::Operation { prebuild } => Some(&prebuild.operation_name),
            ArtifactElement::Model { .. }
            | ArtifactElement::Fragment { .. }
            | ArtifactElement::Slice { .. } => None,
        }
    }

    /// The fields this element selects.
    pub fn fields(&self) -> &[FieldSelection] {
        match self {
            ArtifactElement::Model { prebuild } | ArtifactElement::Fragment { prebuild } => {
                &prebuild.fields
            }
            ArtifactElement::Slice { prebuild } => &prebuild.fields,
            ArtifactElement::Operation { prebuild } => &prebuild.fields,
        }
    }

    /// The variables this element declares.
    pub fn variables(&self) -> &[VariableDefinition] {
        match self {
            ArtifactElement::Model { .. } | ArtifactElement::Fragment { .. } => &[],
            ArtifactElement::Slice { prebuild } => &prebuild.variables,
            ArtifactElement::Operation { prebuild } => &prebuild.variables,
        }
    }
}
