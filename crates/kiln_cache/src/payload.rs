//! The cached result of evaluating one source file.

use std::collections::BTreeMap;

use kiln_artifact::{ArtifactElement, Value};
use kiln_common::{CanonicalId, ContentHash};
use kiln_diagnostics::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Everything a later build needs to reuse a file without evaluating it:
/// its artifact elements, the values of its plain bindings (read by
/// dependents that are re-evaluated), and the element failures it
/// reported in a partial build.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    /// Elements of the file's definitions.
    pub elements: BTreeMap<CanonicalId, ArtifactElement>,
    /// Values of the file's plain bindings.
    #[serde(default)]
    pub bindings: BTreeMap<CanonicalId, Value>,
    /// Per-element failures, replayed as warnings when the file is reused.
    #[serde(default)]
    pub failures: Vec<Diagnostic>,
}

impl FilePayload {
    /// Returns the materialized value of a definition or binding.
    pub fn value(&self, id: &CanonicalId) -> Option<Value> {
        self.elements
            .get(id)
            .map(|element| Value::from(element.clone()))
            .or_else(|| self.bindings.get(id).cloned())
    }

    /// Encodes the payload; the fingerprint is the hash of these bytes.
    pub fn encode(&self) -> Result<(Vec<u8>, ContentHash), CacheError> {
        let bytes = serde_json::to_vec(self).map_err(CacheError::serialization)?;
        let fingerprint = ContentHash::from_bytes(&bytes);
        Ok((bytes, fingerprint))
    }

    /// Decodes a payload, returning `None` if the bytes are not a payload.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_artifact::{FieldSelection, SelectionPrebuild};
    use kiln_common::parse_canonical_id;

    fn payload() -> FilePayload {
        let mut payload = FilePayload::default();
        payload.elements.insert(
            parse_canonical_id("user.ts::userFragment").unwrap(),
            ArtifactElement::Fragment {
                prebuild: SelectionPrebuild {
                    typename: "User".into(),
                    fields: vec![FieldSelection::leaf("id")],
                },
            },
        );
        payload.bindings.insert(
            parse_canonical_id("user.ts::shared").unwrap(),
            Value::Array(vec![Value::String("id".into())]),
        );
        payload
    }

    #[test]
    fn values_cover_elements_and_bindings() {
        let payload = payload();
        let fragment = payload.value(&parse_canonical_id("user.ts::userFragment").unwrap());
        assert!(matches!(fragment, Some(Value::Element(_))));
        let shared = payload.value(&parse_canonical_id("user.ts::shared").unwrap());
        assert_eq!(shared, Some(Value::Array(vec![Value::String("id".into())])));
        assert!(payload.value(&parse_canonical_id("user.ts::other").unwrap()).is_none());
    }

    #[test]
    fn encoding_is_deterministic() {
        let (a, fa) = payload().encode().unwrap();
        let (b, fb) = payload().encode().unwrap();
        assert_eq!(a, b);
        assert_eq!(fa, fb);
        assert_eq!(FilePayload::decode(&a), Some(payload()));
        assert!(FilePayload::decode(b"[1, 2").is_none());
    }
}
