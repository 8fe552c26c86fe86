//! Canonical identities for definitions.
//!
//! A [`CanonicalId`] has the form `{normalizedFilePath}::{inFilePath}`. It is
//! unique within a build and stable across builds as long as the definition
//! does not move lexically. IDs order by file path first, then in-file path,
//! which is the tie-breaking order used everywhere the builder needs
//! determinism.

use crate::path::{is_absolute, normalize_path, relative_to};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Separator between the file path and the in-file path.
pub const SEPARATOR: &str = "::";

/// Errors produced while creating or parsing a canonical ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalIdError {
    /// No base directory was given and the file path is relative.
    #[error("canonical id requires an absolute path, got `{path}`")]
    RequiresAbsolutePath {
        /// The offending relative path.
        path: String,
    },

    /// The input cannot form a valid canonical ID.
    #[error("invalid canonical id `{input}`: {reason}")]
    Invalid {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// A canonical definition identity of the form `file::inFilePath`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CanonicalId {
    raw: String,
    split: usize,
}

impl CanonicalId {
    /// Builds an ID from an already-normalized file path and an in-file path.
    fn from_parts(file_path: &str, in_file_path: &str) -> Result<Self, CanonicalIdError> {
        let input = || format!("{file_path}{SEPARATOR}{in_file_path}");
        if file_path.is_empty() {
            return Err(CanonicalIdError::Invalid {
                input: input(),
                reason: "file path is empty",
            });
        }
        if in_file_path.is_empty() {
            return Err(CanonicalIdError::Invalid {
                input: input(),
                reason: "in-file path is empty",
            });
        }
        if file_path.contains(SEPARATOR) {
            return Err(CanonicalIdError::Invalid {
                input: input(),
                reason: "file path contains `::`",
            });
        }
        Ok(Self {
            raw: input(),
            split: file_path.len(),
        })
    }

    /// The normalized file path component.
    pub fn file_path(&self) -> &str {
        &self.raw[..self.split]
    }

    /// The in-file path component (e.g. `queries.byId`).
    pub fn in_file_path(&self) -> &str {
        &self.raw[self.split + SEPARATOR.len()..]
    }

    /// The full `file::path` string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns a sibling ID in the same file.
    pub fn sibling(&self, in_file_path: &str) -> Result<Self, CanonicalIdError> {
        Self::from_parts(self.file_path(), in_file_path)
    }
}

/// Creates a canonical ID for a definition.
///
/// The file path is normalized (`.`/`..` resolved, forward slashes). With a
/// `base_dir` the path is expressed relative to it; without one the path
/// must already be absolute.
pub fn create_canonical_id(
    file_path: &str,
    in_file_path: &str,
    base_dir: Option<&str>,
) -> Result<CanonicalId, CanonicalIdError> {
    if file_path.is_empty() {
        return Err(CanonicalIdError::Invalid {
            input: format!("{file_path}{SEPARATOR}{in_file_path}"),
            reason: "file path is empty",
        });
    }
    let normalized = canonical_file_path(file_path, base_dir)?;
    CanonicalId::from_parts(&normalized, in_file_path)
}

/// Returns the file component a canonical ID would carry for `file_path`.
///
/// The cache and the graph key files by this form so that file keys and
/// canonical IDs always agree.
pub fn canonical_file_path(file_path: &str, base_dir: Option<&str>) -> Result<String, CanonicalIdError> {
    match base_dir {
        Some(base) => Ok(relative_to(file_path, base)),
        None if is_absolute(file_path) => Ok(normalize_path(file_path)),
        None => Err(CanonicalIdError::RequiresAbsolutePath {
            path: file_path.to_string(),
        }),
    }
}

/// Splits a canonical ID string on the first `::`.
pub fn parse_canonical_id(input: &str) -> Result<CanonicalId, CanonicalIdError> {
    match input.split_once(SEPARATOR) {
        Some((file, path)) => CanonicalId::from_parts(file, path),
        None => Err(CanonicalIdError::Invalid {
            input: input.to_string(),
            reason: "missing `::` separator",
        }),
    }
}

impl Ord for CanonicalId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.file_path()
            .cmp(other.file_path())
            .then_with(|| self.in_file_path().cmp(other.in_file_path()))
    }
}

impl PartialOrd for CanonicalId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalId({})", self.raw)
    }
}

impl std::str::FromStr for CanonicalId {
    type Err = CanonicalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical_id(s)
    }
}

impl Serialize for CanonicalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for CanonicalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_canonical_id(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn absolute_path_without_base() {
        let id = create_canonical_id("/repo/src/user.ts", "userFragment", None).unwrap();
        assert_eq!(id.as_str(), "/repo/src/user.ts::userFragment");
        assert_eq!(id.file_path(), "/repo/src/user.ts");
        assert_eq!(id.in_file_path(), "userFragment");
    }

    #[test]
    fn relative_path_without_base_is_rejected() {
        let err = create_canonical_id("src/user.ts", "x", None).unwrap_err();
        assert_eq!(
            err,
            CanonicalIdError::RequiresAbsolutePath {
                path: "src/user.ts".into()
            }
        );
    }

    #[test]
    fn base_dir_makes_path_relative() {
        let id = create_canonical_id("/repo/src/../src/query.ts", "queries.byId", Some("/repo")).unwrap();
        assert_eq!(id.as_str(), "src/query.ts::queries.byId");
    }

    #[test]
    fn file_keys_match_canonical_ids() {
        let key = canonical_file_path("/repo/src/a.ts", Some("/repo")).unwrap();
        let id = create_canonical_id("/repo/src/a.ts", "x", Some("/repo")).unwrap();
        assert_eq!(key, id.file_path());
        assert!(canonical_file_path("a.ts", None).is_err());
    }

    #[test]
    fn backslashes_are_normalized() {
        let id = create_canonical_id("C:\\repo\\a.ts", "x", None).unwrap();
        assert_eq!(id.file_path(), "C:/repo/a.ts");
    }

    #[test]
    fn empty_components_rejected() {
        assert!(create_canonical_id("", "x", None).is_err());
        assert!(create_canonical_id("/a.ts", "", None).is_err());
        assert!(parse_canonical_id("::x").is_err());
        assert!(parse_canonical_id("/a.ts::").is_err());
    }

    #[test]
    fn parse_requires_separator() {
        let err = parse_canonical_id("/a.ts").unwrap_err();
        assert!(err.to_string().contains("missing `::`"));
    }

    #[test]
    fn parse_splits_on_first_separator() {
        let id = parse_canonical_id("/a.ts::x::y").unwrap();
        assert_eq!(id.file_path(), "/a.ts");
        assert_eq!(id.in_file_path(), "x::y");
    }

    #[test]
    fn ordering_is_file_then_path() {
        let a = parse_canonical_id("/a.ts::z").unwrap();
        let b = parse_canonical_id("/a.ts.bak::a").unwrap();
        let c = parse_canonical_id("/a.ts::b").unwrap();
        let mut ids = vec![b.clone(), a.clone(), c.clone()];
        ids.sort();
        assert_eq!(ids, vec![c, a, b]);
    }

    #[test]
    fn serde_as_plain_string() {
        let id = parse_canonical_id("/a.ts::x").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"/a.ts::x\"");
        let back: CanonicalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<CanonicalId>("\"nope\"").is_err());
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-]{1,8}"
    }

    proptest! {
        #[test]
        fn round_trip_law(
            dirs in proptest::collection::vec(segment(), 1..5),
            path in proptest::collection::vec(segment(), 1..4),
        ) {
            let file = format!("/{}.ts", dirs.join("/"));
            let in_file = path.join(".");
            let id = create_canonical_id(&file, &in_file, None).unwrap();
            let parsed = parse_canonical_id(id.as_str()).unwrap();
            prop_assert_eq!(parsed.file_path(), file.as_str());
            prop_assert_eq!(parsed.in_file_path(), in_file.as_str());
        }
    }
}
