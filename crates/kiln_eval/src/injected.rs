//! External modules made available to the sandbox.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_artifact::Value;

use crate::error::LoadError;

/// Modules injected into every chunk, keyed by specifier.
///
/// Each module is a JSON object whose top-level keys are its exports. The
/// sandbox has no access to anything else, so injected modules are the
/// only way ambient data reaches definitions.
#[derive(Debug, Clone, Default)]
pub struct InjectedModules {
    modules: BTreeMap<String, BTreeMap<String, Value>>,
}

impl InjectedModules {
    /// An empty module set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module from already-built exports.
    pub fn insert(&mut self, specifier: impl Into<String>, exports: BTreeMap<String, Value>) {
        self.modules.insert(specifier.into(), exports);
    }

    /// Reads every module from its JSON file.
    pub fn load(files: &BTreeMap<String, PathBuf>) -> Result<Self, LoadError> {
        let mut modules = Self::new();
        for (specifier, path) in files {
            modules.insert(specifier.clone(), read_module(specifier, path)?);
        }
        Ok(modules)
    }

    /// Returns `true` if `specifier` is provided.
    pub fn contains(&self, specifier: &str) -> bool {
        self.modules.contains_key(specifier)
    }

    /// Looks up one export.
    pub fn get(&self, specifier: &str, name: &str) -> Result<&Value, LoadError> {
        let module = self
            .modules
            .get(specifier)
            .ok_or_else(|| LoadError::MissingModule {
                specifier: specifier.to_string(),
            })?;
        module.get(name).ok_or_else(|| LoadError::MissingExport {
            specifier: specifier.to_string(),
            name: name.to_string(),
        })
    }
}

fn read_module(specifier: &str, path: &Path) -> Result<BTreeMap<String, Value>, LoadError> {
    let invalid = |reason: String| LoadError::InvalidModule {
        specifier: specifier.to_string(),
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    let serde_json::Value::Object(map) = json else {
        return Err(invalid("expected a JSON object of exports".to_string()));
    };
    Ok(map
        .iter()
        .map(|(name, value)| (name.clone(), Value::from_json(value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_exports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalars.json");
        std::fs::write(&path, r#"{ "idType": "ID!", "pageSize": 20 }"#).unwrap();
        let files = BTreeMap::from([("@/scalars".to_string(), path)]);

        let modules = InjectedModules::load(&files).unwrap();
        assert!(modules.contains("@/scalars"));
        assert_eq!(
            modules.get("@/scalars", "idType").unwrap(),
            &Value::String("ID!".into())
        );
        assert!(matches!(
            modules.get("@/scalars", "missing"),
            Err(LoadError::MissingExport { .. })
        ));
        assert!(matches!(
            modules.get("@/other", "x"),
            Err(LoadError::MissingModule { .. })
        ));
    }

    #[test]
    fn non_object_module_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let files = BTreeMap::from([("@/list".to_string(), path)]);
        assert!(matches!(
            InjectedModules::load(&files),
            Err(LoadError::InvalidModule { .. })
        ));
    }
}
