//! Module specifier resolution.
//!
//! Maps an import specifier written in one file to the module it names:
//! another analyzed file, the builder intrinsic, or an injected external
//! module.

use kiln_common::path::{is_absolute, join, normalize_path, parent};
use std::collections::HashSet;

/// Settings that control how specifiers are resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Extensions tried after the bare candidate, in order (e.g. `.ts`).
    pub extensions: Vec<String>,
    /// Alias prefix to absolute target directory, longest prefix first.
    pub aliases: Vec<(String, String)>,
    /// Specifiers that provide the `gql` builder intrinsic.
    pub graphql_system_aliases: Vec<String>,
}

/// The module an import specifier refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleTarget {
    /// An analyzed file, by its normalized absolute path.
    File(String),
    /// The graphql-system module providing the builder intrinsic.
    Intrinsic,
    /// A module supplied at evaluation time through injection.
    External(String),
}

/// Resolves specifiers against the set of files in the build.
pub struct ModuleResolver<'a> {
    options: &'a ResolverOptions,
    files: &'a HashSet<String>,
}

impl<'a> ModuleResolver<'a> {
    /// Creates a resolver over the given analyzed files.
    pub fn new(options: &'a ResolverOptions, files: &'a HashSet<String>) -> Self {
        Self { options, files }
    }

    /// Resolves `specifier` as written in `importer`.
    ///
    /// Returns `None` when a relative, aliased or absolute specifier names
    /// no analyzed file.
    pub fn resolve(&self, importer: &str, specifier: &str) -> Option<ModuleTarget> {
        if self
            .options
            .graphql_system_aliases
            .iter()
            .any(|alias| alias == specifier)
        {
            return Some(ModuleTarget::Intrinsic);
        }

        let candidate = if is_relative(specifier) {
            join(&parent(importer), specifier)
        } else if let Some((prefix, target)) = self
            .options
            .aliases
            .iter()
            .find(|(prefix, _)| specifier.starts_with(prefix.as_str()))
        {
            join(target, &specifier[prefix.len()..])
        } else if is_absolute(specifier) {
            normalize_path(specifier)
        } else {
            return Some(ModuleTarget::External(specifier.to_string()));
        };

        self.lookup(&candidate).map(ModuleTarget::File)
    }

    /// Tries the candidate as-is, with each extension, then as a directory index.
    fn lookup(&self, candidate: &str) -> Option<String> {
        if self.files.contains(candidate) {
            return Some(candidate.to_string());
        }
        for ext in &self.options.extensions {
            let with_ext = format!("{candidate}{ext}");
            if self.files.contains(&with_ext) {
                return Some(with_ext);
            }
        }
        for ext in &self.options.extensions {
            let index = format!("{candidate}/index{ext}");
            if self.files.contains(&index) {
                return Some(index);
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ResolverOptions {
        ResolverOptions {
            extensions: vec![".ts".into(), ".tsx".into()],
            aliases: vec![
                ("@/components/".into(), "/repo/ui".into()),
                ("@/".into(), "/repo/src".into()),
            ],
            graphql_system_aliases: vec!["@/graphql-system".into()],
        }
    }

    fn files() -> HashSet<String> {
        [
            "/repo/src/user.ts",
            "/repo/src/query.ts",
            "/repo/src/models/index.ts",
            "/repo/ui/button.tsx",
            "/repo/src/data.json.ts",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[test]
    fn relative_specifiers_try_extensions() {
        let (opts, files) = (options(), files());
        let resolver = ModuleResolver::new(&opts, &files);
        assert_eq!(
            resolver.resolve("/repo/src/query.ts", "./user"),
            Some(ModuleTarget::File("/repo/src/user.ts".into()))
        );
        assert_eq!(
            resolver.resolve("/repo/src/models/index.ts", "../user.ts"),
            Some(ModuleTarget::File("/repo/src/user.ts".into()))
        );
    }

    #[test]
    fn directory_index() {
        let (opts, files) = (options(), files());
        let resolver = ModuleResolver::new(&opts, &files);
        assert_eq!(
            resolver.resolve("/repo/src/query.ts", "./models"),
            Some(ModuleTarget::File("/repo/src/models/index.ts".into()))
        );
    }

    #[test]
    fn longest_alias_wins() {
        let (opts, files) = (options(), files());
        let resolver = ModuleResolver::new(&opts, &files);
        assert_eq!(
            resolver.resolve("/repo/src/query.ts", "@/components/button"),
            Some(ModuleTarget::File("/repo/ui/button.tsx".into()))
        );
        assert_eq!(
            resolver.resolve("/repo/ui/button.tsx", "@/user"),
            Some(ModuleTarget::File("/repo/src/user.ts".into()))
        );
    }

    #[test]
    fn system_alias_is_intrinsic() {
        let (opts, files) = (options(), files());
        let resolver = ModuleResolver::new(&opts, &files);
        assert_eq!(
            resolver.resolve("/repo/src/query.ts", "@/graphql-system"),
            Some(ModuleTarget::Intrinsic)
        );
    }

    #[test]
    fn bare_specifiers_are_external() {
        let (opts, files) = (options(), files());
        let resolver = ModuleResolver::new(&opts, &files);
        assert_eq!(
            resolver.resolve("/repo/src/query.ts", "scalars"),
            Some(ModuleTarget::External("scalars".into()))
        );
    }

    #[test]
    fn missing_relative_file() {
        let (opts, files) = (options(), files());
        let resolver = ModuleResolver::new(&opts, &files);
        assert_eq!(resolver.resolve("/repo/src/query.ts", "./nope"), None);
    }
}
