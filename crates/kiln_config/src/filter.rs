//! Include/exclude glob matching for source discovery.

use crate::error::ConfigError;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include and exclude patterns.
///
/// Paths are matched relative to the project root with forward slashes.
/// A file participates in the build when it matches an include pattern and
/// no exclude pattern; included-then-excluded files are reported as skips.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

fn compile_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.clone(),
            message: e.kind().to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::InvalidGlob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

impl FileFilter {
    /// Compiles include and exclude pattern lists.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_globset(include)?,
            exclude: compile_globset(exclude)?,
        })
    }

    /// Returns `true` if the path matches an include pattern.
    pub fn is_included(&self, relative_path: &str) -> bool {
        self.include.is_match(relative_path)
    }

    /// Returns `true` if the path matches an exclude pattern.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.exclude.is_match(relative_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str]) -> FileFilter {
        let inc: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exc: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        FileFilter::new(&inc, &exc).unwrap()
    }

    #[test]
    fn include_and_exclude() {
        let f = filter(&["src/**/*.ts"], &["**/*.test.ts"]);
        assert!(f.is_included("src/user.ts"));
        assert!(f.is_included("src/nested/query.ts"));
        assert!(!f.is_included("lib/user.ts"));
        assert!(f.is_excluded("src/user.test.ts"));
        assert!(!f.is_excluded("src/user.ts"));
    }

    #[test]
    fn empty_exclude_matches_nothing() {
        let f = filter(&["**"], &[]);
        assert!(!f.is_excluded("anything.ts"));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = FileFilter::new(&["src/[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlob { .. }));
    }
}
