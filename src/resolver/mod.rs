//! Identifier resolution
//!
//! Maps short propeller codes such as `20x10E` to the canonical file name of
//! a category and finds that file inside the corpus tree.

pub mod identifier;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::types::Category;
use crate::{Error, Result};

pub use identifier::IdentifierParser;

/// How a short code becomes an on-disk file name
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NamingRule {
    pub prefix: String,
    pub suffix: String,
}

impl NamingRule {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Geometry files: `20x10E-PERF.PE0`
    pub fn geometry() -> Self {
        Self::new("", "-PERF.PE0")
    }

    /// Performance files: `PER3_20x10E.dat`
    pub fn performance() -> Self {
        Self::new("PER3_", ".dat")
    }

    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Geometry => Self::geometry(),
            Category::Performance => Self::performance(),
        }
    }

    /// Canonical file name for `code`. Idempotent: parts already present
    /// are not added again.
    pub fn canonical_filename(&self, code: &str) -> String {
        let code = code.trim();
        let mut name = String::with_capacity(self.prefix.len() + code.len() + self.suffix.len());
        if !code.starts_with(&self.prefix) {
            name.push_str(&self.prefix);
        }
        name.push_str(code);
        if !code.ends_with(&self.suffix) {
            name.push_str(&self.suffix);
        }
        name
    }

    /// Whether a file name follows this rule.
    pub fn matches(&self, filename: &str) -> bool {
        filename.starts_with(&self.prefix)
            && filename.ends_with(&self.suffix)
            && filename.len() > self.prefix.len() + self.suffix.len()
    }
}

impl Default for NamingRule {
    fn default() -> Self {
        Self::performance()
    }
}

/// Finds the file of one category under a root directory
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    root: PathBuf,
    category: Category,
    rule: NamingRule,
}

impl IdentifierResolver {
    pub fn new(root: impl Into<PathBuf>, category: Category, rule: NamingRule) -> Self {
        Self {
            root: root.into(),
            category,
            rule,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rule(&self) -> &NamingRule {
        &self.rule
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Resolve a code to the first file in the tree whose name equals the
    /// canonical file name. Traversal is sorted by file name, so repeated
    /// calls on an unchanged tree return the same path. Duplicates across
    /// subdirectories are not reported.
    pub fn resolve(&self, code: &str) -> Result<PathBuf> {
        let filename = self.rule.canonical_filename(code);

        let found = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .find(|e| e.file_name().to_str() == Some(filename.as_str()));

        match found {
            Some(entry) => {
                tracing::debug!(
                    code,
                    category = %self.category,
                    path = %entry.path().display(),
                    "Resolved propeller"
                );
                Ok(entry.into_path())
            }
            None => Err(Error::NotFound {
                code: code.to_string(),
                category: self.category,
            }),
        }
    }
}

/// Geometry and performance resolvers of one corpus
#[derive(Debug, Clone)]
pub struct Corpus {
    geometry: IdentifierResolver,
    performance: IdentifierResolver,
}

impl Corpus {
    pub fn new(geometry: IdentifierResolver, performance: IdentifierResolver) -> Self {
        Self {
            geometry,
            performance,
        }
    }

    /// Corpus with the default naming rules.
    pub fn with_roots(geometry_root: impl Into<PathBuf>, performance_root: impl Into<PathBuf>) -> Self {
        Self::new(
            IdentifierResolver::new(geometry_root, Category::Geometry, NamingRule::geometry()),
            IdentifierResolver::new(
                performance_root,
                Category::Performance,
                NamingRule::performance(),
            ),
        )
    }

    pub fn resolver(&self, category: Category) -> &IdentifierResolver {
        match category {
            Category::Geometry => &self.geometry,
            Category::Performance => &self.performance,
        }
    }

    pub fn resolve(&self, code: &str, category: Category) -> Result<PathBuf> {
        self.resolver(category).resolve(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_canonical_filename_is_idempotent() {
        let perf = NamingRule::performance();
        assert_eq!(perf.canonical_filename("20x10E"), "PER3_20x10E.dat");
        assert_eq!(perf.canonical_filename("PER3_20x10E.dat"), "PER3_20x10E.dat");
        assert_eq!(
            perf.canonical_filename(&perf.canonical_filename("9x6")),
            perf.canonical_filename("9x6")
        );

        let geo = NamingRule::geometry();
        assert_eq!(geo.canonical_filename("20x10E"), "20x10E-PERF.PE0");
        assert_eq!(geo.canonical_filename("20x10E-PERF.PE0"), "20x10E-PERF.PE0");
    }

    #[test]
    fn test_rule_matches() {
        let perf = NamingRule::performance();
        assert!(perf.matches("PER3_20x10E.dat"));
        assert!(!perf.matches("PER3_.dat"));
        assert!(!perf.matches("20x10E-PERF.PE0"));
    }

    #[test]
    fn test_resolve_searches_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("PER3_10x5.dat"), "").unwrap();

        let resolver = IdentifierResolver::new(
            temp_dir.path(),
            Category::Performance,
            NamingRule::performance(),
        );
        let path = resolver.resolve("10x5").unwrap();
        assert_eq!(path, nested.join("PER3_10x5.dat"));
    }

    #[test]
    fn test_resolve_missing_names_code_and_category() {
        let temp_dir = TempDir::new().unwrap();
        let resolver =
            IdentifierResolver::new(temp_dir.path(), Category::Geometry, NamingRule::geometry());

        match resolver.resolve("11x7") {
            Err(Error::NotFound { code, category }) => {
                assert_eq!(code, "11x7");
                assert_eq!(category, Category::Geometry);
            }
            other => panic!("Unexpected result: {other:?}"),
        }
    }
}
