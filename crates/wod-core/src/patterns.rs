//! Movement pattern library.
//!
//! Loads the curated `movements.yml` vocabulary: an ordered list of canonical
//! movement labels, each with one or more case-insensitive regular expressions.
//! Patterns use the `regex` crate syntax (no look-around or back-references).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{EtlError, Result};

/// File name of the pattern library inside the config directory.
pub const MOVEMENTS_FILE: &str = "movements.yml";

#[derive(Debug, Deserialize)]
struct PatternEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    patterns: Option<Vec<String>>,
}

/// One canonical movement and the patterns that detect it.
#[derive(Debug, Clone)]
pub struct MovementPattern {
    pub label: String,
    pub patterns: Vec<Regex>,
}

impl MovementPattern {
    /// `true` when any pattern finds a match in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

/// Read-only registry of canonical movement labels, in file order.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    movements: Vec<MovementPattern>,
}

impl PatternLibrary {
    /// Load `<config_dir>/movements.yml`.
    pub fn load_from_dir(config_dir: &Path) -> Result<Self> {
        Self::load(&config_dir.join(MOVEMENTS_FILE))
    }

    /// Load and compile a pattern file.
    ///
    /// A missing or unreadable file, invalid YAML, or an invalid regex is a
    /// configuration error. Entries without a name or without patterns are
    /// skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| EtlError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::from_yaml_str(&content, path)?;
        debug!(
            "PatternLibrary: loaded {} movements from {}",
            library.len(),
            path.display()
        );
        Ok(library)
    }

    /// Parse a YAML document; `origin` is only used in error messages.
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self> {
        let entries: Option<Vec<PatternEntry>> =
            serde_yaml::from_str(content).map_err(|e| EtlError::PatternFile {
                path: PathBuf::from(origin),
                reason: e.to_string(),
            })?;

        let mut pairs = Vec::new();
        for entry in entries.unwrap_or_default() {
            let (Some(name), Some(patterns)) = (entry.name, entry.patterns) else {
                continue;
            };
            if name.trim().is_empty() || patterns.is_empty() {
                continue;
            }
            pairs.push((name, patterns));
        }
        Self::from_pairs(pairs)
    }

    /// Build a library from `(label, patterns)` pairs.
    pub fn from_pairs<L, P>(pairs: impl IntoIterator<Item = (L, Vec<P>)>) -> Result<Self>
    where
        L: Into<String>,
        P: AsRef<str>,
    {
        let mut movements = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (label, raw_patterns) in pairs {
            let label: String = label.into();
            let mut compiled = Vec::with_capacity(raw_patterns.len());
            for raw in &raw_patterns {
                let re = RegexBuilder::new(raw.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| EtlError::PatternCompile {
                        label: label.clone(),
                        pattern: raw.as_ref().to_string(),
                        source,
                    })?;
                compiled.push(re);
            }
            if compiled.is_empty() {
                continue;
            }
            if !seen.insert(label.clone()) {
                warn!("PatternLibrary: duplicate label {:?}; keeping both entries", label);
            }
            movements.push(MovementPattern {
                label,
                patterns: compiled,
            });
        }

        Ok(Self { movements })
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovementPattern> {
        self.movements.iter()
    }

    /// Canonical labels in library order.
    pub fn labels(&self) -> Vec<String> {
        self.movements.iter().map(|m| m.label.clone()).collect()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.movements.iter().any(|m| m.label == label)
    }

    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
- name: back squat
  patterns:
    - '\bback\s+squats?\b'
- name: burpee
  patterns: ['\bburpees?\b']
- name: no patterns here
- patterns: ['\borphan\b']
"#;

    #[test]
    fn test_from_yaml_str_skips_incomplete_entries() {
        let lib = PatternLibrary::from_yaml_str(SAMPLE, Path::new("inline")).unwrap();
        assert_eq!(lib.labels(), vec!["back squat", "burpee"]);
        assert!(lib.contains("burpee"));
        assert!(!lib.contains("orphan"));
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        let lib = PatternLibrary::from_yaml_str(SAMPLE, Path::new("inline")).unwrap();
        let squat = lib.iter().next().unwrap();
        assert!(squat.is_match("5x5 BACK SQUATS"));
        assert!(!squat.is_match("front squat"));
    }

    #[test]
    fn test_empty_document_is_empty_library() {
        let lib = PatternLibrary::from_yaml_str("", Path::new("inline")).unwrap();
        assert!(lib.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = PatternLibrary::from_yaml_str("name: [unclosed", Path::new("bad.yml")).unwrap_err();
        assert!(matches!(err, EtlError::PatternFile { .. }));
        assert!(err.to_string().contains("bad.yml"));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let err = PatternLibrary::from_pairs(vec![("broken", vec!["(unclosed"])]).unwrap_err();
        match err {
            EtlError::PatternCompile { label, pattern, .. } => {
                assert_eq!(label, "broken");
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_missing_file_is_file_read_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = PatternLibrary::load_from_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, EtlError::FileRead { .. }));
    }

    #[test]
    fn test_load_from_dir_reads_movements_file() {
        let tmp = TempDir::new().expect("tempdir");
        std::fs::write(tmp.path().join(MOVEMENTS_FILE), SAMPLE).expect("write");
        let lib = PatternLibrary::load_from_dir(tmp.path()).unwrap();
        assert_eq!(lib.len(), 2);
    }
}
