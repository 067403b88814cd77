//! Transformation rule libraries.
//!
//! A rule is a reaction SMARTS compiled once at load time. Libraries come in
//! two categories and are read from JSON, from a delimited table with a
//! `template` column, or from plain text with one pattern per line.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::reaction::{from_reaction_smarts, Reaction, ReactionSmartsError};

/// Column holding the pattern in delimited rule tables.
pub const TEMPLATE_COLUMN: &str = "template";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Biological,
    Chemical,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Biological => f.write_str("biological"),
            Self::Chemical => f.write_str("chemical"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformationRule {
    pattern_text: String,
    category: RuleCategory,
    compiled: Reaction,
}

impl TransformationRule {
    pub fn compile(
        pattern_text: impl Into<String>,
        category: RuleCategory,
    ) -> Result<Self, ReactionSmartsError> {
        let pattern_text = pattern_text.into();
        let compiled = from_reaction_smarts(&pattern_text)?;
        Ok(Self {
            pattern_text,
            category,
            compiled,
        })
    }

    pub fn pattern_text(&self) -> &str {
        &self.pattern_text
    }

    pub fn category(&self) -> RuleCategory {
        self.category
    }

    pub fn compiled(&self) -> &Reaction {
        &self.compiled
    }

    /// Whether the rule can fire on a single molecule.
    pub fn is_single_reactant(&self) -> bool {
        self.compiled.reactant_count() == 1
    }
}

#[derive(Debug, Error)]
#[error("rule {index} ({pattern:?}) does not compile: {source}")]
pub struct RuleCompileFailure {
    pub index: usize,
    pub pattern: String,
    #[source]
    pub source: ReactionSmartsError,
}

#[derive(Debug, Error)]
pub enum RuleLibraryError {
    #[error("cannot read rule file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON rule file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON rule file {} must hold an object keyed by pattern or an array of patterns", path.display())]
    JsonShape { path: PathBuf },

    #[error("malformed rule table {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Compile(#[from] RuleCompileFailure),
}

/// The compiled rules of one category, in source order.
#[derive(Debug, Clone)]
pub struct RuleLibrary {
    category: RuleCategory,
    rules: Vec<TransformationRule>,
}

impl RuleLibrary {
    pub fn from_patterns<I, S>(patterns: I, category: RuleCategory) -> Result<Self, RuleCompileFailure>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rules = patterns
            .into_iter()
            .enumerate()
            .map(|(index, pattern)| {
                let pattern = pattern.into();
                TransformationRule::compile(pattern.clone(), category).map_err(|source| {
                    RuleCompileFailure {
                        index,
                        pattern,
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let library = Self { category, rules };
        let multi = library.multi_reactant_count();
        if multi > 0 {
            warn!(
                %category,
                count = multi,
                "rules with more than one reactant template never fire on a single molecule"
            );
        }
        Ok(library)
    }

    /// Reads and compiles a rule file. Any pattern that fails to compile
    /// aborts the load.
    pub fn load(path: impl AsRef<Path>, category: RuleCategory) -> Result<Self, RuleLibraryError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RuleLibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let patterns = read_patterns(path, &text)?;
        let library = Self::from_patterns(patterns, category)?;
        info!(
            %category,
            rules = library.len(),
            path = %path.display(),
            "loaded rule library"
        );
        Ok(library)
    }

    pub fn category(&self) -> RuleCategory {
        self.category
    }

    pub fn rules(&self) -> &[TransformationRule] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformationRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn multi_reactant_count(&self) -> usize {
        self.rules.iter().filter(|r| !r.is_single_reactant()).count()
    }
}

fn read_patterns(path: &Path, text: &str) -> Result<Vec<String>, RuleLibraryError> {
    let head = text.trim_start();
    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        || head.starts_with('{')
        || head.starts_with("[\"");
    if is_json {
        return json_patterns(path, text);
    }
    if let Some(patterns) = table_patterns(path, text)? {
        return Ok(patterns);
    }
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// Patterns from a JSON object (its keys, in file order) or an array of
/// strings.
fn json_patterns(path: &Path, text: &str) -> Result<Vec<String>, RuleLibraryError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|source| RuleLibraryError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let shape_error = || RuleLibraryError::JsonShape {
        path: path.to_path_buf(),
    };
    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().map(|(k, _)| k).collect()),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => Ok(s),
                _ => Err(shape_error()),
            })
            .collect(),
        _ => Err(shape_error()),
    }
}

/// Patterns from the `template` column of a table, or `None` when the
/// header has no such column.
fn table_patterns(path: &Path, text: &str) -> Result<Option<Vec<String>>, RuleLibraryError> {
    let csv_error = |source| RuleLibraryError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(csv_error)?;
    let Some(column) = headers.iter().position(|h| h.trim() == TEMPLATE_COLUMN) else {
        return Ok(None);
    };

    let mut patterns = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if let Some(pattern) = record.get(column).map(str::trim).filter(|p| !p.is_empty()) {
            patterns.push(pattern.to_string());
        }
    }
    Ok(Some(patterns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn patterns(library: &RuleLibrary) -> Vec<&str> {
        library.iter().map(|r| r.pattern_text()).collect()
    }

    #[test]
    fn from_patterns_keeps_order_and_category() {
        let lib = RuleLibrary::from_patterns(
            ["[C:1][OH:2]>>[C:1]=[O:2]", "[N:1]>>[N:1]C"],
            RuleCategory::Biological,
        )
        .unwrap();
        assert_eq!(lib.len(), 2);
        assert_eq!(lib.category(), RuleCategory::Biological);
        assert_eq!(patterns(&lib), ["[C:1][OH:2]>>[C:1]=[O:2]", "[N:1]>>[N:1]C"]);
        assert!(lib.iter().all(|r| r.category() == RuleCategory::Biological));
    }

    #[test]
    fn compile_failure_names_the_rule() {
        let err = RuleLibrary::from_patterns(
            ["[C:1]>>[C:1]O", "[C:1>>[C:1]"],
            RuleCategory::Chemical,
        )
        .unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.pattern, "[C:1>>[C:1]");
    }

    #[test]
    fn multi_reactant_rules_are_counted() {
        let lib = RuleLibrary::from_patterns(
            ["[C:1]Br.[N:2]>>[C:1][N:2]", "[N:1]>>[N:1]C"],
            RuleCategory::Chemical,
        )
        .unwrap();
        assert_eq!(lib.multi_reactant_count(), 1);
        assert!(!lib.rules()[0].is_single_reactant());
    }

    #[test]
    fn load_json_object_keys_in_file_order() {
        let file = write_file(
            ".json",
            r#"{"[O:1]>>[O:1]C": 12, "[N:1]>>[N:1]C": 3, "[C:1]=[C:2]>>[C:1][C:2]": 1}"#,
        );
        let lib = RuleLibrary::load(file.path(), RuleCategory::Chemical).unwrap();
        assert_eq!(
            patterns(&lib),
            ["[O:1]>>[O:1]C", "[N:1]>>[N:1]C", "[C:1]=[C:2]>>[C:1][C:2]"]
        );
    }

    #[test]
    fn load_json_array() {
        let file = write_file(".json", r#"["[O:1]>>[O:1]C"]"#);
        let lib = RuleLibrary::load(file.path(), RuleCategory::Chemical).unwrap();
        assert_eq!(lib.len(), 1);

        let bad = write_file(".json", "[1, 2]");
        assert!(matches!(
            RuleLibrary::load(bad.path(), RuleCategory::Chemical),
            Err(RuleLibraryError::JsonShape { .. })
        ));
    }

    #[test]
    fn load_table_with_template_column() {
        let file = write_file(
            ".txt",
            "id,template,source\n0,[O:1]>>[O:1]C,kegg\n1,\"[C,N:1]>>[C:1]O\",metacyc\n2,,empty\n",
        );
        let lib = RuleLibrary::load(file.path(), RuleCategory::Biological).unwrap();
        assert_eq!(patterns(&lib), ["[O:1]>>[O:1]C", "[C,N:1]>>[C:1]O"]);
    }

    #[test]
    fn load_plain_lines() {
        let file = write_file(".txt", "# oxidations\n[C:1][OH:2]>>[C:1]=[O:2]\n\n[N:1]>>[N:1]C\n");
        let lib = RuleLibrary::load(file.path(), RuleCategory::Biological).unwrap();
        assert_eq!(patterns(&lib), ["[C:1][OH:2]>>[C:1]=[O:2]", "[N:1]>>[N:1]C"]);
    }

    #[test]
    fn load_reports_compile_failures_and_missing_files() {
        let file = write_file(".txt", "[N:1]>>[N:1]C\nnot a reaction\n");
        match RuleLibrary::load(file.path(), RuleCategory::Biological) {
            Err(RuleLibraryError::Compile(failure)) => assert_eq!(failure.index, 1),
            other => panic!("expected compile failure, got {other:?}"),
        }
        assert!(matches!(
            RuleLibrary::load("/nonexistent/rules.txt", RuleCategory::Biological),
            Err(RuleLibraryError::Io { .. })
        ));
    }
}
