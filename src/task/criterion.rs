//! Completion criteria and claimed outputs.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// The closed set of things a completion criterion can assert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    /// `target` is a path that must exist.
    FileExists,
    /// `target` is a path that must exist and have non-zero length.
    FileNotEmpty,
    /// `target` is a path whose contents must not contain placeholder markers.
    NoPlaceholders,
    /// `target` is a shell command that must exit 0.
    CommandSucceeds,
    /// `target` is a type-checker command that must exit 0.
    TypeCheckPasses,
    /// `target` is a linter command that must exit 0.
    LintPasses,
    /// `target` is a URL whose GET status must equal `expected` (default 200).
    HttpEndpointResponds,
    /// `target` is the test-suite command; `expected` lists the baseline passing tests.
    NoRegressions,
}

impl CriterionKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::FileExists,
        Self::FileNotEmpty,
        Self::NoPlaceholders,
        Self::CommandSucceeds,
        Self::TypeCheckPasses,
        Self::LintPasses,
        Self::HttpEndpointResponds,
        Self::NoRegressions,
    ];

    /// The `snake_case` name used in criteria files and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileExists => "file_exists",
            Self::FileNotEmpty => "file_not_empty",
            Self::NoPlaceholders => "no_placeholders",
            Self::CommandSucceeds => "command_succeeds",
            Self::TypeCheckPasses => "type_check_passes",
            Self::LintPasses => "lint_passes",
            Self::HttpEndpointResponds => "http_endpoint_responds",
            Self::NoRegressions => "no_regressions",
        }
    }
}

impl fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One condition that must hold for a task to count as done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCriterion {
    /// What kind of check this is.
    pub kind: CriterionKind,
    /// File path, shell command or URL, depending on `kind`.
    pub target: String,
    /// Optional value to compare against.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "scalar_text")]
    pub expected: Option<String>,
    /// Optional numeric threshold (minimum passing tests for `no_regressions`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
}

impl CompletionCriterion {
    /// Creates a criterion with no expectation or threshold.
    pub fn new(kind: CriterionKind, target: impl Into<String>) -> Self {
        Self { kind, target: target.into(), expected: None, threshold: None }
    }

    /// Sets the expected value.
    #[must_use]
    pub fn expecting(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Sets the numeric threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Shorthand for a [`CriterionKind::FileExists`] criterion.
    pub fn file_exists(path: impl Into<String>) -> Self {
        Self::new(CriterionKind::FileExists, path)
    }

    /// Shorthand for a [`CriterionKind::FileNotEmpty`] criterion.
    pub fn file_not_empty(path: impl Into<String>) -> Self {
        Self::new(CriterionKind::FileNotEmpty, path)
    }

    /// Shorthand for a [`CriterionKind::NoPlaceholders`] criterion.
    pub fn no_placeholders(path: impl Into<String>) -> Self {
        Self::new(CriterionKind::NoPlaceholders, path)
    }

    /// Shorthand for a [`CriterionKind::CommandSucceeds`] criterion.
    pub fn command_succeeds(command: impl Into<String>) -> Self {
        Self::new(CriterionKind::CommandSucceeds, command)
    }
}

/// What kind of artifact an executor claims to have produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// A file on disk.
    File,
    /// A reachable HTTP endpoint.
    Endpoint,
    /// A test or test suite.
    Test,
    /// A build artifact.
    Build,
    /// Anything else.
    Other,
}

/// An output the executor declares it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedOutput {
    /// The kind of output.
    pub kind: OutputKind,
    /// Path or URL of the output; empty when the executor omitted it.
    #[serde(default)]
    pub path: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl ClaimedOutput {
    /// Creates a claimed file output.
    pub fn file(path: impl Into<String>) -> Self {
        Self { kind: OutputKind::File, path: path.into(), description: String::new() }
    }
}

/// Derives the default checks for claimed file outputs.
///
/// Each file gets `file_exists`, `file_not_empty` and `no_placeholders`, in
/// that order. Non-file outputs and outputs without a path contribute nothing.
#[must_use]
pub fn default_criteria_for(outputs: &[ClaimedOutput]) -> Vec<CompletionCriterion> {
    outputs
        .iter()
        .filter(|o| o.kind == OutputKind::File && !o.path.trim().is_empty())
        .flat_map(|o| {
            [
                CompletionCriterion::file_exists(&o.path),
                CompletionCriterion::file_not_empty(&o.path),
                CompletionCriterion::no_placeholders(&o.path),
            ]
        })
        .collect()
}

/// Accepts any YAML scalar for `expected`, so `expected: 200` reads as `"200"`.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(x) => x.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_expectations_read_as_text() {
        let yaml = "kind: http_endpoint_responds\ntarget: http://localhost/health\nexpected: 204\n";
        let criterion: CompletionCriterion = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(criterion.expected.as_deref(), Some("204"));
    }

    #[test]
    fn kinds_serialize_as_snake_case() {
        for kind in CriterionKind::ALL {
            let yaml = serde_yaml::to_string(&kind).unwrap();
            assert_eq!(yaml.trim(), kind.as_str());
        }
    }

    #[test]
    fn parses_criteria_file_entries() {
        let yaml = r"
- kind: file_exists
  target: out.txt
- kind: http_endpoint_responds
  target: http://localhost:8000/health
  expected: '204'
- kind: no_regressions
  target: cargo test
  expected: |
    store::tests::saves
    store::tests::loads
  threshold: 2
";
        let criteria: Vec<CompletionCriterion> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(criteria.len(), 3);
        assert_eq!(criteria[0], CompletionCriterion::file_exists("out.txt"));
        assert_eq!(criteria[1].expected.as_deref(), Some("204"));
        assert_eq!(criteria[2].kind, CriterionKind::NoRegressions);
        assert_eq!(criteria[2].threshold, Some(2));
    }

    #[test]
    fn default_criteria_cover_each_named_file() {
        let outputs = vec![
            ClaimedOutput::file("src/feature.py"),
            ClaimedOutput {
                kind: OutputKind::Endpoint,
                path: "http://localhost/api".into(),
                description: String::new(),
            },
            ClaimedOutput::file("  "),
        ];

        let criteria = default_criteria_for(&outputs);

        let kinds: Vec<_> = criteria.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CriterionKind::FileExists,
                CriterionKind::FileNotEmpty,
                CriterionKind::NoPlaceholders,
            ]
        );
        assert!(criteria.iter().all(|c| c.target == "src/feature.py"));
    }
}
