//! Structured persistence and retrieval of tool run results.
//!
//! Results are stored as typed records and can be queried by package or
//! by Go-qualified symbol. The store is two-tier: an in-memory LRU in
//! front of a disk-backed JSON store keyed by run identifier.

mod diagnostic;
mod disk;
mod lru;
mod store;

pub use diagnostic::{by_package, by_symbol, split_symbol, to_diagnostics, Diagnostic};
pub use disk::DiskStore;
pub use lru::LruStore;
pub use store::{Store, StoreError};

use serde::{Deserialize, Serialize};

/// Identifies the type of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// A check run (test, lint, staticcheck).
    Check,
    /// An audit run (coverage, complexity, deadcode, dupl, vulncheck).
    Audit,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Check => f.write_str("check"),
            Kind::Audit => f.write_str("audit"),
        }
    }
}

/// The structured output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: String,
    pub kind: Kind,

    // Check fields.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub auto_fixes: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format_issues: Vec<FormatIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_errors: Vec<BuildError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_failures: Vec<TestFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lint_issues: Vec<LintIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_issues: Vec<StaticIssue>,

    // Audit fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coverage: Vec<CoverageEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub complexity: Vec<ComplexityEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dead_funcs: Vec<DeadFunc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<Duplicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulns: Vec<Vuln>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl RunResult {
    pub fn new(id: impl Into<String>, kind: Kind) -> Self {
        RunResult {
            id: id.into(),
            kind,
            auto_fixes: 0,
            format_issues: Vec::new(),
            build_errors: Vec::new(),
            test_failures: Vec::new(),
            lint_issues: Vec::new(),
            static_issues: Vec::new(),
            coverage: Vec::new(),
            complexity: Vec::new(),
            dead_funcs: Vec::new(),
            duplicates: Vec::new(),
            vulns: Vec::new(),
        }
    }

    /// Returns an error if the run's kind does not match `want`.
    pub fn expect(&self, want: Kind) -> Result<(), StoreError> {
        if self.kind != want {
            return Err(StoreError::KindMismatch {
                id: self.id.clone(),
                got: self.kind,
                want,
            });
        }
        Ok(())
    }
}

/// An unformatted file detected by the formatter in list mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatIssue {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    pub file: String,
    pub message: String,
}

/// A compilation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildError {
    pub package: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub line: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub col: u32,
    pub message: String,
}

/// A failed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFailure {
    pub package: String,
    pub test: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub line: u32,
    /// First meaningful line of the failure output.
    pub message: String,
    /// Full captured output of the test.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// A linter finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintIssue {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub linter: String,
    pub message: String,
}

/// A staticcheck finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticIssue {
    pub package: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub end_col: u32,
    pub code: String,
    pub severity: String,
    pub message: String,
}

/// Per-function test coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub package: String,
    pub file: String,
    pub function: String,
    /// Percentage in [0, 100].
    pub coverage: f64,
}

/// Per-function cognitive complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityEntry {
    pub package: String,
    pub file: String,
    pub function: String,
    pub line: u32,
    pub complexity: u32,
}

/// An unreachable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadFunc {
    pub package: String,
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// A pair of duplicated code blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duplicate {
    pub file_1: String,
    pub start_line_1: u32,
    pub end_line_1: u32,
    pub file_2: String,
    pub start_line_2: u32,
    pub end_line_2: u32,
    pub tokens: u32,
}

/// A vulnerability with called symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vuln {
    /// e.g. GO-2024-1234
    pub id: String,
    pub summary: String,
    pub affected_package: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fixed_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
}
