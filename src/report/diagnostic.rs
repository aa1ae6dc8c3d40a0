//! The flattened diagnostic view over a [`RunResult`], and the
//! Go-qualified symbol queries built on it.

use super::RunResult;

/// A uniform projection of any typed finding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostic {
    /// "format", "build", "test", "lint", "staticcheck", "coverage",
    /// "complexity", "deadcode", "dupl", or "vulncheck".
    pub source: &'static str,
    pub package: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
    /// e.g. "TestAdd" for test failures, the function name for coverage.
    pub symbol: String,
    /// Linter name, staticcheck code, OSV id, etc.
    pub detail: String,
    pub message: String,
    /// Full test output (test failures only).
    pub output: String,
}

/// Returns all diagnostics for a given package import path.
pub fn by_package(result: &RunResult, pkg: &str) -> Vec<Diagnostic> {
    to_diagnostics(result)
        .into_iter()
        .filter(|d| d.package == pkg)
        .collect()
}

/// Returns diagnostics matching a Go-qualified symbol. If `sym` contains
/// a "." after the last "/" segment it is treated as package.Symbol
/// (e.g. "example.com/foo.TestAdd"); otherwise it is a bare package path
/// and all of the package's diagnostics are returned.
pub fn by_symbol(result: &RunResult, sym: &str) -> Vec<Diagnostic> {
    let (pkg, name) = split_symbol(sym);
    if name.is_empty() {
        return by_package(result, pkg);
    }
    to_diagnostics(result)
        .into_iter()
        .filter(|d| d.package == pkg && d.symbol == name)
        .collect()
}

/// Splits a Go-qualified symbol into package path and symbol name.
/// "example.com/foo.TestAdd" → ("example.com/foo", "TestAdd")
/// "example.com/foo" → ("example.com/foo", "")
pub fn split_symbol(sym: &str) -> (&str, &str) {
    let after_slash = sym.rfind('/').map(|i| i + 1).unwrap_or(0);
    match sym[after_slash..].find('.') {
        None => (sym, ""),
        Some(dot) => (&sym[..after_slash + dot], &sym[after_slash + dot + 1..]),
    }
}

/// Flattens every typed record into exactly one [`Diagnostic`], in
/// record-list order.
pub fn to_diagnostics(r: &RunResult) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    for f in &r.format_issues {
        out.push(Diagnostic {
            source: "format",
            package: f.package.clone(),
            file: f.file.clone(),
            message: f.message.clone(),
            ..Diagnostic::default()
        });
    }
    for b in &r.build_errors {
        out.push(Diagnostic {
            source: "build",
            package: b.package.clone(),
            file: b.file.clone(),
            line: b.line,
            col: b.col,
            message: b.message.clone(),
            ..Diagnostic::default()
        });
    }
    for t in &r.test_failures {
        out.push(Diagnostic {
            source: "test",
            package: t.package.clone(),
            file: t.file.clone(),
            line: t.line,
            symbol: t.test.clone(),
            message: t.message.clone(),
            output: t.output.clone(),
            ..Diagnostic::default()
        });
    }
    for l in &r.lint_issues {
        out.push(Diagnostic {
            source: "lint",
            package: l.package.clone(),
            file: l.file.clone(),
            line: l.line,
            col: l.col,
            detail: l.linter.clone(),
            message: l.message.clone(),
            ..Diagnostic::default()
        });
    }
    for s in &r.static_issues {
        out.push(Diagnostic {
            source: "staticcheck",
            package: s.package.clone(),
            file: s.file.clone(),
            line: s.line,
            col: s.col,
            detail: s.code.clone(),
            message: s.message.clone(),
            ..Diagnostic::default()
        });
    }

    for c in &r.coverage {
        out.push(Diagnostic {
            source: "coverage",
            package: c.package.clone(),
            file: c.file.clone(),
            symbol: c.function.clone(),
            message: format!("{:.1}% coverage", c.coverage),
            ..Diagnostic::default()
        });
    }
    for c in &r.complexity {
        out.push(Diagnostic {
            source: "complexity",
            package: c.package.clone(),
            file: c.file.clone(),
            line: c.line,
            symbol: c.function.clone(),
            message: format!("cognitive complexity {}", c.complexity),
            ..Diagnostic::default()
        });
    }
    for d in &r.dead_funcs {
        out.push(Diagnostic {
            source: "deadcode",
            package: d.package.clone(),
            file: d.file.clone(),
            line: d.line,
            symbol: d.function.clone(),
            message: "unreachable function".to_string(),
            ..Diagnostic::default()
        });
    }
    for d in &r.duplicates {
        out.push(Diagnostic {
            source: "dupl",
            file: d.file_1.clone(),
            line: d.start_line_1,
            message: format!(
                "duplicate of {}:{}-{} ({} tokens)",
                d.file_2, d.start_line_2, d.end_line_2, d.tokens
            ),
            ..Diagnostic::default()
        });
    }
    for v in &r.vulns {
        let mut message = v.summary.clone();
        if !v.fixed_version.is_empty() {
            message.push_str(&format!(" (fixed in {})", v.fixed_version));
        }
        out.push(Diagnostic {
            source: "vulncheck",
            package: v.affected_package.clone(),
            detail: v.id.clone(),
            message,
            ..Diagnostic::default()
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{
        ComplexityEntry, CoverageEntry, Kind, LintIssue, TestFailure,
    };

    fn sample() -> RunResult {
        let mut rr = RunResult::new("run", Kind::Check);
        rr.test_failures.push(TestFailure {
            package: "example.com/foo".to_string(),
            test: "TestAdd".to_string(),
            file: String::new(),
            line: 0,
            message: "expected 4, got 5".to_string(),
            output: "--- FAIL: TestAdd\nexpected 4, got 5\n".to_string(),
        });
        rr.lint_issues.push(LintIssue {
            package: "example.com/bar".to_string(),
            file: "bar.go".to_string(),
            line: 10,
            col: 5,
            linter: "errcheck".to_string(),
            message: "unchecked error".to_string(),
        });
        rr
    }

    #[test]
    fn split_symbol_forms() {
        assert_eq!(
            split_symbol("example.com/foo.TestAdd"),
            ("example.com/foo", "TestAdd")
        );
        assert_eq!(split_symbol("example.com/foo"), ("example.com/foo", ""));
        assert_eq!(split_symbol("pkg.TestB"), ("pkg", "TestB"));
        assert_eq!(split_symbol("pkg"), ("pkg", ""));
        assert_eq!(
            split_symbol("example.com/a/b.T.Method"),
            ("example.com/a/b", "T.Method")
        );
    }

    #[test]
    fn split_symbol_join_inverts() {
        for sym in ["example.com/foo.TestAdd", "pkg", "a/b/c.X"] {
            let (pkg, name) = split_symbol(sym);
            let joined = if name.is_empty() {
                pkg.to_string()
            } else {
                format!("{pkg}.{name}")
            };
            assert_eq!(joined, sym);
        }
    }

    #[test]
    fn by_package_filters() {
        let rr = sample();
        let ds = by_package(&rr, "example.com/foo");
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].source, "test");
        assert_eq!(ds[0].symbol, "TestAdd");
    }

    #[test]
    fn by_symbol_filters_on_name() {
        let rr = sample();
        let ds = by_symbol(&rr, "example.com/foo.TestAdd");
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].message, "expected 4, got 5");

        assert!(by_symbol(&rr, "example.com/foo.TestOther").is_empty());
    }

    #[test]
    fn bare_package_returns_all() {
        let rr = sample();
        let ds = by_symbol(&rr, "example.com/bar");
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].detail, "errcheck");
    }

    #[test]
    fn flattening_is_total() {
        let mut rr = sample();
        rr.coverage.push(CoverageEntry {
            package: "p".to_string(),
            file: "f.go".to_string(),
            function: "F".to_string(),
            coverage: 50.0,
        });
        rr.complexity.push(ComplexityEntry {
            package: "p".to_string(),
            file: "f.go".to_string(),
            function: "F".to_string(),
            line: 3,
            complexity: 12,
        });

        let ds = to_diagnostics(&rr);
        assert_eq!(ds.len(), 4);
        assert_eq!(ds[0].source, "test");
        assert_eq!(ds[1].source, "lint");
        assert_eq!(ds[2].source, "coverage");
        assert_eq!(ds[2].message, "50.0% coverage");
        assert_eq!(ds[3].message, "cognitive complexity 12");
    }
}
