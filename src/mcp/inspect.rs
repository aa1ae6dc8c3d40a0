//! Drill-down formatting for the inspect tool.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::report::{Diagnostic, Kind};

/// Formats the diagnostics matched by a qualified symbol, grouped the
/// way an agent wants to read them: header, per-file locations, then
/// full test output when present.
pub fn format_inspect_output(
    run_id: &str,
    kind: Kind,
    symbol: &str,
    diagnostics: &[Diagnostic],
) -> String {
    let mut b = String::new();

    let _ = writeln!(b, "Run: {run_id} ({kind})");

    if diagnostics.len() == 1 && diagnostics[0].source == "test" {
        let _ = writeln!(b, "{symbol} — FAIL");
    } else {
        let mut sources: BTreeMap<&str, usize> = BTreeMap::new();
        for d in diagnostics {
            *sources.entry(d.source).or_default() += 1;
        }
        let parts: Vec<String> = sources
            .iter()
            .map(|(source, count)| format!("{count} {source}"))
            .collect();
        let _ = writeln!(b, "{symbol} — {}:", parts.join(", "));
    }
    let _ = writeln!(b);

    // Group by file, keyed by first appearance, so all of a file's
    // diagnostics print together regardless of source interleaving.
    let mut groups: Vec<(&str, Vec<&Diagnostic>)> = Vec::new();
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for d in diagnostics {
        let file = if d.file.is_empty() {
            "(unknown)"
        } else {
            d.file.as_str()
        };
        match seen.get(file) {
            Some(&idx) => groups[idx].1.push(d),
            None => {
                seen.insert(file, groups.len());
                groups.push((file, vec![d]));
            }
        }
    }

    for (_, group) in &groups {
        for d in group {
            if d.line > 0 {
                if d.col > 0 {
                    let _ = write!(b, "{}:{}:{}: ", d.file, d.line, d.col);
                } else {
                    let _ = write!(b, "{}:{}: ", d.file, d.line);
                }
            } else if !d.file.is_empty() {
                let _ = write!(b, "{}: ", d.file);
            }

            let tag = if d.detail.is_empty() {
                d.source.to_string()
            } else {
                format!("{}/{}", d.source, d.detail)
            };
            let _ = writeln!(b, "[{tag}] {}", d.message);
        }
    }

    for d in diagnostics {
        if d.source == "test" && !d.output.is_empty() {
            let _ = writeln!(b);
            let _ = writeln!(b, "Output:");
            for line in d.output.trim_end_matches('\n').split('\n') {
                let _ = writeln!(b, "    {line}");
            }
        }
    }

    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_test_failure_header() {
        let diagnostics = vec![Diagnostic {
            source: "test",
            package: "example.com/foo".to_string(),
            symbol: "TestAdd".to_string(),
            message: "expected 4, got 5".to_string(),
            output: "--- FAIL: TestAdd\nexpected 4, got 5\n".to_string(),
            ..Diagnostic::default()
        }];

        let out = format_inspect_output("run-1", Kind::Check, "example.com/foo.TestAdd", &diagnostics);
        assert!(out.contains("Run: run-1 (check)"));
        assert!(out.contains("example.com/foo.TestAdd — FAIL"));
        assert!(out.contains("[test] expected 4, got 5"));
        assert!(out.contains("Output:"));
        assert!(out.contains("    --- FAIL: TestAdd"));
    }

    #[test]
    fn mixed_sources_header_counts() {
        let diagnostics = vec![
            Diagnostic {
                source: "lint",
                file: "a.go".to_string(),
                line: 3,
                col: 1,
                detail: "errcheck".to_string(),
                message: "unchecked".to_string(),
                ..Diagnostic::default()
            },
            Diagnostic {
                source: "staticcheck",
                file: "a.go".to_string(),
                line: 9,
                col: 2,
                detail: "SA4006".to_string(),
                message: "never read".to_string(),
                ..Diagnostic::default()
            },
        ];

        let out = format_inspect_output("run-2", Kind::Check, "example.com/foo", &diagnostics);
        assert!(out.contains("example.com/foo — 1 lint, 1 staticcheck:"));
        assert!(out.contains("a.go:3:1: [lint/errcheck] unchecked"));
        assert!(out.contains("a.go:9:2: [staticcheck/SA4006] never read"));
    }

    #[test]
    fn diagnostics_grouped_by_file_in_first_seen_order() {
        // Flattening emits all lint records before staticcheck ones, so
        // a.go's two findings arrive interleaved with b.go's.
        let diagnostics = vec![
            Diagnostic {
                source: "lint",
                file: "a.go".to_string(),
                line: 3,
                col: 1,
                detail: "errcheck".to_string(),
                message: "unchecked".to_string(),
                ..Diagnostic::default()
            },
            Diagnostic {
                source: "lint",
                file: "b.go".to_string(),
                line: 8,
                col: 4,
                detail: "govet".to_string(),
                message: "shadow".to_string(),
                ..Diagnostic::default()
            },
            Diagnostic {
                source: "staticcheck",
                file: "a.go".to_string(),
                line: 12,
                col: 2,
                detail: "SA4006".to_string(),
                message: "never read".to_string(),
                ..Diagnostic::default()
            },
        ];

        let out = format_inspect_output("run-4", Kind::Check, "example.com/foo", &diagnostics);
        let a_lint = out.find("a.go:3:1: [lint/errcheck]").unwrap();
        let a_static = out.find("a.go:12:2: [staticcheck/SA4006]").unwrap();
        let b_lint = out.find("b.go:8:4: [lint/govet]").unwrap();
        assert!(a_lint < a_static, "a.go diagnostics print together:\n{out}");
        assert!(a_static < b_lint, "b.go follows all of a.go:\n{out}");
    }

    #[test]
    fn line_without_column() {
        let diagnostics = vec![Diagnostic {
            source: "complexity",
            file: "f.go".to_string(),
            line: 7,
            symbol: "F".to_string(),
            message: "cognitive complexity 19".to_string(),
            ..Diagnostic::default()
        }];

        let out = format_inspect_output("run-3", Kind::Audit, "p.F", &diagnostics);
        assert!(out.contains("f.go:7: [complexity] cognitive complexity 19"));
    }
}
