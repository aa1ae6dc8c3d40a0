//! Runs staticcheck and parses its line-delimited JSON output.

use std::fmt;

use serde::Deserialize;

use crate::report::StaticIssue;

use super::{derive_package_from_file, Engine, WorkflowError};

/// Parsed staticcheck findings.
#[derive(Debug, Default)]
pub struct StaticcheckSummary {
    pub issues: Vec<StaticIssue>,
}

impl fmt::Display for StaticcheckSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            writeln!(f, "Status: OK")?;
            writeln!(f)?;
            writeln!(f, "No staticcheck issues found.")?;
            return Ok(());
        }

        writeln!(f, "Status: {} issues found", self.issues.len())?;
        writeln!(f)?;
        for issue in &self.issues {
            writeln!(
                f,
                "{}:{}:{} ({}): {}",
                issue.file, issue.line, issue.col, issue.code, issue.message
            )?;
        }
        Ok(())
    }
}

impl Engine {
    pub(crate) async fn run_staticcheck(
        &self,
        pkgs: &[String],
    ) -> Result<StaticcheckSummary, WorkflowError> {
        let mut argv = self.resolver.resolve("staticcheck").await?;

        argv.extend(["-f".to_string(), "json".to_string()]);
        if !self.config.staticcheck.checks.is_empty() {
            argv.extend([
                "-checks".to_string(),
                self.config.staticcheck.checks.join(","),
            ]);
        }
        argv.extend(self.config.staticcheck.args.iter().cloned());
        argv.extend_from_slice(pkgs);

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "staticcheck".to_string(),
                source,
            })?;

        Ok(parse_staticcheck_output(&result.stdout))
    }
}

/// One JSON line from `staticcheck -f json`.
#[derive(Debug, Deserialize)]
struct StaticcheckEvent {
    #[serde(default)]
    code: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    location: Location,
    #[serde(default)]
    end: Location,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

/// Parses a staticcheck JSON stream. Records with an empty code and
/// malformed lines are skipped.
pub fn parse_staticcheck_output(data: &[u8]) -> StaticcheckSummary {
    let mut summary = StaticcheckSummary::default();

    for line in String::from_utf8_lossy(data).lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(ev) = serde_json::from_str::<StaticcheckEvent>(line) else {
            continue;
        };
        if ev.code.is_empty() {
            continue;
        }

        summary.issues.push(StaticIssue {
            package: derive_package_from_file(&ev.location.file),
            file: ev.location.file,
            line: ev.location.line,
            col: ev.location.column,
            end_line: ev.end.line,
            end_col: ev.end.column,
            code: ev.code,
            severity: ev.severity,
            message: ev.message,
        });
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_events() {
        let input = concat!(
            r#"{"code":"SA4006","severity":"warning","message":"value never read","location":{"file":"pkg/a/a.go","line":12,"column":3},"end":{"file":"pkg/a/a.go","line":12,"column":9}}"#,
            "\n",
            r#"{"code":"","severity":"ignored","message":"no code"}"#,
            "\n",
            "garbage line\n",
        );
        let s = parse_staticcheck_output(input.as_bytes());
        assert_eq!(s.issues.len(), 1);
        let issue = &s.issues[0];
        assert_eq!(issue.code, "SA4006");
        assert_eq!(issue.package, "pkg/a");
        assert_eq!(issue.line, 12);
        assert_eq!(issue.end_col, 9);
    }

    #[test]
    fn empty_input() {
        assert!(parse_staticcheck_output(b"").issues.is_empty());
    }

    #[test]
    fn display_lists_issues() {
        let input = r#"{"code":"ST1005","severity":"warning","message":"error strings","location":{"file":"x.go","line":4,"column":1}}"#;
        let s = parse_staticcheck_output(input.as_bytes());
        let out = s.to_string();
        assert!(out.contains("Status: 1 issues found"));
        assert!(out.contains("x.go:4:1 (ST1005): error strings"));
    }
}
