//! Runs golangci-lint and parses its JSON report.

use std::fmt;

use serde::Deserialize;

use crate::report::LintIssue;

use super::{Engine, WorkflowError};

/// Parsed linter findings.
#[derive(Debug, Default)]
pub struct LintSummary {
    pub issues: Vec<LintIssue>,
}

impl fmt::Display for LintSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            writeln!(f, "Status: OK")?;
            writeln!(f)?;
            writeln!(f, "No lint issues found.")?;
            return Ok(());
        }

        writeln!(f, "Status: {} issues found", self.issues.len())?;
        writeln!(f)?;
        for issue in &self.issues {
            writeln!(
                f,
                "{}:{}:{} ({}): {}",
                issue.file, issue.line, issue.col, issue.linter, issue.message
            )?;
        }
        Ok(())
    }
}

impl Engine {
    pub(crate) async fn run_lint(&self, pkgs: &[String]) -> Result<LintSummary, WorkflowError> {
        let mut argv = self.resolver.resolve("golangci-lint").await?;

        argv.extend(["run".to_string(), "--out-format".to_string(), "json".to_string()]);
        if !self.config.lint.config.is_empty() {
            argv.extend(["--config".to_string(), self.config.lint.config.clone()]);
        }
        argv.extend(self.config.lint.args.iter().cloned());
        argv.extend_from_slice(pkgs);

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "golangci-lint".to_string(),
                source,
            })?;

        Ok(parse_lint_output(&result.stdout))
    }
}

/// Top-level JSON report from golangci-lint.
#[derive(Debug, Default, Deserialize)]
struct LintReport {
    #[serde(rename = "Issues", default)]
    issues: Vec<ReportIssue>,
}

#[derive(Debug, Deserialize)]
struct ReportIssue {
    #[serde(rename = "FromLinter", default)]
    from_linter: String,
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "Pos", default)]
    pos: ReportPos,
}

#[derive(Debug, Default, Deserialize)]
struct ReportPos {
    #[serde(rename = "Filename", default)]
    filename: String,
    #[serde(rename = "Line", default)]
    line: u32,
    #[serde(rename = "Column", default)]
    column: u32,
}

/// Parses the linter's JSON report. Invalid JSON yields an empty summary.
pub fn parse_lint_output(stdout: &[u8]) -> LintSummary {
    let Ok(report) = serde_json::from_slice::<LintReport>(stdout) else {
        return LintSummary::default();
    };

    LintSummary {
        issues: report
            .issues
            .into_iter()
            .map(|issue| LintIssue {
                package: String::new(),
                file: issue.pos.filename,
                line: issue.pos.line,
                col: issue.pos.column,
                linter: issue.from_linter,
                message: issue.text,
            })
            .collect(),
    }
}
