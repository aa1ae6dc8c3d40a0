//! The audit pipeline: coverage, complexity, deadcode, dupl, vulncheck.
//! Unlike check, audit never stops early; every configured step runs.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::report::{Kind, RunResult};

use super::vulncheck::format_vulncheck_summary;
use super::{
    format_complexity_summary, format_coverage_summary, format_deadcode_summary,
    format_dupl_summary, Engine, WorkflowError,
};

/// The full outcome of an audit run.
#[derive(Debug)]
pub struct AuditResult {
    pub run_result: RunResult,
    pub steps: Vec<AuditStepResult>,
}

/// The outcome of a single audit step.
#[derive(Debug, Clone, Serialize)]
pub struct AuditStepResult {
    pub name: String,
    pub status: AuditStatus,
    /// Error or unavailability message.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    /// Formatted summary (only when done).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Done,
    Error,
    Unavailable,
    Skipped,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::Done => f.write_str("done"),
            AuditStatus::Error => f.write_str("error"),
            AuditStatus::Unavailable => f.write_str("unavailable"),
            AuditStatus::Skipped => f.write_str("skipped"),
        }
    }
}

impl AuditStepResult {
    fn done(name: &str, output: String) -> Self {
        AuditStepResult {
            name: name.to_string(),
            status: AuditStatus::Done,
            detail: String::new(),
            output,
        }
    }

    fn from_error(name: &str, err: &WorkflowError) -> Self {
        let status = match err {
            WorkflowError::ToolUnavailable(_) => AuditStatus::Unavailable,
            _ => AuditStatus::Error,
        };
        AuditStepResult {
            name: name.to_string(),
            status,
            detail: err.to_string(),
            output: String::new(),
        }
    }
}

impl Engine {
    /// Runs all configured audit steps without stopping on failure. A
    /// missing external tool marks its step unavailable, not failed.
    pub async fn audit(&self, packages: &[String]) -> AuditResult {
        let run_id = Uuid::new_v4().to_string();
        let pkgs = self.resolve_packages(packages);

        let mut rr = RunResult::new(run_id, Kind::Audit);

        let steps = self.config.audit_steps();
        let mut results = Vec::with_capacity(steps.len());

        for step in &steps {
            let result = match step.as_str() {
                "coverage" => match self.run_coverage(&pkgs).await {
                    Ok(entries) => {
                        let output = format_coverage_summary(&entries);
                        rr.coverage = entries;
                        AuditStepResult::done(step, output)
                    }
                    Err(err) => AuditStepResult::from_error(step, &err),
                },
                "complexity" => match self.run_complexity(&pkgs).await {
                    Ok(entries) => {
                        let output = format_complexity_summary(&entries);
                        rr.complexity = entries;
                        AuditStepResult::done(step, output)
                    }
                    Err(err) => AuditStepResult::from_error(step, &err),
                },
                "deadcode" => match self.run_deadcode(&pkgs).await {
                    Ok(funcs) => {
                        let output = format_deadcode_summary(&funcs);
                        rr.dead_funcs = funcs;
                        AuditStepResult::done(step, output)
                    }
                    Err(err) => AuditStepResult::from_error(step, &err),
                },
                "dupl" => match self.run_dupl(&pkgs).await {
                    Ok(duplicates) => {
                        let output = format_dupl_summary(&duplicates);
                        rr.duplicates = duplicates;
                        AuditStepResult::done(step, output)
                    }
                    Err(err) => AuditStepResult::from_error(step, &err),
                },
                "vulncheck" => match self.run_vulncheck(&pkgs).await {
                    Ok(vulns) => {
                        let output = format_vulncheck_summary(&vulns);
                        rr.vulns = vulns;
                        AuditStepResult::done(step, output)
                    }
                    Err(err) => AuditStepResult::from_error(step, &err),
                },
                unknown => AuditStepResult {
                    name: unknown.to_string(),
                    status: AuditStatus::Error,
                    detail: format!("unknown step: {unknown}"),
                    output: String::new(),
                },
            };
            results.push(result);
        }

        AuditResult {
            run_result: rr,
            steps: results,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::config::{AuditConfig, Config};
    use crate::runner::RunOutput;
    use crate::workflow::testutil::{FakeResolver, FakeRunner};

    fn audit_engine(steps: &[&str], runner: FakeRunner, tools: &[&str]) -> Engine {
        let config = Config {
            audit: AuditConfig {
                steps: steps.iter().map(|s| s.to_string()).collect(),
                ..AuditConfig::default()
            },
            ..Config::default()
        };
        Engine::new(config, Arc::new(runner), "/project", "/project").with_resolver(Arc::new(
            FakeResolver {
                available: tools.iter().map(|t| t.to_string()).collect(),
            },
        ))
    }

    fn coverage_runner() -> FakeRunner {
        FakeRunner {
            results: HashMap::from([
                ("go test".to_string(), RunOutput::default()),
                (
                    "go tool".to_string(),
                    RunOutput {
                        stdout: b"example.com/foo/bar.go:12:\tFuncA\t\t75.0%\n".to_vec(),
                        ..RunOutput::default()
                    },
                ),
            ]),
            ..FakeRunner::default()
        }
    }

    #[tokio::test]
    async fn coverage_step_done() {
        let e = audit_engine(&["coverage"], coverage_runner(), &[]);
        let result = e.audit(&[]).await;
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].status, AuditStatus::Done);
        assert_eq!(result.run_result.coverage.len(), 1);
        assert!(result.steps[0].output.contains("Functions: 1"));
    }

    #[tokio::test]
    async fn missing_tool_does_not_halt() {
        let e = audit_engine(&["complexity", "coverage"], coverage_runner(), &[]);
        let result = e.audit(&[]).await;
        assert_eq!(result.steps[0].status, AuditStatus::Unavailable);
        assert!(result.steps[0].detail.contains("gocognit"));
        assert_eq!(result.steps[1].status, AuditStatus::Done);
    }

    #[tokio::test]
    async fn transport_errors_do_not_skip_later_steps() {
        let runner = FakeRunner {
            errors: HashMap::from([("go test".to_string(), "connection refused".to_string())]),
            ..FakeRunner::default()
        };
        let e = audit_engine(&["coverage", "complexity"], runner, &[]);
        let result = e.audit(&[]).await;
        for step in &result.steps {
            assert_ne!(step.status, AuditStatus::Skipped);
            assert_ne!(step.status, AuditStatus::Done);
        }
    }

    #[tokio::test]
    async fn unknown_step_is_error() {
        let e = audit_engine(&["bogus"], FakeRunner::default(), &[]);
        let result = e.audit(&[]).await;
        assert_eq!(result.steps[0].status, AuditStatus::Error);
        assert!(result.steps[0].detail.contains("unknown step"));
    }
}
