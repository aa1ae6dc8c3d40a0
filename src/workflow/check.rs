//! The check pipeline: optional fix phase, then configured steps
//! (test, lint, staticcheck) in sequence, stopping on first failure.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::report::{BuildError, Kind, RunResult, TestFailure};

use super::{derive_package_from_file, Engine, TestStatus, WorkflowError};

/// `failed_idx` sentinel: format issues short-circuited the pipeline
/// before any step ran.
pub const FORMAT_FAILURE: i32 = -2;

/// The full outcome of a check run.
#[derive(Debug)]
pub struct CheckResult {
    pub run_result: RunResult,
    pub steps: Vec<StepResult>,
    /// -1 if all passed, [`FORMAT_FAILURE`] for the format sentinel,
    /// otherwise the zero-based index of the failed step.
    pub failed_idx: i32,
}

/// The outcome of a single check step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    /// Extra info (e.g. "golangci-lint not found").
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    /// Summary from the underlying tool (only on failure).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

impl StepResult {
    fn skipped(name: &str) -> Self {
        StepResult {
            name: name.to_string(),
            status: StepStatus::Skipped,
            detail: String::new(),
            output: String::new(),
        }
    }

    fn pass(name: &str) -> Self {
        StepResult {
            status: StepStatus::Pass,
            ..StepResult::skipped(name)
        }
    }

    fn fail(name: &str, output: String) -> Self {
        StepResult {
            status: StepStatus::Fail,
            output,
            ..StepResult::skipped(name)
        }
    }

    fn unavailable(name: &str, detail: String) -> Self {
        StepResult {
            status: StepStatus::Unavailable,
            detail,
            ..StepResult::skipped(name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pass,
    Fail,
    Skipped,
    Unavailable,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pass => f.write_str("pass"),
            StepStatus::Fail => f.write_str("fail"),
            StepStatus::Skipped => f.write_str("skipped"),
            StepStatus::Unavailable => f.write_str("unavailable"),
        }
    }
}

impl Engine {
    /// Runs the full check pipeline. When `fix` is true the fix phase
    /// rewrites files first; when false, unformatted files short-circuit
    /// the pipeline with the format sentinel before any step runs.
    pub async fn check(&self, packages: &[String], fix: bool) -> CheckResult {
        let run_id = Uuid::new_v4().to_string();
        let pkgs = self.resolve_packages(packages);

        let mut rr = RunResult::new(run_id, Kind::Check);

        let fix_res = self.run_fix_phase(fix).await;
        rr.auto_fixes = fix_res.auto_fixes;
        rr.format_issues = fix_res.format_issues;

        if !fix && !rr.format_issues.is_empty() {
            return CheckResult {
                run_result: rr,
                steps: Vec::new(),
                failed_idx: FORMAT_FAILURE,
            };
        }

        let steps = self.config.check_steps();
        let mut results: Vec<StepResult> =
            steps.iter().map(|step| StepResult::skipped(step)).collect();

        let mut failed_idx: i32 = -1;
        for (i, step) in steps.iter().enumerate() {
            results[i] = match step.as_str() {
                "test" => self.check_test(&pkgs, &mut rr).await,
                "lint" => self.check_lint(&pkgs, &mut rr).await,
                "staticcheck" => self.check_staticcheck(&pkgs, &mut rr).await,
                unknown => StepResult::fail(unknown, format!("unknown step: {unknown}")),
            };

            if results[i].status != StepStatus::Pass {
                failed_idx = i as i32;
                break;
            }
        }

        CheckResult {
            run_result: rr,
            steps: results,
            failed_idx,
        }
    }

    async fn check_test(&self, pkgs: &[String], rr: &mut RunResult) -> StepResult {
        let summary = match self.run_test(pkgs).await {
            Ok(summary) => summary,
            Err(err) => return StepResult::fail("test", err.to_string()),
        };

        if summary.status == TestStatus::Pass {
            return StepResult::pass("test");
        }

        for f in &summary.failures {
            rr.test_failures.push(TestFailure {
                package: f.package.clone(),
                test: f.test.clone(),
                file: String::new(),
                line: 0,
                message: first_line(&f.output),
                output: f.output.clone(),
            });
        }
        for be in &summary.build_errors {
            rr.build_errors.push(BuildError {
                package: be.import_path.clone(),
                file: String::new(),
                line: 0,
                col: 0,
                message: be.output.clone(),
            });
        }
        StepResult::fail("test", summary.to_string())
    }

    async fn check_lint(&self, pkgs: &[String], rr: &mut RunResult) -> StepResult {
        let summary = match self.run_lint(pkgs).await {
            Ok(summary) => summary,
            Err(WorkflowError::ToolUnavailable(err)) => {
                return StepResult::unavailable("lint", err.to_string());
            }
            Err(err) => return StepResult::fail("lint", err.to_string()),
        };

        if summary.issues.is_empty() {
            return StepResult::pass("lint");
        }
        let output = summary.to_string();
        rr.lint_issues.extend(summary.issues);
        StepResult::fail("lint", output)
    }

    async fn check_staticcheck(&self, pkgs: &[String], rr: &mut RunResult) -> StepResult {
        let summary = match self.run_staticcheck(pkgs).await {
            Ok(summary) => summary,
            Err(WorkflowError::ToolUnavailable(err)) => {
                return StepResult::unavailable("staticcheck", err.to_string());
            }
            Err(err) => return StepResult::fail("staticcheck", err.to_string()),
        };

        if summary.issues.is_empty() {
            return StepResult::pass("staticcheck");
        }
        let output = summary.to_string();
        rr.static_issues.extend(summary.issues);
        StepResult::fail("staticcheck", output)
    }
}

/// Returns the first non-empty line of `s`, trimmed, skipping test
/// framework boilerplate.
pub fn first_line(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty() && !line.starts_with("=== RUN") && !line.starts_with("--- FAIL")
        })
        .unwrap_or_default()
        .to_string()
}

/// Builds Go-qualified symbol references for a run's failures, for
/// drill-down hints.
pub fn format_failure_symbols(rr: &RunResult) -> Vec<String> {
    let mut out = Vec::new();

    for f in &rr.test_failures {
        let msg = if f.message.is_empty() {
            "test failed"
        } else {
            &f.message
        };
        out.push(format!("{}.{} — {}", f.package, f.test, msg));
    }

    let mut build_pkgs: BTreeMap<&str, usize> = BTreeMap::new();
    for be in &rr.build_errors {
        *build_pkgs.entry(&be.package).or_default() += 1;
    }
    for (pkg, count) in build_pkgs {
        out.push(format!("{pkg} — {count} build errors"));
    }

    let mut lint_pkgs: BTreeMap<String, usize> = BTreeMap::new();
    for li in &rr.lint_issues {
        let pkg = if li.package.is_empty() {
            derive_package_from_file(&li.file)
        } else {
            li.package.clone()
        };
        *lint_pkgs.entry(pkg).or_default() += 1;
    }
    for (pkg, count) in lint_pkgs {
        out.push(format!("{pkg} — {count} lint issues"));
    }

    let mut sc_pkgs: BTreeMap<&str, usize> = BTreeMap::new();
    for si in &rr.static_issues {
        *sc_pkgs.entry(&si.package).or_default() += 1;
    }
    for (pkg, count) in sc_pkgs {
        out.push(format!("{pkg} — {count} staticcheck issues"));
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::config::{CheckConfig, Config};
    use crate::report::LintIssue;
    use crate::runner::RunOutput;
    use crate::workflow::testutil::{FakeResolver, FakeRunner};

    fn passing_test_json() -> Vec<u8> {
        br#"{"Action":"pass","Package":"example.com/foo","Test":"TestAdd"}"#.to_vec()
    }

    fn failing_test_json() -> Vec<u8> {
        [
            r#"{"Action":"output","Package":"example.com/foo","Test":"TestAdd","Output":"expected 4, got 5\n"}"#,
            r#"{"Action":"fail","Package":"example.com/foo","Test":"TestAdd"}"#,
            r#"{"Action":"fail","Package":"example.com/foo"}"#,
        ]
        .join("\n")
        .into_bytes()
    }

    fn check_engine(steps: &[&str], runner: FakeRunner, tools: &[&str]) -> Engine {
        let config = Config {
            check: CheckConfig {
                steps: steps.iter().map(|s| s.to_string()).collect(),
            },
            ..Config::default()
        };
        Engine::new(config, Arc::new(runner), "/project", "/project").with_resolver(Arc::new(
            FakeResolver {
                available: tools.iter().map(|t| t.to_string()).collect(),
            },
        ))
    }

    #[tokio::test]
    async fn all_pass() {
        let runner = FakeRunner {
            results: HashMap::from([(
                "go test".to_string(),
                RunOutput {
                    stdout: passing_test_json(),
                    ..RunOutput::default()
                },
            )]),
            ..FakeRunner::default()
        };
        let e = check_engine(&["test"], runner, &[]);

        let result = e.check(&[], false).await;
        assert_eq!(result.failed_idx, -1);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].status, StepStatus::Pass);
        assert!(result.run_result.test_failures.is_empty());
        assert!(result.run_result.build_errors.is_empty());
        assert!(result.run_result.lint_issues.is_empty());
        assert!(result.run_result.static_issues.is_empty());
    }

    #[tokio::test]
    async fn test_failure_halts_pipeline() {
        let runner = FakeRunner {
            results: HashMap::from([(
                "go test".to_string(),
                RunOutput {
                    exit_code: 1,
                    stdout: failing_test_json(),
                    ..RunOutput::default()
                },
            )]),
            ..FakeRunner::default()
        };
        let e = check_engine(&["test", "lint"], runner, &["golangci-lint"]);

        let result = e.check(&[], false).await;
        assert_eq!(result.failed_idx, 0);
        assert_eq!(result.steps[0].status, StepStatus::Fail);
        assert_eq!(result.steps[1].status, StepStatus::Skipped);

        assert_eq!(result.run_result.test_failures.len(), 1);
        let failure = &result.run_result.test_failures[0];
        assert_eq!(failure.test, "TestAdd");
        assert_eq!(failure.message, "expected 4, got 5");
        assert!(failure.output.contains("expected 4, got 5"));
    }

    #[tokio::test]
    async fn unknown_step_fails() {
        let runner = FakeRunner {
            results: HashMap::from([(
                "go test".to_string(),
                RunOutput {
                    stdout: passing_test_json(),
                    ..RunOutput::default()
                },
            )]),
            ..FakeRunner::default()
        };
        let e = check_engine(&["test", "bogus"], runner, &[]);

        let result = e.check(&[], false).await;
        assert_eq!(result.failed_idx, 1);
        assert!(result.steps[1].output.contains("unknown step"));
    }

    #[tokio::test]
    async fn missing_lint_tool_is_unavailable() {
        let runner = FakeRunner {
            results: HashMap::from([(
                "go test".to_string(),
                RunOutput {
                    stdout: passing_test_json(),
                    ..RunOutput::default()
                },
            )]),
            ..FakeRunner::default()
        };
        let e = check_engine(&["test", "lint", "staticcheck"], runner, &[]);

        let result = e.check(&[], false).await;
        assert_eq!(result.failed_idx, 1);
        assert_eq!(result.steps[1].status, StepStatus::Unavailable);
        assert!(result.steps[1].detail.contains("golangci-lint"));
        assert_eq!(result.steps[2].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn format_issues_short_circuit_without_fix() {
        let runner = FakeRunner {
            results: HashMap::from([(
                "gofumpt".to_string(),
                RunOutput {
                    stdout: b"main.go\n".to_vec(),
                    ..RunOutput::default()
                },
            )]),
            ..FakeRunner::default()
        };
        let e = check_engine(&["test"], runner, &["gofumpt"]);

        let result = e.check(&[], false).await;
        assert_eq!(result.failed_idx, FORMAT_FAILURE);
        assert!(result.steps.is_empty());
        assert_eq!(result.run_result.format_issues.len(), 1);
    }

    #[tokio::test]
    async fn lint_issues_recorded() {
        let lint_json = br#"{"Issues":[{"FromLinter":"errcheck","Text":"unchecked","Pos":{"Filename":"pkg/foo/a.go","Line":3,"Column":1}}]}"#;
        let runner = FakeRunner {
            results: HashMap::from([(
                "golangci-lint".to_string(),
                RunOutput {
                    exit_code: 1,
                    stdout: lint_json.to_vec(),
                    ..RunOutput::default()
                },
            )]),
            ..FakeRunner::default()
        };
        let e = check_engine(&["lint"], runner, &["golangci-lint"]);

        let result = e.check(&[], false).await;
        assert_eq!(result.failed_idx, 0);
        assert_eq!(result.run_result.lint_issues.len(), 1);
    }

    #[test]
    fn first_line_skips_framework_markers() {
        assert_eq!(
            first_line("=== RUN TestA\n--- FAIL: TestA\nexpected 4, got 5\n"),
            "expected 4, got 5"
        );
        assert_eq!(first_line("\n\n"), "");
    }

    #[test]
    fn failure_symbols() {
        let mut rr = RunResult::new("r", Kind::Check);
        rr.test_failures.push(TestFailure {
            package: "example.com/foo".to_string(),
            test: "TestAdd".to_string(),
            file: String::new(),
            line: 0,
            message: "boom".to_string(),
            output: String::new(),
        });
        rr.lint_issues.push(LintIssue {
            package: String::new(),
            file: "pkg/foo/a.go".to_string(),
            line: 1,
            col: 1,
            linter: "errcheck".to_string(),
            message: "unchecked".to_string(),
        });

        let symbols = format_failure_symbols(&rr);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0], "example.com/foo.TestAdd — boom");
        assert_eq!(symbols[1], "pkg/foo — 1 lint issues");
    }
}
