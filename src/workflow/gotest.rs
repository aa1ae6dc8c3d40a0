//! Runs `go test -json` and parses its event stream.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use super::{truncate_lines, Engine, WorkflowError};

/// Maximum number of output lines shown per test failure.
const MAX_FAILURE_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pass,
    Fail,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => f.write_str("PASS"),
            TestStatus::Fail => f.write_str("FAIL"),
        }
    }
}

/// Parsed results of one `go test -json` invocation.
#[derive(Debug)]
pub struct TestSummary {
    pub status: TestStatus,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub build_errors: Vec<BuildFailure>,
    pub failures: Vec<FailedTest>,
}

/// A build failure reported by the test driver.
#[derive(Debug)]
pub struct BuildFailure {
    pub import_path: String,
    pub output: String,
}

/// A single failed test with its accumulated output.
#[derive(Debug)]
pub struct FailedTest {
    pub test: String,
    pub package: String,
    pub output: String,
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f)?;

        if self.status == TestStatus::Pass {
            write!(f, "All {} tests passed", self.total)?;
            if self.skipped > 0 {
                write!(f, " ({} skipped)", self.skipped)?;
            }
            writeln!(f, ".")?;
            return Ok(());
        }

        if !self.build_errors.is_empty() {
            writeln!(f, "Build errors:")?;
            for be in &self.build_errors {
                writeln!(f, "  {}:", be.import_path)?;
                for line in truncate_lines(&be.output, MAX_FAILURE_LINES).split('\n') {
                    writeln!(f, "    {line}")?;
                }
            }
            writeln!(f)?;
        }

        if self.failed > 0 {
            writeln!(f, "Failed {} of {} tests.", self.failed, self.total)?;
            writeln!(f)?;

            let mut by_pkg: BTreeMap<&str, Vec<&FailedTest>> = BTreeMap::new();
            for failure in &self.failures {
                by_pkg.entry(&failure.package).or_default().push(failure);
            }
            for (pkg, failures) in by_pkg {
                writeln!(f, "FAIL {} ({} failures):", pkg, failures.len())?;
                for failure in failures {
                    let output = truncate_lines(&failure.output, MAX_FAILURE_LINES);
                    writeln!(f, "  - {}", failure.test)?;
                    if !output.is_empty() {
                        for line in output.split('\n') {
                            writeln!(f, "      {line}")?;
                        }
                    }
                }
                writeln!(f)?;
            }
        } else if self.build_errors.is_empty() {
            writeln!(f, "Failed {} of {} tests.", self.failed, self.total)?;
            writeln!(f)?;
        }

        Ok(())
    }
}

impl Engine {
    /// Runs `go test -json` over the given (already resolved) packages.
    pub(crate) async fn run_test(&self, pkgs: &[String]) -> Result<TestSummary, WorkflowError> {
        let mut argv: Vec<String> = vec!["go".into(), "test".into(), "-json".into()];
        argv.extend_from_slice(pkgs);
        argv.extend(self.config.test.args.iter().cloned());

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "go test".to_string(),
                source,
            })?;

        Ok(parse_test_output(&result.stdout))
    }
}

/// A single event from `go test -json`.
#[derive(Debug, Default, Deserialize)]
struct TestEvent {
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(rename = "Package", default)]
    package: String,
    #[serde(rename = "Test", default)]
    test: String,
    #[serde(rename = "Output", default)]
    output: String,
    #[serde(rename = "ImportPath", default)]
    import_path: String,
}

/// Parses a `go test -json` event stream. Malformed lines are skipped;
/// a `fail` event without a test name marks the summary FAIL without
/// counting a test.
pub fn parse_test_output(data: &[u8]) -> TestSummary {
    let mut summary = TestSummary {
        status: TestStatus::Pass,
        total: 0,
        passed: 0,
        failed: 0,
        skipped: 0,
        build_errors: Vec::new(),
        failures: Vec::new(),
    };

    let mut outputs: BTreeMap<(String, String), String> = BTreeMap::new();
    let mut failed_tests: Vec<(String, String)> = Vec::new();
    let mut build_outputs: BTreeMap<String, String> = BTreeMap::new();
    let mut failed_builds: Vec<String> = Vec::new();

    for line in String::from_utf8_lossy(data).lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(ev) = serde_json::from_str::<TestEvent>(line) else {
            continue;
        };

        match ev.action.as_str() {
            "output" => {
                if !ev.test.is_empty() {
                    outputs
                        .entry((ev.package.clone(), ev.test.clone()))
                        .or_default()
                        .push_str(&ev.output);
                }
            }
            "pass" => {
                if !ev.test.is_empty() {
                    summary.total += 1;
                    summary.passed += 1;
                }
            }
            "fail" => {
                if !ev.test.is_empty() {
                    summary.total += 1;
                    summary.failed += 1;
                    summary.status = TestStatus::Fail;
                    let key = (ev.package.clone(), ev.test.clone());
                    if !failed_tests.contains(&key) {
                        failed_tests.push(key);
                    }
                } else if !ev.package.is_empty() {
                    summary.status = TestStatus::Fail;
                }
            }
            "skip" => {
                if !ev.test.is_empty() {
                    summary.total += 1;
                    summary.skipped += 1;
                }
            }
            "build-output" => {
                let ip = if ev.import_path.is_empty() {
                    ev.package
                } else {
                    ev.import_path
                };
                if !ip.is_empty() {
                    build_outputs.entry(ip).or_default().push_str(&ev.output);
                }
            }
            "build-fail" => {
                let ip = if ev.import_path.is_empty() {
                    ev.package
                } else {
                    ev.import_path
                };
                if !ip.is_empty() && !failed_builds.contains(&ip) {
                    failed_builds.push(ip);
                }
                summary.status = TestStatus::Fail;
            }
            _ => {}
        }
    }

    for (pkg, test) in failed_tests {
        let output = outputs
            .get(&(pkg.clone(), test.clone()))
            .cloned()
            .unwrap_or_default();
        summary.failures.push(FailedTest {
            test,
            package: pkg,
            output,
        });
    }

    for ip in failed_builds {
        let output = build_outputs
            .get(&ip)
            .map(|o| o.trim_end_matches('\n').to_string())
            .unwrap_or_default();
        summary.build_errors.push(BuildFailure {
            import_path: ip,
            output,
        });
    }

    summary
}
