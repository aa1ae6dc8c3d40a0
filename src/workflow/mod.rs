//! The core execution engine for vordr's check and audit pipelines.
//! Consumed by both the MCP server and the CLI commands.

mod audit;
mod check;
mod complexity;
mod coverage;
mod deadcode;
mod dupl;
mod fix;
mod gotest;
mod lint;
mod staticcheck;
mod tools;
mod vulncheck;

pub use audit::{AuditResult, AuditStatus, AuditStepResult};
pub use check::{
    first_line, format_failure_symbols, CheckResult, StepResult, StepStatus, FORMAT_FAILURE,
};
pub use complexity::{format_complexity_summary, parse_gocognit_output};
pub use coverage::{format_coverage_summary, parse_cover_func, summarise_coverage, CoverageSummary};
pub use deadcode::{format_deadcode_summary, parse_deadcode_output};
pub use dupl::{format_dupl_summary, parse_dupl_output};
pub use fix::FixResult;
pub use gotest::{parse_test_output, BuildFailure, FailedTest, TestStatus, TestSummary};
pub use lint::{parse_lint_output, LintSummary};
pub use staticcheck::{parse_staticcheck_output, StaticcheckSummary};
pub use tools::{SystemToolResolver, ToolResolver, ToolUnavailable};
pub use vulncheck::{format_vulncheck_summary, parse_govulncheck_output};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::runner::{CommandRunner, RunnerError};

/// Errors from workflow steps. `ToolUnavailable` is distinguished so
/// pipelines can report a missing tool instead of a failure.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    ToolUnavailable(#[from] ToolUnavailable),

    #[error("executing {tool}: {source}")]
    Exec {
        tool: String,
        #[source]
        source: RunnerError,
    },

    #[error("{tool} failed (exit {exit_code}): {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("creating cover profile: {0}")]
    CoverProfile(#[source] std::io::Error),
}

/// Holds shared dependencies for all workflow operations.
#[derive(Clone)]
pub struct Engine {
    pub config: Config,
    pub runner: Arc<dyn CommandRunner>,
    pub resolver: Arc<dyn ToolResolver>,
    /// The cwd: commands run from here, and ./... scopes to here.
    pub workspace: PathBuf,
    /// The module root, used for absolute-path resolution.
    pub repo_root: PathBuf,
}

impl Engine {
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        workspace: impl Into<PathBuf>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Engine {
            config,
            runner,
            resolver: Arc::new(SystemToolResolver),
            workspace: workspace.into(),
            repo_root: repo_root.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Normalises package arguments so that tools work identically
    /// regardless of how packages are specified. Three input styles:
    ///
    /// - Go import paths (e.g. "example.com/foo/bar/...") pass through.
    /// - Absolute directory paths become a "./..." pattern relative to
    ///   the repo root; paths outside the repo root are dropped.
    /// - Relative patterns (e.g. "./bar/...") pass through unchanged.
    ///
    /// An empty list defaults to "./..." (all packages in the workspace),
    /// matching the behaviour of `go test ./...`.
    pub fn resolve_packages(&self, packages: &[String]) -> Vec<String> {
        if packages.is_empty() {
            return vec!["./...".to_string()];
        }

        let base = if self.repo_root.as_os_str().is_empty() {
            &self.workspace
        } else {
            &self.repo_root
        };
        let base = crate::runner::normalize(base);

        let mut resolved = Vec::with_capacity(packages.len());
        for p in packages {
            if Path::new(p).is_absolute() {
                let cleaned = crate::runner::normalize(Path::new(p));
                let Ok(rel) = cleaned.strip_prefix(&base) else {
                    // Outside repo root: skip silently.
                    continue;
                };
                let rel = if rel.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    rel.to_string_lossy().into_owned()
                };
                let mut pattern = format!("./{rel}");
                if !pattern.ends_with("...") {
                    pattern.push_str("/...");
                }
                resolved.push(pattern);
            } else {
                // Import path or relative pattern: pass through.
                resolved.push(p.clone());
            }
        }

        if resolved.is_empty() {
            return vec!["./...".to_string()];
        }
        resolved
    }
}

/// Extracts a package-like path from a file path. Best-effort; callers
/// may refine it with module info.
pub(crate) fn derive_package_from_file(file: &str) -> String {
    if file.is_empty() {
        return String::new();
    }
    match file.rfind('/') {
        None => ".".to_string(),
        Some(idx) => file[..idx].to_string(),
    }
}

/// Truncates `s` to at most `max_lines` lines, appending a count of what
/// was dropped.
pub(crate) fn truncate_lines(s: &str, max_lines: usize) -> String {
    let trimmed = s.trim_end_matches('\n');
    let lines: Vec<&str> = trimmed.split('\n').collect();
    if lines.len() <= max_lines {
        return lines.join("\n");
    }
    let mut result = lines[..max_lines].join("\n");
    result.push_str(&format!("\n... ({} more lines)", lines.len() - max_lines));
    result
}

#[cfg(test)]
pub(crate) mod testutil {
    //! A scripted runner for engine tests, keyed by command prefix.

    use std::collections::HashMap;

    use async_trait::async_trait;

    use crate::runner::{CommandRunner, RunOutput, RunnerError};
    use crate::workflow::{ToolResolver, ToolUnavailable};

    /// Returns predetermined results based on the leading tokens of argv:
    /// "go test" for go subcommands, the binary name otherwise.
    #[derive(Default)]
    pub struct FakeRunner {
        pub results: HashMap<String, RunOutput>,
        pub errors: HashMap<String, String>,
    }

    pub fn key(argv: &[String]) -> String {
        if argv.len() >= 2 && argv[0] == "go" {
            return format!("go {}", argv[1]);
        }
        argv.first().cloned().unwrap_or_default()
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, argv: &[String], _cwd: &str) -> Result<RunOutput, RunnerError> {
            let key = key(argv);
            if let Some(msg) = self.errors.get(&key) {
                return Err(RunnerError::Spawn {
                    binary: key,
                    source: std::io::Error::other(msg.clone()),
                });
            }
            if let Some(out) = self.results.get(&key) {
                return Ok(out.clone());
            }
            Ok(RunOutput::default())
        }
    }

    /// Resolves only the tools it was given.
    #[derive(Default)]
    pub struct FakeResolver {
        pub available: Vec<String>,
    }

    #[async_trait]
    impl ToolResolver for FakeResolver {
        async fn resolve(&self, name: &str) -> Result<Vec<String>, ToolUnavailable> {
            if self.available.iter().any(|t| t == name) {
                Ok(vec![name.to_string()])
            } else {
                Err(ToolUnavailable::new(name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::FakeRunner;
    use super::*;
    use std::sync::Arc;

    fn engine(workspace: &str, repo_root: &str) -> Engine {
        Engine::new(
            Config::default(),
            Arc::new(FakeRunner::default()),
            workspace,
            repo_root,
        )
    }

    #[test]
    fn resolve_packages_empty_defaults() {
        let e = engine("/project", "/project");
        assert_eq!(e.resolve_packages(&[]), vec!["./..."]);
    }

    #[test]
    fn resolve_packages_relative_pattern_passes_through() {
        let e = engine("/project", "/project");
        assert_eq!(
            e.resolve_packages(&["./pkg/foo/...".to_string()]),
            vec!["./pkg/foo/..."]
        );
    }

    #[test]
    fn resolve_packages_import_path_passes_through() {
        let e = engine("/project", "/project");
        assert_eq!(
            e.resolve_packages(&["example.com/foo/bar/...".to_string()]),
            vec!["example.com/foo/bar/..."]
        );
    }

    #[test]
    fn resolve_packages_absolute_inside_repo_root() {
        let e = engine("/project/pkg/foo", "/project");
        assert_eq!(
            e.resolve_packages(&["/project/pkg/bar".to_string()]),
            vec!["./pkg/bar/..."]
        );
    }

    #[test]
    fn resolve_packages_absolute_outside_repo_root_dropped() {
        let e = engine("/project", "/project");
        assert_eq!(
            e.resolve_packages(&["/other/project".to_string()]),
            vec!["./..."]
        );
    }

    #[test]
    fn resolve_packages_absolute_at_repo_root() {
        let e = engine("/project", "/project");
        assert_eq!(
            e.resolve_packages(&["/project".to_string()]),
            vec!["././..."]
        );
    }

    #[test]
    fn resolve_packages_mixed() {
        let e = engine("/project/cmd", "/project");
        let got = e.resolve_packages(&[
            "./...".to_string(),
            "example.com/foo".to_string(),
            "/project/pkg/bar".to_string(),
            "/outside".to_string(),
        ]);
        assert_eq!(got, vec!["./...", "example.com/foo", "./pkg/bar/..."]);
    }

    #[test]
    fn resolve_packages_repo_root_fallback() {
        let e = engine("/project", "");
        assert_eq!(
            e.resolve_packages(&["/project/pkg/foo".to_string()]),
            vec!["./pkg/foo/..."]
        );
    }

    #[test]
    fn derive_package() {
        assert_eq!(derive_package_from_file("a/b/c.go"), "a/b");
        assert_eq!(derive_package_from_file("c.go"), ".");
        assert_eq!(derive_package_from_file(""), "");
    }

    #[test]
    fn truncate_lines_counts_dropped() {
        assert_eq!(truncate_lines("a\nb\nc", 5), "a\nb\nc");
        assert_eq!(truncate_lines("a\nb\nc", 3), "a\nb\nc");
        assert_eq!(
            truncate_lines("a\nb\nc\nd\ne", 2),
            "a\nb\n... (3 more lines)"
        );
        assert_eq!(truncate_lines("", 5), "");
    }
}
