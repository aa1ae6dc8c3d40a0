//! Loads and validates the optional `.vordr` YAML file.
//!
//! All fields are optional; absent values fall back to defaults. The file
//! lives at the repository root, which is discovered by walking upward
//! from the workspace looking for `go.mod`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default per-stream output cap in bytes.
pub const DEFAULT_MAX_OUTPUT: usize = 1 << 20;
/// Default dupl token threshold.
pub const DEFAULT_DUPL_THRESHOLD: u32 = 50;

/// Steps run by `check` when none are configured.
pub const DEFAULT_CHECK_STEPS: &[&str] = &["test", "lint", "staticcheck"];
/// Steps run by `audit` when none are configured.
pub const DEFAULT_AUDIT_STEPS: &[&str] =
    &["coverage", "complexity", "deadcode", "dupl", "vulncheck"];

/// The parsed `.vordr` configuration. Zero values represent defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    /// Raw timeout string, e.g. "5m", "30s".
    #[serde(rename = "timeout")]
    pub raw_timeout: String,
    /// Raw output cap in bytes.
    #[serde(rename = "max_output")]
    pub raw_max_output: usize,
    pub test: TestConfig,
    pub lint: LintConfig,
    pub staticcheck: StaticcheckConfig,
    pub check: CheckConfig,
    pub audit: AuditConfig,
}

/// Extra flags appended to `go test -json` (e.g. -race, -count=1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    pub args: Vec<String>,
}

/// Controls how golangci-lint is executed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Path to a golangci-lint config file.
    pub config: String,
    pub args: Vec<String>,
}

/// Controls how staticcheck is executed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticcheckConfig {
    /// e.g. ["all", "-ST1000"]
    pub checks: Vec<String>,
    pub args: Vec<String>,
}

/// Step list for the check pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub steps: Vec<String>,
}

/// Step list and per-check settings for the audit pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub steps: Vec<String>,
    pub coverage: StepArgs,
    pub complexity: StepArgs,
    pub deadcode: StepArgs,
    pub dupl: DuplConfig,
    pub vulncheck: StepArgs,
}

/// Extra flags for a single audit check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepArgs {
    pub args: Vec<String>,
}

/// Controls how duplicate-code detection is run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplConfig {
    /// Minimum clone size in tokens.
    pub threshold: u32,
    pub args: Vec<String>,
}

impl Config {
    /// The configured timeout, or the default when absent or unparseable.
    pub fn timeout(&self) -> Duration {
        if !self.raw_timeout.is_empty() {
            if let Some(d) = parse_duration(&self.raw_timeout) {
                if !d.is_zero() {
                    return d;
                }
            }
        }
        DEFAULT_TIMEOUT
    }

    /// The configured output cap, or the default.
    pub fn max_output_bytes(&self) -> usize {
        if self.raw_max_output > 0 {
            self.raw_max_output
        } else {
            DEFAULT_MAX_OUTPUT
        }
    }

    pub fn check_steps(&self) -> Vec<String> {
        if !self.check.steps.is_empty() {
            self.check.steps.clone()
        } else {
            DEFAULT_CHECK_STEPS.iter().map(|s| s.to_string()).collect()
        }
    }

    pub fn audit_steps(&self) -> Vec<String> {
        if !self.audit.steps.is_empty() {
            self.audit.steps.clone()
        } else {
            DEFAULT_AUDIT_STEPS.iter().map(|s| s.to_string()).collect()
        }
    }

    pub fn dupl_threshold(&self) -> u32 {
        if self.audit.dupl.threshold > 0 {
            self.audit.dupl.threshold
        } else {
            DEFAULT_DUPL_THRESHOLD
        }
    }
}

/// The parsed config together with the discovered repository root.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub config: Config,
    /// Directory containing go.mod; falls back to the workspace.
    pub repo_root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading .vordr: {0}")]
    Read(#[source] std::io::Error),

    #[error("parsing .vordr: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Reads the `.vordr` file from the repository root. A missing file
/// yields the default config; a malformed one is an error.
pub fn load(workspace: &Path) -> Result<LoadResult, ConfigError> {
    let repo_root = find_repo_root(workspace).unwrap_or_else(|| workspace.to_path_buf());

    let path = repo_root.join(".vordr");
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LoadResult {
                config: Config::default(),
                repo_root,
            });
        }
        Err(err) => return Err(ConfigError::Read(err)),
    };

    let config: Config = serde_yaml::from_str(&data)?;
    Ok(LoadResult { config, repo_root })
}

/// Walks upward from `dir` looking for a directory containing go.mod.
pub fn find_repo_root(dir: &Path) -> Option<PathBuf> {
    let mut dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    loop {
        if dir.join("go.mod").is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Parses a Go-style duration string: a sequence of decimal numbers with
/// unit suffixes `ms`, `s`, `m`, `h` (e.g. "30s", "5m", "1h30m").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let (unit, advance) = if rest.starts_with("ms") {
            (Duration::from_millis(1), 2)
        } else if rest.starts_with('s') {
            (Duration::from_secs(1), 1)
        } else if rest.starts_with('m') {
            (Duration::from_secs(60), 1)
        } else if rest.starts_with('h') {
            (Duration::from_secs(3600), 1)
        } else {
            return None;
        };
        rest = &rest[advance..];
        total += unit * u32::try_from(value).ok()?;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_repo_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/test\n").unwrap();
        std::fs::write(dir.path().join(".vordr"), "version: 1\ntimeout: 10m\n").unwrap();

        let res = load(dir.path()).unwrap();
        assert_eq!(res.repo_root.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
        assert_eq!(res.config.version, 1);
        assert_eq!(res.config.raw_timeout, "10m");
        assert_eq!(res.config.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn load_from_subdirectory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("go.mod"), "module example.com/test\n").unwrap();
        std::fs::write(root.path().join(".vordr"), "version: 2\n").unwrap();
        let sub = root.path().join("pkg/foo");
        std::fs::create_dir_all(&sub).unwrap();

        let res = load(&sub).unwrap();
        assert_eq!(res.repo_root, root.path().canonicalize().unwrap());
        assert_eq!(res.config.version, 2);
    }

    #[test]
    fn load_without_go_mod_falls_back_to_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let res = load(dir.path()).unwrap();
        assert_eq!(res.repo_root, dir.path());
        assert!(res.config.raw_timeout.is_empty());
    }

    #[test]
    fn load_without_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/test\n").unwrap();

        let res = load(dir.path()).unwrap();
        assert_eq!(res.config.version, 0);
        assert_eq!(res.config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(res.config.max_output_bytes(), DEFAULT_MAX_OUTPUT);
        assert_eq!(res.config.check_steps(), vec!["test", "lint", "staticcheck"]);
        assert_eq!(res.config.dupl_threshold(), DEFAULT_DUPL_THRESHOLD);
    }

    #[test]
    fn load_step_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/test\n").unwrap();
        std::fs::write(
            dir.path().join(".vordr"),
            concat!(
                "check:\n  steps: [test]\n",
                "audit:\n  steps: [coverage]\n  dupl:\n    threshold: 80\n",
                "lint:\n  config: .golangci.yml\n",
            ),
        )
        .unwrap();

        let cfg = load(dir.path()).unwrap().config;
        assert_eq!(cfg.check_steps(), vec!["test"]);
        assert_eq!(cfg.audit_steps(), vec!["coverage"]);
        assert_eq!(cfg.dupl_threshold(), 80);
        assert_eq!(cfg.lint.config, ".golangci.yml");
    }

    #[test]
    fn unparseable_timeout_falls_back() {
        let cfg = Config {
            raw_timeout: "soon".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("abc"), None);
    }
}
