//! Collects per-function test coverage via `go test -coverprofile` and
//! `go tool cover -func`.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::report::CoverageEntry;

use super::{derive_package_from_file, Engine, WorkflowError};

impl Engine {
    pub(crate) async fn run_coverage(
        &self,
        pkgs: &[String],
    ) -> Result<Vec<CoverageEntry>, WorkflowError> {
        // The profile lives outside the workspace on purpose: it is an
        // artifact of this run, not of the repository.
        let profile = tempfile::Builder::new()
            .prefix("vordr-cover-")
            .suffix(".out")
            .tempfile()
            .map_err(WorkflowError::CoverProfile)?;
        let profile_path = profile.path().to_string_lossy().into_owned();

        let mut argv: Vec<String> = vec![
            "go".into(),
            "test".into(),
            "-coverprofile".into(),
            profile_path.clone(),
        ];
        argv.extend(self.config.audit.coverage.args.iter().cloned());
        argv.extend_from_slice(pkgs);

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "go test -coverprofile".to_string(),
                source,
            })?;
        if result.exit_code != 0 {
            return Err(WorkflowError::ToolFailed {
                tool: "go test -coverprofile".to_string(),
                exit_code: result.exit_code,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }

        let cover_argv: Vec<String> = vec![
            "go".into(),
            "tool".into(),
            "cover".into(),
            "-func".into(),
            profile_path,
        ];
        let cover = self
            .runner
            .run(&cover_argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "go tool cover".to_string(),
                source,
            })?;

        Ok(parse_cover_func(&cover.stdout))
    }
}

/// Matches lines from `go tool cover -func`:
///
///	github.com/foo/bar/baz.go:12:	FuncName		75.0%
///	total:					(statements)		62.4%
fn cover_func_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+):(\d+):\s+(\S+)\s+(\d+\.\d+)%$").expect("cover regex"))
}

/// Parses `go tool cover -func` output. The `total:` sentinel line and
/// percentages outside [0, 100] are discarded.
pub fn parse_cover_func(data: &[u8]) -> Vec<CoverageEntry> {
    let mut entries = Vec::new();

    for line in String::from_utf8_lossy(data).lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = cover_func_line().captures(line) else {
            continue;
        };

        let file = &caps[1];
        if file == "total" {
            continue;
        }
        let Ok(pct) = caps[4].parse::<f64>() else {
            continue;
        };
        if !(0.0..=100.0).contains(&pct) {
            continue;
        }

        entries.push(CoverageEntry {
            package: derive_package_from_file(file),
            file: file.to_string(),
            function: caps[3].to_string(),
            coverage: pct,
        });
    }

    entries
}

/// Aggregated stats for output formatting.
#[derive(Debug, Default, PartialEq)]
pub struct CoverageSummary {
    pub packages: usize,
    pub functions: usize,
    pub average: f64,
}

pub fn summarise_coverage(entries: &[CoverageEntry]) -> CoverageSummary {
    let mut pkgs = std::collections::HashSet::new();
    let mut sum = 0.0;
    for e in entries {
        pkgs.insert(e.package.as_str());
        sum += e.coverage;
    }
    let average = if entries.is_empty() {
        0.0
    } else {
        sum / entries.len() as f64
    };
    CoverageSummary {
        packages: pkgs.len(),
        functions: entries.len(),
        average,
    }
}

/// Formats coverage entries for display.
pub fn format_coverage_summary(entries: &[CoverageEntry]) -> String {
    let mut b = String::new();
    let s = summarise_coverage(entries);
    let _ = writeln!(b, "  Packages: {}", s.packages);
    let _ = writeln!(b, "  Functions: {}", s.functions);
    let _ = writeln!(b, "  Average function coverage: {:.1}%", s.average);

    let uncovered: Vec<String> = entries
        .iter()
        .filter(|e| e.coverage == 0.0)
        .map(|e| {
            format!(
                "    {}.{} ({})",
                e.package,
                e.function,
                Path::new(&e.file)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| e.file.clone())
            )
        })
        .collect();
    if !uncovered.is_empty() {
        let _ = writeln!(b, "  Uncovered functions: {}", uncovered.len());
        let limit = 10;
        for (i, u) in uncovered.iter().enumerate() {
            if i >= limit {
                let _ = writeln!(b, "    ... and {} more", uncovered.len() - limit);
                break;
            }
            let _ = writeln!(b, "{u}");
        }
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_function_lines() {
        let input = "example.com/foo/bar.go:12:\tFuncA\t\t75.0%\n\
                     example.com/foo/bar.go:30:\tFuncB\t\t0.0%\n\
                     total:\t\t\t(statements)\t62.4%\n";
        let entries = parse_cover_func(input.as_bytes());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].function, "FuncA");
        assert_eq!(entries[0].coverage, 75.0);
        assert_eq!(entries[0].package, "example.com/foo");
        assert_eq!(entries[1].coverage, 0.0);
    }

    #[test]
    fn out_of_range_percent_discarded() {
        let input = "a/b.go:1:\tF\t150.0%\na/b.go:2:\tG\t99.9%\n";
        let entries = parse_cover_func(input.as_bytes());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].function, "G");
    }

    #[test]
    fn garbage_lines_skipped() {
        let entries = parse_cover_func(b"not a coverage line\n\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn summary_averages() {
        let entries = vec![
            CoverageEntry {
                package: "p".into(),
                file: "p/a.go".into(),
                function: "A".into(),
                coverage: 100.0,
            },
            CoverageEntry {
                package: "p".into(),
                file: "p/a.go".into(),
                function: "B".into(),
                coverage: 0.0,
            },
        ];
        let s = summarise_coverage(&entries);
        assert_eq!(s.packages, 1);
        assert_eq!(s.functions, 2);
        assert_eq!(s.average, 50.0);

        let out = format_coverage_summary(&entries);
        assert!(out.contains("Average function coverage: 50.0%"));
        assert!(out.contains("Uncovered functions: 1"));
        assert!(out.contains("p.B (a.go)"));
    }
}
