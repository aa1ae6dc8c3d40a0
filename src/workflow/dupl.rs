//! Runs dupl in plumbing mode and pairs up its clone groups.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::report::Duplicate;

use super::{Engine, WorkflowError};

impl Engine {
    pub(crate) async fn run_dupl(&self, _pkgs: &[String]) -> Result<Vec<Duplicate>, WorkflowError> {
        let mut argv = self.resolver.resolve("dupl").await?;

        let threshold = self.config.dupl_threshold();
        argv.extend([
            "-plumbing".to_string(),
            "-t".to_string(),
            threshold.to_string(),
        ]);
        argv.extend(self.config.audit.dupl.args.iter().cloned());

        // dupl operates on file paths, not import paths. Scan the
        // workspace.
        argv.push(".".to_string());

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "dupl".to_string(),
                source,
            })?;

        Ok(parse_dupl_output(&result.stdout, threshold))
    }
}

/// Matches one plumbing line: `<file>:<start>-<end>`.
fn dupl_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+):(\d+)-(\d+)$").expect("dupl regex"))
}

#[derive(Debug, Clone)]
struct DuplEntry {
    file: String,
    start_line: u32,
    end_line: u32,
}

/// Parses dupl plumbing output: blank-line-separated clone groups.
/// Groups of two or more entries yield a pair per entry after the first.
/// The configured token threshold is recorded on every pair.
pub fn parse_dupl_output(data: &[u8], threshold: u32) -> Vec<Duplicate> {
    let mut duplicates = Vec::new();
    let mut group: Vec<DuplEntry> = Vec::new();

    for line in String::from_utf8_lossy(data).lines() {
        let line = line.trim();
        if line.is_empty() {
            if group.len() >= 2 {
                duplicates.extend(group_to_duplicates(&group, threshold));
            }
            group.clear();
            continue;
        }

        let Some(caps) = dupl_line().captures(line) else {
            continue;
        };
        group.push(DuplEntry {
            file: caps[1].to_string(),
            start_line: caps[2].parse().unwrap_or(0),
            end_line: caps[3].parse().unwrap_or(0),
        });
    }

    if group.len() >= 2 {
        duplicates.extend(group_to_duplicates(&group, threshold));
    }

    duplicates
}

fn group_to_duplicates(group: &[DuplEntry], tokens: u32) -> Vec<Duplicate> {
    let first = &group[0];
    group[1..]
        .iter()
        .map(|other| Duplicate {
            file_1: first.file.clone(),
            start_line_1: first.start_line,
            end_line_1: first.end_line,
            file_2: other.file.clone(),
            start_line_2: other.start_line,
            end_line_2: other.end_line,
            tokens,
        })
        .collect()
}

/// Formats duplicate results for display.
pub fn format_dupl_summary(duplicates: &[Duplicate]) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "  Duplicate blocks: {}", duplicates.len());
    let limit = 10;
    for (i, d) in duplicates.iter().enumerate() {
        if i >= limit {
            let _ = writeln!(b, "    ... and {} more", duplicates.len() - limit);
            break;
        }
        let _ = writeln!(
            b,
            "    {}:{}-{} <> {}:{}-{} ({} tokens)",
            d.file_1, d.start_line_1, d.end_line_1, d.file_2, d.start_line_2, d.end_line_2, d.tokens
        );
    }
    b
}
