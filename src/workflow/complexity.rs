//! Runs gocognit and parses its whitespace-separated output.

use std::fmt::Write as _;

use crate::report::ComplexityEntry;

use super::{Engine, WorkflowError};

impl Engine {
    pub(crate) async fn run_complexity(
        &self,
        pkgs: &[String],
    ) -> Result<Vec<ComplexityEntry>, WorkflowError> {
        let mut argv = self.resolver.resolve("gocognit").await?;

        argv.extend(self.config.audit.complexity.args.iter().cloned());
        argv.extend_from_slice(pkgs);

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "gocognit".to_string(),
                source,
            })?;

        Ok(parse_gocognit_output(&result.stdout))
    }
}

/// Parses the default gocognit output format:
///
///	<complexity> <package> <function> <file>:<line>:<col>
///
/// Lines whose first token is not numeric are skipped.
pub fn parse_gocognit_output(data: &[u8]) -> Vec<ComplexityEntry> {
    let mut entries = Vec::new();

    for line in String::from_utf8_lossy(data).lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let Ok(complexity) = fields[0].parse::<u32>() else {
            continue;
        };

        let pkg = fields[1];
        let pos = fields[fields.len() - 1];
        let function = fields[2..fields.len() - 1].join(" ");
        let (file, line_num) = parse_position(pos);

        entries.push(ComplexityEntry {
            package: pkg.to_string(),
            file,
            function,
            line: line_num,
            complexity,
        });
    }

    entries
}

/// Extracts file and line from "file:line:col".
fn parse_position(pos: &str) -> (String, u32) {
    let mut parts = pos.split(':');
    let file = parts.next().unwrap_or(pos);
    let line = parts.next().and_then(|l| l.parse().ok()).unwrap_or(0);
    (file.to_string(), line)
}

/// Formats complexity entries for display.
pub fn format_complexity_summary(entries: &[ComplexityEntry]) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "  Functions analysed: {}", entries.len());

    // First entry wins on a tie for the maximum.
    let mut highest: Option<&ComplexityEntry> = None;
    for e in entries {
        match highest {
            Some(h) if h.complexity >= e.complexity => {}
            _ => highest = Some(e),
        }
    }
    let Some(highest) = highest else {
        return b;
    };
    let _ = writeln!(
        b,
        "  Highest: {}.{} ({})",
        highest.package, highest.function, highest.complexity
    );

    let buckets: [(&str, u32, u32); 4] = [
        ("1-5", 1, 5),
        ("6-10", 6, 10),
        ("11-15", 11, 15),
        ("16+", 16, u32::MAX),
    ];

    let _ = write!(b, "  Distribution:");
    for (i, (label, min, max)) in buckets.iter().enumerate() {
        let count = entries
            .iter()
            .filter(|e| e.complexity >= *min && e.complexity <= *max)
            .count();
        if i > 0 {
            let _ = write!(b, ",");
        }
        let _ = write!(b, " {count} ({label})");
    }
    let _ = writeln!(b);

    b
}
