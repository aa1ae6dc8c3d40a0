//! Runs govulncheck and parses its JSON message stream.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Deserialize;

use crate::report::Vuln;

use super::{Engine, WorkflowError};

impl Engine {
    pub(crate) async fn run_vulncheck(&self, pkgs: &[String]) -> Result<Vec<Vuln>, WorkflowError> {
        let mut argv = self.resolver.resolve("govulncheck").await?;

        argv.push("-json".to_string());
        argv.extend(self.config.audit.vulncheck.args.iter().cloned());
        argv.extend_from_slice(pkgs);

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "govulncheck".to_string(),
                source,
            })?;

        Ok(parse_govulncheck_output(&result.stdout))
    }
}

/// One message from the govulncheck JSON stream. Two shapes matter:
/// `osv` entries describe a vulnerability, `finding` entries report a
/// reachable use of one.
#[derive(Debug, Deserialize)]
struct VulncheckMessage {
    #[serde(default)]
    osv: Option<OsvEntry>,
    #[serde(default)]
    finding: Option<Finding>,
}

#[derive(Debug, Deserialize)]
struct OsvEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct Finding {
    #[serde(default)]
    osv: String,
    #[serde(default)]
    fixed_version: String,
    #[serde(default)]
    trace: Vec<TraceEntry>,
}

#[derive(Debug, Deserialize)]
struct TraceEntry {
    #[serde(default)]
    package: String,
    #[serde(default)]
    function: String,
}

/// Parses a govulncheck JSON stream. Findings are de-duplicated by OSV
/// id; the first non-empty package in any trace becomes the affected
/// package and all non-empty function names accumulate as symbols.
pub fn parse_govulncheck_output(data: &[u8]) -> Vec<Vuln> {
    let mut osv_summaries: HashMap<String, String> = HashMap::new();
    let mut findings: Vec<Finding> = Vec::new();

    for line in String::from_utf8_lossy(data).lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(msg) = serde_json::from_str::<VulncheckMessage>(line) else {
            continue;
        };
        if let Some(osv) = msg.osv {
            osv_summaries.insert(osv.id, osv.summary);
        }
        if let Some(finding) = msg.finding {
            findings.push(finding);
        }
    }

    let mut vulns: Vec<Vuln> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for f in findings {
        let at = *index.entry(f.osv.clone()).or_insert_with(|| {
            vulns.push(Vuln {
                id: f.osv.clone(),
                summary: osv_summaries.get(&f.osv).cloned().unwrap_or_default(),
                affected_package: String::new(),
                fixed_version: f.fixed_version.clone(),
                symbols: Vec::new(),
            });
            vulns.len() - 1
        });

        let v = &mut vulns[at];
        for t in &f.trace {
            if !t.package.is_empty() && v.affected_package.is_empty() {
                v.affected_package = t.package.clone();
            }
            if !t.function.is_empty() {
                v.symbols.push(t.function.clone());
            }
        }
    }

    vulns
}

/// Formats vulnerability results for display.
pub fn format_vulncheck_summary(vulns: &[Vuln]) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "  Vulnerabilities found: {}", vulns.len());

    for v in vulns {
        let _ = write!(b, "    {}: {}", v.id, v.summary);
        if !v.affected_package.is_empty() {
            let _ = write!(b, " ({})", v.affected_package);
        }
        if !v.fixed_version.is_empty() {
            let _ = write!(b, " [fixed in {}]", v.fixed_version);
        }
        let _ = writeln!(b);
    }

    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osv_and_finding_merge() {
        let input = concat!(
            r#"{"osv":{"id":"GO-2024-1234","summary":"bad parser"}}"#,
            "\n",
            r#"{"finding":{"osv":"GO-2024-1234","fixed_version":"v1.2.3","trace":[{"module":"example.com/dep","package":"example.com/dep/parse","function":"Parse"}]}}"#,
            "\n",
            r#"{"finding":{"osv":"GO-2024-1234","trace":[{"package":"example.com/dep/parse","function":"ParseAll"}]}}"#,
            "\n",
        );
        let vulns = parse_govulncheck_output(input.as_bytes());
        assert_eq!(vulns.len(), 1);
        let v = &vulns[0];
        assert_eq!(v.id, "GO-2024-1234");
        assert_eq!(v.summary, "bad parser");
        assert_eq!(v.affected_package, "example.com/dep/parse");
        assert_eq!(v.fixed_version, "v1.2.3");
        assert_eq!(v.symbols, vec!["Parse", "ParseAll"]);
    }

    #[test]
    fn finding_without_osv_message() {
        let input = r#"{"finding":{"osv":"GO-2025-0001","trace":[{"package":"p","function":"F"}]}}"#;
        let vulns = parse_govulncheck_output(input.as_bytes());
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].summary, "");
        assert_eq!(vulns[0].affected_package, "p");
    }

    #[test]
    fn malformed_lines_skipped() {
        let input = "garbage\n{\"finding\":{\"osv\":\"GO-1\"}}\n";
        let vulns = parse_govulncheck_output(input.as_bytes());
        assert_eq!(vulns.len(), 1);
    }

    #[test]
    fn empty_input() {
        assert!(parse_govulncheck_output(b"").is_empty());
    }

    #[test]
    fn summary_rendering() {
        let vulns = vec![Vuln {
            id: "GO-2024-1234".into(),
            summary: "bad parser".into(),
            affected_package: "example.com/dep/parse".into(),
            fixed_version: "v1.2.3".into(),
            symbols: vec!["Parse".into()],
        }];
        let out = format_vulncheck_summary(&vulns);
        assert!(out.contains("Vulnerabilities found: 1"));
        assert!(out.contains("GO-2024-1234: bad parser (example.com/dep/parse) [fixed in v1.2.3]"));
    }
}
