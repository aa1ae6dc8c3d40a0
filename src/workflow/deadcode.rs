//! Runs the deadcode analyzer and parses its JSON output.

use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;

use crate::report::DeadFunc;

use super::{Engine, WorkflowError};

impl Engine {
    pub(crate) async fn run_deadcode(&self, pkgs: &[String]) -> Result<Vec<DeadFunc>, WorkflowError> {
        let mut argv = self.resolver.resolve("deadcode").await?;

        argv.push("-json".to_string());
        argv.extend(self.config.audit.deadcode.args.iter().cloned());
        argv.extend_from_slice(pkgs);

        let result = self
            .runner
            .run(&argv, "")
            .await
            .map_err(|source| WorkflowError::Exec {
                tool: "deadcode".to_string(),
                source,
            })?;

        Ok(parse_deadcode_output(&result.stdout))
    }
}

/// JSON schema from `deadcode -json`.
#[derive(Debug, Deserialize)]
struct DeadcodePackage {
    #[serde(rename = "Path", default)]
    path: String,
    #[serde(rename = "Funcs", default)]
    funcs: Vec<DeadcodeFunction>,
}

#[derive(Debug, Deserialize)]
struct DeadcodeFunction {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Position", default)]
    position: DeadcodePosition,
}

#[derive(Debug, Default, Deserialize)]
struct DeadcodePosition {
    #[serde(rename = "File", default)]
    file: String,
    #[serde(rename = "Line", default)]
    line: u32,
}

/// Parses `deadcode -json` output. Invalid JSON yields an empty list.
pub fn parse_deadcode_output(data: &[u8]) -> Vec<DeadFunc> {
    let Ok(pkgs) = serde_json::from_slice::<Vec<DeadcodePackage>>(data) else {
        return Vec::new();
    };

    let mut funcs = Vec::new();
    for pkg in pkgs {
        for f in pkg.funcs {
            funcs.push(DeadFunc {
                package: pkg.path.clone(),
                file: f.position.file,
                line: f.position.line,
                function: f.name,
            });
        }
    }
    funcs
}

/// Formats dead function results for display.
pub fn format_deadcode_summary(funcs: &[DeadFunc]) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "  Unreachable functions: {}", funcs.len());
    let limit = 20;
    for (i, f) in funcs.iter().enumerate() {
        if i >= limit {
            let _ = writeln!(b, "    ... and {} more", funcs.len() - limit);
            break;
        }
        let base = Path::new(&f.file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| f.file.clone());
        let _ = writeln!(b, "    {}.{} ({}:{})", f.package, f.function, base, f.line);
    }
    b
}
