//! The gopls code-intelligence proxy: a `gopls mcp` child subprocess
//! driven over stdio as an MCP client session. When gopls is missing the
//! server still registers every proxied tool; the handlers report the
//! install instructions at call time instead.

use std::path::Path;

use rmcp::model::{CallToolRequestParam, CallToolResult, JsonObject};
use rmcp::service::{RoleClient, RunningService, ServiceError};
use rmcp::{schemars, ServiceExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::workflow::{SystemToolResolver, ToolResolver};

/// A connected `gopls mcp` subprocess. Dropping the proxy tears the
/// child down with the session.
pub struct GoplsProxy {
    service: RunningService<RoleClient, ()>,
}

impl GoplsProxy {
    /// Spawns `gopls mcp` (resolved like any other tool: `go tool gopls`
    /// first, then PATH) and connects to it over stdio. Returns `None`
    /// when gopls is not installed so the server can degrade gracefully.
    pub async fn start(workspace: &Path) -> Option<GoplsProxy> {
        let argv = match SystemToolResolver.resolve("gopls").await {
            Ok(argv) => argv,
            Err(_) => return None,
        };

        let mut cmd = tokio::process::Command::new(&argv[0]);
        cmd.args(&argv[1..]).arg("mcp").current_dir(workspace);

        let transport = match rmcp::transport::TokioChildProcess::new(cmd) {
            Ok(transport) => transport,
            Err(err) => {
                warn!("spawning gopls mcp: {err}");
                return None;
            }
        };

        match ().serve(transport).await {
            Ok(service) => Some(GoplsProxy { service }),
            Err(err) => {
                warn!("connecting to gopls mcp: {err}");
                None
            }
        }
    }

    /// Forwards a tool call to gopls by upstream name.
    pub async fn call(
        &self,
        tool_name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ServiceError> {
        self.service
            .call_tool(CallToolRequestParam {
                name: tool_name.to_string().into(),
                arguments,
            })
            .await
    }

    /// Calls gopls's go_workspace tool and returns the result text, or
    /// an empty string when the call fails.
    pub async fn workspace_text(&self) -> String {
        match self.call("go_workspace", None).await {
            Ok(result) => extract_text(&result),
            Err(_) => String::new(),
        }
    }
}

/// Extracts the first text content block from a tool result.
pub fn extract_text(result: &CallToolResult) -> String {
    for content in &result.content {
        if let Some(text) = content.as_text() {
            return text.text.clone();
        }
    }
    String::new()
}

// Parameter schemas for the proxied tools. These are the static catalog:
// the set of gopls tools vordr exposes never changes at runtime.

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DiagnosticsParams {
    /// Optional absolute paths to active files for additional analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PackageApiParams {
    /// Go import paths of the packages to summarise.
    #[serde(rename = "packagePaths")]
    pub package_paths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchParams {
    /// Fuzzy search query for symbol names.
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FileContextParams {
    /// Absolute path to the file.
    pub file: String,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SymbolReferencesParams {
    /// Absolute path to the file containing the symbol.
    pub file: String,
    /// Symbol name (e.g. Foo, T.Method, pkg.Symbol).
    pub symbol: String,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RenameSymbolParams {
    /// Absolute path to the file containing the symbol.
    pub file: String,
    /// Symbol name (e.g. Foo, T.Method, pkg.Symbol).
    pub symbol: String,
    /// The new name for the symbol.
    pub new_name: String,
}
