//! The vordr MCP server: native check/audit/inspect/workspace tools plus
//! the static gopls proxy catalog, served over stdio or streamable HTTP.

mod inspect;
mod proxy;

pub use proxy::GoplsProxy;

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::service::{NotificationContext, RoleServer};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config;
use crate::report::{by_symbol, RunResult, Store};
use crate::runner::Runner;
use crate::workflow::{
    format_failure_symbols, AuditStatus, AuditStepResult, Engine, StepResult, StepStatus,
    ToolUnavailable, FORMAT_FAILURE,
};

use inspect::format_inspect_output;
use proxy::{
    DiagnosticsParams, FileContextParams, PackageApiParams, RenameSymbolParams, SearchParams,
    SymbolReferencesParams,
};

/// Model instructions published by the server and printed by
/// `vordr mcp --instructions`.
pub const INSTRUCTIONS: &str = include_str!("instructions.md");

#[derive(Clone)]
pub struct VordrServer {
    engine: Arc<RwLock<Engine>>,
    store: Arc<dyn Store>,
    proxy: Option<Arc<GoplsProxy>>,
    tool_router: ToolRouter<Self>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CheckParams {
    /// Go import paths of packages to check (e.g. example.com/foo/bar/...)
    /// or absolute directory paths. Defaults to all packages in the
    /// workspace.
    #[serde(default)]
    pub packages: Option<Vec<String>>,
    /// Run the auto-fix phase (gofumpt, golangci-lint --fix) before
    /// checks. Default: true.
    #[serde(default)]
    pub fix: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AuditParams {
    /// Go import paths of packages to analyse (e.g. example.com/foo/bar/...)
    /// or absolute directory paths. Defaults to all packages in the
    /// workspace.
    #[serde(default)]
    pub packages: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InspectParams {
    /// The run ID from a vordr_check or vordr_audit result.
    pub run_id: String,
    /// Go-qualified symbol: an import path for package scope (e.g.
    /// example.com/foo), or importpath.Symbol for a specific function
    /// (e.g. example.com/foo.TestAdd).
    pub symbol: String,
}

/// Relevant fields from `go list -m -json`.
#[derive(Debug, Default, Deserialize)]
struct ModuleInfo {
    #[serde(rename = "Path", default)]
    path: String,
    #[serde(rename = "Dir", default)]
    dir: String,
    #[serde(rename = "GoVersion", default)]
    go_version: String,
}

fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

fn error_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

#[tool_router]
impl VordrServer {
    /// Creates the server with every tool registered. The gopls proxy
    /// tools are always present; they self-report unavailability at call
    /// time so the tool list stays stable across sessions.
    pub fn new(engine: Engine, store: Arc<dyn Store>, proxy: Option<GoplsProxy>) -> Self {
        VordrServer {
            engine: Arc::new(RwLock::new(engine)),
            store,
            proxy: proxy.map(Arc::new),
            tool_router: Self::tool_router(),
        }
    }

    async fn engine_snapshot(&self) -> Engine {
        self.engine.read().await.clone()
    }

    fn save_run(&self, rr: &RunResult) {
        if let Err(err) = self.store.save(rr) {
            warn!("saving run {}: {err}", rr.id);
        }
    }

    /// Summarise the Go workspace: module path, Go version, and package
    /// list.
    #[tool(name = "vordr_workspace")]
    async fn workspace(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine_snapshot().await;
        let mut b = String::new();

        // When gopls is available, merge its go_workspace output first;
        // it knows about view types and diagnostics state.
        if let Some(proxy) = &self.proxy {
            let gopls_info = proxy.workspace_text().await;
            if !gopls_info.is_empty() {
                let _ = writeln!(b, "{gopls_info}");
                let _ = writeln!(b);
                let _ = writeln!(b, "--- vordr ---");
                let _ = writeln!(b);
            }
        }

        let argv: Vec<String> = ["go", "list", "-m", "-json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mod_result = match engine.runner.run(&argv, "").await {
            Ok(result) => result,
            Err(err) => {
                return Ok(error_result(format!("Failed to query module info: {err}")));
            }
        };
        if mod_result.exit_code != 0 {
            return Ok(error_result(format!(
                "go list -m -json failed:\n{}",
                String::from_utf8_lossy(&mod_result.stderr)
            )));
        }

        let module: ModuleInfo = match serde_json::from_slice(&mod_result.stdout) {
            Ok(module) => module,
            Err(err) => {
                return Ok(error_result(format!("Failed to parse module info: {err}")));
            }
        };

        let _ = writeln!(b, "Module: {}", module.path);
        if !module.go_version.is_empty() {
            let _ = writeln!(b, "Go: {}", module.go_version);
        }
        let _ = writeln!(b, "Directory: {}", module.dir);
        let _ = writeln!(b);

        let argv: Vec<String> = ["go", "list", "./..."].iter().map(|s| s.to_string()).collect();
        match engine.runner.run(&argv, "").await {
            Ok(pkg_result) if pkg_result.exit_code == 0 => {
                let stdout = String::from_utf8_lossy(&pkg_result.stdout);
                let pkgs: Vec<&str> = stdout.lines().filter(|p| !p.is_empty()).collect();
                let _ = writeln!(b, "Packages ({}):", pkgs.len());
                for pkg in pkgs {
                    let _ = writeln!(b, "  {pkg}");
                }
            }
            _ => {
                let _ = writeln!(b, "Packages: (failed to list)");
            }
        }

        Ok(text_result(b))
    }

    /// Run the full check pipeline (auto-fix, test, lint, staticcheck)
    /// and stop on first failure.
    ///
    /// Use this after making code changes. Runs gofumpt and
    /// golangci-lint --fix first (unless fix=false), then tests, lint,
    /// and staticcheck in sequence. Results are stored for drill-down via
    /// vordr_inspect.
    #[tool(name = "vordr_check")]
    async fn check(
        &self,
        Parameters(params): Parameters<CheckParams>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine_snapshot().await;
        let packages = params.packages.unwrap_or_default();
        let fix = params.fix.unwrap_or(true);

        let result = engine.check(&packages, fix).await;
        self.save_run(&result.run_result);

        if result.failed_idx == FORMAT_FAILURE {
            return Ok(text_result(format_check_format_failure(&result.run_result)));
        }

        Ok(text_result(format_check(
            &result.run_result,
            &result.steps,
            result.failed_idx,
        )))
    }

    /// Run audit checks (coverage, complexity, deadcode, dupl, vulncheck)
    /// and return factual results.
    ///
    /// Use this to assess code health and security. Runs all configured
    /// checks (does not stop on failure). Results are stored for
    /// drill-down via vordr_inspect. Returns raw facts without judgments.
    #[tool(name = "vordr_audit")]
    async fn audit(
        &self,
        Parameters(params): Parameters<AuditParams>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.engine_snapshot().await;
        let packages = params.packages.unwrap_or_default();

        let result = engine.audit(&packages).await;
        self.save_run(&result.run_result);

        Ok(text_result(format_audit(&result.run_result.id, &result.steps)))
    }

    /// Drill into results from a vordr_check or vordr_audit run.
    ///
    /// Use the run_id and a Go-qualified symbol from the tool output.
    /// Symbol can be an import path (e.g. example.com/foo) for all
    /// diagnostics in a package, or importpath.Symbol (e.g.
    /// example.com/foo.TestAdd) for a specific function.
    #[tool(name = "vordr_inspect")]
    async fn inspect(
        &self,
        Parameters(params): Parameters<InspectParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.run_id.is_empty() {
            return Ok(error_result("run_id is required"));
        }
        if params.symbol.is_empty() {
            return Ok(error_result("symbol is required"));
        }

        let result = match self.store.load(&params.run_id) {
            Ok(result) => result,
            Err(err) => {
                return Ok(error_result(format!(
                    "Failed to load run {}: {err}",
                    params.run_id
                )));
            }
        };

        let diagnostics = by_symbol(&result, &params.symbol);
        if diagnostics.is_empty() {
            return Ok(text_result(format!(
                "No diagnostics found for {} in run {} ({}).",
                params.symbol, params.run_id, result.kind
            )));
        }

        Ok(text_result(format_inspect_output(
            &params.run_id,
            result.kind,
            &params.symbol,
            &diagnostics,
        )))
    }

    // --- gopls proxy tools (static catalog) ---

    async fn forward_gopls<T: serde::Serialize>(
        &self,
        upstream: &str,
        params: T,
    ) -> Result<CallToolResult, McpError> {
        let Some(proxy) = &self.proxy else {
            return Ok(error_result(ToolUnavailable::new("gopls").to_string()));
        };

        let arguments = match serde_json::to_value(params) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        };

        match proxy.call(upstream, arguments).await {
            Ok(result) => Ok(result),
            Err(err) => Ok(error_result(format!("calling gopls {upstream}: {err}"))),
        }
    }

    /// Workspace-wide diagnostics (parse errors, build errors, analysis).
    ///
    /// Optionally pass "files" (absolute paths) for additional linting on
    /// active files. Proxied to gopls. Requires gopls to be installed.
    #[tool(name = "vordr_diagnostics")]
    async fn gopls_diagnostics(
        &self,
        Parameters(params): Parameters<DiagnosticsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward_gopls("go_diagnostics", params).await
    }

    /// Public API summary of one or more packages in Go syntax.
    ///
    /// Pass "packagePaths" (Go import paths) to inspect. Proxied to
    /// gopls. Requires gopls to be installed.
    #[tool(name = "vordr_package_api")]
    async fn gopls_package_api(
        &self,
        Parameters(params): Parameters<PackageApiParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward_gopls("go_package_api", params).await
    }

    /// Fuzzy symbol search across the workspace.
    ///
    /// Pass "query" to search. Returns symbol name, kind, and file
    /// location. Proxied to gopls. Requires gopls to be installed.
    #[tool(name = "vordr_search")]
    async fn gopls_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward_gopls("go_search", params).await
    }

    /// Cross-file dependencies for a given file.
    ///
    /// Pass "file" (absolute path). Returns what the file uses from other
    /// files and imports. Proxied to gopls. Requires gopls to be
    /// installed.
    #[tool(name = "vordr_file_context")]
    async fn gopls_file_context(
        &self,
        Parameters(params): Parameters<FileContextParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward_gopls("go_file_context", params).await
    }

    /// Find all references to a symbol.
    ///
    /// Pass "file" (absolute path) and "symbol" (e.g. Foo, T.Method,
    /// pkg.Symbol). Proxied to gopls. Requires gopls to be installed.
    #[tool(name = "vordr_symbol_references")]
    async fn gopls_symbol_references(
        &self,
        Parameters(params): Parameters<SymbolReferencesParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward_gopls("go_symbol_references", params).await
    }

    /// Rename a symbol and return a unified diff.
    ///
    /// Pass "file" (absolute path), "symbol", and "new_name". Proxied to
    /// gopls. Requires gopls to be installed.
    #[tool(name = "vordr_rename_symbol")]
    async fn gopls_rename_symbol(
        &self,
        Parameters(params): Parameters<RenameSymbolParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward_gopls("go_rename_symbol", params).await
    }
}

#[tool_handler]
impl ServerHandler for VordrServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "vordr".to_string(),
                version: crate::VERSION.to_string(),
                ..Implementation::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..ServerInfo::default()
        }
    }

    /// Immediately after initialization, ask the client for its roots.
    /// A file-scheme root becomes the workspace: config is reloaded from
    /// it and the engine and runner are swapped wholesale. This runs
    /// before any tool call, so the swap needs no coordination beyond
    /// the engine lock.
    async fn on_initialized(&self, context: NotificationContext<RoleServer>) {
        let peer = context.peer.clone();
        let roots = match tokio::time::timeout(Duration::from_secs(5), peer.list_roots()).await {
            Ok(Ok(roots)) => roots,
            _ => return,
        };
        let Some(root) = roots.roots.first() else {
            return;
        };
        let Some(path) = root.uri.strip_prefix("file://") else {
            return;
        };
        let workspace = PathBuf::from(path);

        let Ok(loaded) = config::load(&workspace) else {
            return;
        };

        info!("workspace rebound to {}", workspace.display());
        let runner = Runner::new(
            workspace.clone(),
            loaded.config.timeout(),
            loaded.config.max_output_bytes(),
        );
        let engine = Engine::new(loaded.config, Arc::new(runner), workspace, loaded.repo_root);
        *self.engine.write().await = engine;
    }
}

impl VordrServer {
    /// Serves the MCP protocol over stdio until the client disconnects.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    /// Serves the MCP protocol over streamable HTTP on the given address.
    pub async fn serve_http(self, addr: &str) -> anyhow::Result<()> {
        use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
        use rmcp::transport::streamable_http_server::StreamableHttpService;

        let service = StreamableHttpService::new(
            move || Ok(self.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // ":9090" binds all interfaces, matching the conventional
        // host-less address form.
        let addr = if addr.starts_with(':') {
            format!("0.0.0.0{addr}")
        } else {
            addr.to_string()
        };

        let router = axum::Router::new().nest_service("/mcp", service);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("listening on {addr}");
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok(())
    }
}

/// Formats a check run for tool output.
fn format_check(rr: &RunResult, steps: &[StepResult], failed_idx: i32) -> String {
    let mut b = String::new();

    let all_passed = failed_idx < 0;
    if all_passed {
        let _ = writeln!(b, "Status: PASS");
    } else {
        let _ = writeln!(b, "Status: FAIL");
    }
    let _ = writeln!(b, "Run: {}", rr.id);
    let _ = writeln!(b);

    if rr.auto_fixes > 0 {
        let _ = writeln!(b, "Auto-fixed: {} issues", rr.auto_fixes);
        let _ = writeln!(b);
    }

    let _ = writeln!(b, "Steps:");
    for step in steps {
        if step.status == StepStatus::Unavailable {
            let _ = writeln!(b, "  {}: unavailable ({})", step.name, step.detail);
        } else {
            let _ = writeln!(b, "  {}: {}", step.name, step.status);
        }
    }
    let _ = writeln!(b);

    if all_passed {
        let _ = writeln!(b, "All check steps passed.");
        return b;
    }

    let failed = &steps[failed_idx as usize];

    let failures = format_failure_symbols(rr);
    if !failures.is_empty() {
        let _ = writeln!(b, "Failures:");
        for f in failures {
            let _ = writeln!(b, "  {f}");
        }
        let _ = writeln!(b);
    } else if !failed.output.is_empty() {
        let _ = writeln!(b, "Failed step: {}", failed.name);
        let _ = writeln!(b);
        let _ = writeln!(b, "{}", failed.output);
        let _ = writeln!(b);
    }

    if failed.status == StepStatus::Unavailable {
        let _ = writeln!(
            b,
            "Action: {} is required but not installed. Install it and re-run vordr_check.",
            failed.name
        );
    } else {
        let _ = writeln!(
            b,
            "Inspect with vordr_inspect(run_id=\"{}\", symbol=\"<package or package.Symbol>\").",
            rr.id
        );
    }

    b
}

/// Formats the pre-step format failure (fix=false with unformatted files).
fn format_check_format_failure(rr: &RunResult) -> String {
    let mut b = String::new();

    let _ = writeln!(b, "Status: FAIL");
    let _ = writeln!(b, "Run: {}", rr.id);
    let _ = writeln!(b);
    let _ = writeln!(b, "Formatting issues ({} files):", rr.format_issues.len());
    for f in &rr.format_issues {
        let _ = writeln!(b, "  {}", f.file);
    }
    let _ = writeln!(b);
    let _ = writeln!(
        b,
        "Action: run gofumpt to format these files, or re-run vordr_check with fix=true."
    );

    b
}

/// Formats an audit run for tool output.
fn format_audit(run_id: &str, steps: &[AuditStepResult]) -> String {
    let mut b = String::new();

    let completed = steps
        .iter()
        .filter(|s| s.status == AuditStatus::Done)
        .count();
    let _ = writeln!(b, "Audit: {completed}/{} checks completed", steps.len());
    let _ = writeln!(b, "Run: {run_id}");
    let _ = writeln!(b);

    for step in steps {
        match step.status {
            AuditStatus::Done => {
                let _ = writeln!(b, "{}:", step.name);
                let _ = write!(b, "{}", step.output);
                let _ = writeln!(b);
            }
            AuditStatus::Unavailable => {
                let _ = writeln!(b, "{}: unavailable ({})\n", step.name, step.detail);
            }
            AuditStatus::Error => {
                let _ = writeln!(b, "{}: error ({})\n", step.name, step.detail);
            }
            AuditStatus::Skipped => {
                let _ = writeln!(b, "{}: skipped\n", step.name);
            }
        }
    }

    let _ = writeln!(
        b,
        "Inspect with vordr_inspect(run_id=\"{run_id}\", symbol=\"<package or package.Symbol>\")."
    );

    b
}
