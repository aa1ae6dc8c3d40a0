//! Command-line interface: argument parsing, dispatch, and terminal
//! rendering for the check and audit pipelines.

use std::fmt::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config;
use crate::mcp::{GoplsProxy, VordrServer, INSTRUCTIONS};
use crate::report::{DiskStore, LruStore};
use crate::runner::Runner;
use crate::workflow::{
    format_failure_symbols, AuditResult, AuditStatus, CheckResult, Engine, StepStatus,
    FORMAT_FAILURE,
};

/// How many runs the MCP server keeps in memory.
const RUN_CACHE_SIZE: usize = 5;

#[derive(Debug, Parser)]
#[command(
    name = "vordr",
    version = crate::VERSION,
    about = "Structured Go project tooling: check and audit pipelines with an MCP server"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the check pipeline (fix, test, lint, staticcheck)
    Check(CheckArgs),
    /// Run audit checks (coverage, complexity, deadcode, dupl, vulncheck)
    Audit(AuditArgs),
    /// Start the MCP server
    Mcp(McpArgs),
    /// Print the version
    Version,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Packages to check (import paths, ./... patterns, or absolute
    /// directories). Defaults to ./...
    packages: Vec<String>,

    /// Run the auto-fix phase before checks
    #[arg(long)]
    fix: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short)]
    verbose: bool,

    /// Override the configured timeout (e.g. 5m, 90s)
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,
}

#[derive(Debug, Args)]
struct AuditArgs {
    /// Packages to analyse. Defaults to ./...
    packages: Vec<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short)]
    verbose: bool,

    /// Override the configured timeout (e.g. 5m, 90s)
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,
}

#[derive(Debug, Args)]
struct McpArgs {
    /// Serve over streamable HTTP on this address (e.g. :9090) instead
    /// of stdio
    #[arg(long)]
    http: Option<String>,

    /// Print the model instructions and exit
    #[arg(long)]
    instructions: bool,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    config::parse_duration(s).ok_or_else(|| format!("invalid duration {s:?} (try 30s, 5m, 1h)"))
}

/// Parses argv and runs the selected command.
pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check(args) => check_main(args).await,
        Command::Audit(args) => audit_main(args).await,
        Command::Mcp(args) => mcp_main(args).await,
        Command::Version => {
            println!("{}", crate::VERSION);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Builds an engine rooted at the current directory.
fn new_engine(timeout_override: Option<Duration>) -> anyhow::Result<Engine> {
    let workspace = std::env::current_dir()?;
    let loaded = config::load(&workspace)?;

    let timeout = timeout_override.unwrap_or_else(|| loaded.config.timeout());
    let runner = Runner::new(
        loaded.repo_root.clone(),
        timeout,
        loaded.config.max_output_bytes(),
    );

    Ok(Engine::new(
        loaded.config,
        Arc::new(runner),
        workspace,
        loaded.repo_root,
    ))
}

async fn check_main(args: CheckArgs) -> anyhow::Result<ExitCode> {
    let engine = new_engine(args.timeout)?;
    let result = engine.check(&args.packages, args.fix).await;

    let failed = result.failed_idx >= 0 || result.failed_idx == FORMAT_FAILURE;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.run_result)?);
    } else {
        print!("{}", format_check_cli(&result, args.verbose));
    }

    if failed {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

async fn audit_main(args: AuditArgs) -> anyhow::Result<ExitCode> {
    let engine = new_engine(args.timeout)?;
    let result = engine.audit(&args.packages).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.run_result)?);
    } else {
        print!("{}", format_audit_cli(&result));
    }

    Ok(ExitCode::SUCCESS)
}

async fn mcp_main(args: McpArgs) -> anyhow::Result<ExitCode> {
    if args.instructions {
        print!("{INSTRUCTIONS}");
        return Ok(ExitCode::SUCCESS);
    }

    let workspace = std::env::current_dir()?;
    let loaded = config::load(&workspace)?;

    let store = Arc::new(LruStore::new(RUN_CACHE_SIZE, DiskStore::new()));
    let runner = Runner::new(
        workspace.clone(),
        loaded.config.timeout(),
        loaded.config.max_output_bytes(),
    );
    let engine = Engine::new(
        loaded.config,
        Arc::new(runner),
        workspace.clone(),
        loaded.repo_root,
    );

    let proxy = GoplsProxy::start(&workspace).await;
    if proxy.is_none() {
        tracing::warn!("gopls not available; code-intelligence tools will report install steps");
    }

    let server = VordrServer::new(engine, store, proxy);
    match args.http {
        Some(addr) => server.serve_http(&addr).await?,
        None => server.serve_stdio().await?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders a check result for the terminal.
fn format_check_cli(result: &CheckResult, verbose: bool) -> String {
    let rr = &result.run_result;
    let mut b = String::new();

    // Format issues short-circuited the pipeline before any step ran.
    if result.failed_idx == FORMAT_FAILURE {
        let _ = writeln!(b, "FAIL");
        let _ = writeln!(b);
        let _ = writeln!(b, "Formatting issues ({} files):", rr.format_issues.len());
        for f in &rr.format_issues {
            let _ = writeln!(b, "  {}", f.file);
        }
        let _ = writeln!(b);
        let _ = writeln!(b, "Run gofumpt to format, or use --fix.");
        return b;
    }

    let all_passed = result.failed_idx < 0;
    let _ = writeln!(b, "{}", if all_passed { "ok" } else { "FAIL" });
    let _ = writeln!(b);

    if rr.auto_fixes > 0 {
        let _ = writeln!(b, "Auto-fixed: {} issues", rr.auto_fixes);
        let _ = writeln!(b);
    }

    for step in &result.steps {
        let mark = match step.status {
            StepStatus::Pass => "ok",
            StepStatus::Fail => "FAIL",
            StepStatus::Unavailable => "unavailable",
            StepStatus::Skipped => "-",
        };
        let _ = writeln!(b, "  {:<15} {mark}", step.name);
    }
    let _ = writeln!(b);

    if !all_passed {
        let failed = &result.steps[result.failed_idx as usize];

        let failures = format_failure_symbols(rr);
        if !failures.is_empty() {
            for f in failures {
                let _ = writeln!(b, "  {f}");
            }
            let _ = writeln!(b);
        }

        if verbose && !failed.output.is_empty() {
            let _ = writeln!(b, "{}", failed.output);
        }
    }

    b
}

/// Renders an audit result for the terminal.
fn format_audit_cli(result: &AuditResult) -> String {
    let mut b = String::new();

    let completed = result
        .steps
        .iter()
        .filter(|s| s.status == AuditStatus::Done)
        .count();
    let _ = writeln!(
        b,
        "Audit: {completed}/{} checks completed",
        result.steps.len()
    );
    let _ = writeln!(b);

    for step in &result.steps {
        match step.status {
            AuditStatus::Done => {
                let _ = writeln!(b, "{}:", step.name);
                let _ = writeln!(b, "{}", step.output);
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

    b
}
