//! The vordr binary: check/audit pipelines and the MCP server.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr: stdout carries MCP framing in server mode and
    // pipeline output otherwise.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match vordr::cli::run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("vordr: {err:#}");
            ExitCode::FAILURE
        }
    }
}
