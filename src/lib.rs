//! vordr: a typed front end for Go project tooling.
//!
//! Drives a curated set of external tools (go test, gofumpt,
//! golangci-lint, staticcheck, gocognit, deadcode, dupl, govulncheck,
//! gopls), normalises their output into typed diagnostics, stores runs
//! for drill-down, and exposes everything through a CLI and an MCP
//! server.

pub mod cli;
pub mod config;
pub mod mcp;
pub mod report;
pub mod runner;
pub mod workflow;

/// The version reported by `vordr version` and the MCP handshake.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
