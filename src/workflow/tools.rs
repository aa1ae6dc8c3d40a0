//! External tool resolution and install guidance.

use std::process::Stdio;

use async_trait::async_trait;

/// Install metadata for a known tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Go module path for `go get -tool` / `go install`.
    pub import_path: &'static str,
    /// Alternative install URL or instruction.
    pub alt_install: &'static str,
    /// True when `go get -tool` / `go install` is not recommended.
    pub no_go_install: bool,
}

/// Maps tool binary names to their install metadata.
const KNOWN_TOOLS: &[(&str, ToolInfo)] = &[
    (
        "gofumpt",
        ToolInfo {
            import_path: "mvdan.cc/gofumpt@latest",
            alt_install: "",
            no_go_install: false,
        },
    ),
    (
        "staticcheck",
        ToolInfo {
            import_path: "honnef.co/go/tools/cmd/staticcheck@latest",
            alt_install: "",
            no_go_install: false,
        },
    ),
    (
        "gocognit",
        ToolInfo {
            import_path: "github.com/uudashr/gocognit/cmd/gocognit@latest",
            alt_install: "",
            no_go_install: false,
        },
    ),
    (
        "deadcode",
        ToolInfo {
            import_path: "golang.org/x/tools/cmd/deadcode@latest",
            alt_install: "",
            no_go_install: false,
        },
    ),
    (
        "dupl",
        ToolInfo {
            import_path: "github.com/mibk/dupl@latest",
            alt_install: "",
            no_go_install: false,
        },
    ),
    (
        "govulncheck",
        ToolInfo {
            import_path: "golang.org/x/vuln/cmd/govulncheck@latest",
            alt_install: "",
            no_go_install: false,
        },
    ),
    (
        "golangci-lint",
        ToolInfo {
            import_path: "",
            alt_install: "https://golangci-lint.run/welcome/install/",
            no_go_install: true,
        },
    ),
    (
        "gopls",
        ToolInfo {
            import_path: "golang.org/x/tools/gopls@latest",
            alt_install: "",
            no_go_install: false,
        },
    ),
];

fn known_tool(name: &str) -> Option<&'static ToolInfo> {
    KNOWN_TOOLS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, info)| info)
}

/// A required tool is not installed. Renders actionable install
/// instructions when the tool is known.
#[derive(Debug, Clone)]
pub struct ToolUnavailable {
    pub name: String,
    pub info: Option<&'static ToolInfo>,
}

impl std::error::Error for ToolUnavailable {}

impl ToolUnavailable {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let info = known_tool(&name);
        ToolUnavailable { name, info }
    }
}

impl std::fmt::Display for ToolUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is required but not installed.", self.name)?;

        let Some(info) = self.info else {
            return Ok(());
        };
        writeln!(f)?;

        if info.no_go_install {
            if !info.alt_install.is_empty() {
                write!(f, "\nInstall: {}", info.alt_install)?;
                write!(
                    f,
                    "\nNote: go get -tool and go install are not recommended for {}.",
                    self.name
                )?;
            }
        } else if !info.import_path.is_empty() {
            let import_path = info.import_path.trim_end_matches("@latest");
            write!(f, "\nInstall:")?;
            write!(
                f,
                "\n  go get -tool {import_path}   # adds to go.mod (recommended)"
            )?;
            write!(
                f,
                "\n  go install {}     # installs globally",
                info.import_path
            )?;
        }
        Ok(())
    }
}

/// Maps a tool name to the argv prefix that invokes it.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Vec<String>, ToolUnavailable>;
}

/// The real two-stage lookup: `go tool <name>` first (Go 1.24+ tool
/// directive in go.mod), then the system PATH.
pub struct SystemToolResolver;

#[async_trait]
impl ToolResolver for SystemToolResolver {
    async fn resolve(&self, name: &str) -> Result<Vec<String>, ToolUnavailable> {
        // Probe with -h. The tool exists under the driver if the probe ran
        // at all; some tools exit non-zero for -h but still exist. Only a
        // launch failure means "not found via the driver".
        if let Ok(go) = which::which("go") {
            let go = go.to_string_lossy().into_owned();
            let probe = tokio::process::Command::new(&go)
                .args(["tool", name, "-h"])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if probe.is_ok() {
                return Ok(vec![go, "tool".to_string(), name.to_string()]);
            }
        }

        // Fallback to PATH lookup.
        match which::which(name) {
            Ok(path) => Ok(vec![path.to_string_lossy().into_owned()]),
            Err(_) => Err(ToolUnavailable::new(name)),
        }
    }
}
