//! Node.js-backed module loader.
//!
//! Each load spawns one short-lived `node` process that imports the module,
//! resolves its default export and prints it as JSON on stdout.

use crate::error::{EvalError, EvalResult, RuntimeNotFoundError};
use crate::loader::ModuleLoader;
use async_trait::async_trait;
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;

/// Imports `process.argv[1]` and prints its resolved default export.
const RUNNER: &str = r#"import { pathToFileURL } from 'node:url';
const mod = await import(pathToFileURL(process.argv[1]).href);
let value = await mod.default;
if (typeof value === 'function') value = await value();
process.stdout.write(JSON.stringify(value === undefined ? null : value));
"#;

/// Configuration for the node loader.
#[derive(Debug, Clone)]
pub struct NodeLoaderConfig {
    /// Path to the node executable; looked up in PATH when unset
    pub node_path: Option<PathBuf>,
    /// Directory node runs in and resolves `--import` hooks from
    pub project_root: PathBuf,
    /// Per-evaluation timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for NodeLoaderConfig {
    fn default() -> Self {
        Self {
            node_path: None,
            project_root: PathBuf::from("."),
            timeout_ms: 30000,
        }
    }
}

/// Loads modules by running them under node.
pub struct NodeModuleLoader {
    config: NodeLoaderConfig,
}

impl NodeModuleLoader {
    pub fn new(config: NodeLoaderConfig) -> Self {
        Self { config }
    }

    fn find_node(&self) -> Result<PathBuf, RuntimeNotFoundError> {
        if let Some(path) = &self.config.node_path {
            if path.exists() {
                return Ok(path.clone());
            }
        }
        which::which("node").map_err(|_| RuntimeNotFoundError::new(&self.config.project_root))
    }

    /// Arguments for loading `module`.
    ///
    /// TypeScript goes through `tsx` when the project has it installed,
    /// otherwise through node's own type stripping.
    fn args(&self, module: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if is_typescript(module) {
            if self.config.project_root.join("node_modules/tsx").is_dir() {
                args.extend(["--import".into(), "tsx".into()]);
            } else {
                args.extend(["--experimental-strip-types".into(), "--no-warnings".into()]);
            }
        }
        args.extend([
            "--input-type=module".into(),
            "-e".into(),
            RUNNER.into(),
            module.as_os_str().to_owned(),
        ]);
        args
    }
}

fn is_typescript(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("ts" | "mts" | "cts")
    )
}

#[async_trait]
impl ModuleLoader for NodeModuleLoader {
    async fn load_default(&self, path: &Path) -> EvalResult<Value> {
        let node = self.find_node()?;
        let mut cmd = TokioCommand::new(&node);
        cmd.args(self.args(path))
            .current_dir(&self.config.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(module = %path.display(), node = %node.display(), "evaluating module");

        let millis = self.config.timeout_ms;
        let output = tokio::time::timeout(Duration::from_millis(millis), cmd.output())
            .await
            .map_err(|_| EvalError::Timeout { millis })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvalError::Execution {
                exit_code: output.status.code().unwrap_or(-1),
                message: first_error_line(&stderr),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(serde_json::from_str(stdout.trim())?)
    }
}

/// The most useful line of a node error dump: the `Error:` line when there
/// is one, otherwise the first non-empty line.
fn first_error_line(stderr: &str) -> String {
    let mut lines = stderr.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.clone().next().unwrap_or("process exited without output");
    lines
        .find(|line| line.contains("Error:") || line.contains("Error ["))
        .unwrap_or(first)
        .to_string()
}
