//! Error types for config evaluation.

use kirie_atelier_sfc::CompileError;
use std::path::Path;

/// Error type for evaluator operations.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// No JavaScript runtime could be found.
    #[error("{0}")]
    RuntimeNotFound(#[from] RuntimeNotFoundError),

    /// IO error while materializing or removing the evaluation module.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON-like block failed to parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// The block language cannot be evaluated.
    #[error("unsupported block language `{0}`")]
    UnsupportedLang(String),

    /// The runtime exited with an error.
    #[error("evaluation failed (exit code {exit_code}): {message}")]
    Execution { exit_code: i32, message: String },

    /// The runtime did not finish in time.
    #[error("evaluation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// The runtime printed something that is not JSON.
    #[error("invalid evaluation output: {0}")]
    Output(#[from] serde_json::Error),

    /// The default export did not resolve to a plain object.
    #[error("default export must be a plain object, got {found}")]
    NotAnObject { found: &'static str },
}

impl EvalError {
    /// Attach the component file and the block or macro that failed.
    pub fn into_compile_error(self, filename: &Path, origin: &str) -> CompileError {
        CompileError::config_evaluation(filename.display().to_string(), origin, self.to_string())
    }
}

/// Result type for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;

/// Package manager type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pnpm,
    Npm,
    Yarn,
    Bun,
}

/// Error when no `node` executable is found.
#[derive(Debug)]
pub struct RuntimeNotFoundError {
    detected_pm: Option<PackageManager>,
}

impl RuntimeNotFoundError {
    pub fn new(project_root: &Path) -> Self {
        Self {
            detected_pm: detect_package_manager(project_root),
        }
    }

    pub fn detected_package_manager(&self) -> Option<PackageManager> {
        self.detected_pm
    }

    /// Message with installation hints for a TypeScript-capable loader.
    pub fn display_message(&self) -> String {
        let mut msg = String::new();

        msg.push_str("node not found\n\n");
        msg.push_str("Evaluating script config blocks and macros requires Node.js in PATH.\n");
        msg.push_str("TypeScript sources additionally load best with 'tsx' installed:\n\n");

        match self.detected_pm {
            Some(pm) => msg.push_str(&format!("  {}\n", install_command(pm))),
            None => {
                for pm in [
                    PackageManager::Npm,
                    PackageManager::Pnpm,
                    PackageManager::Yarn,
                    PackageManager::Bun,
                ] {
                    msg.push_str(&format!("  {}\n", install_command(pm)));
                }
            }
        }

        msg
    }
}

fn install_command(pm: PackageManager) -> &'static str {
    match pm {
        PackageManager::Npm => "npm install -D tsx",
        PackageManager::Pnpm => "pnpm add -D tsx",
        PackageManager::Yarn => "yarn add -D tsx",
        PackageManager::Bun => "bun add -D tsx",
    }
}

impl std::fmt::Display for RuntimeNotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_message())
    }
}

impl std::error::Error for RuntimeNotFoundError {}

/// Detect the project's package manager.
pub fn detect_package_manager(project_root: &Path) -> Option<PackageManager> {
    if project_root.join("pnpm-lock.yaml").exists() {
        return Some(PackageManager::Pnpm);
    }
    if project_root.join("bun.lockb").exists() || project_root.join("bun.lock").exists() {
        return Some(PackageManager::Bun);
    }
    if project_root.join("yarn.lock").exists() {
        return Some(PackageManager::Yarn);
    }
    if project_root.join("package-lock.json").exists() {
        return Some(PackageManager::Npm);
    }

    let pkg_json = project_root.join("package.json");
    let content = std::fs::read_to_string(pkg_json).ok()?;
    let json = serde_json::from_str::<serde_json::Value>(&content).ok()?;
    let pm = json.get("packageManager")?.as_str()?;
    [
        ("pnpm", PackageManager::Pnpm),
        ("yarn", PackageManager::Yarn),
        ("bun", PackageManager::Bun),
        ("npm", PackageManager::Npm),
    ]
    .into_iter()
    .find(|(prefix, _)| pm.starts_with(prefix))
    .map(|(_, pm)| pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_with_pm() {
        let error = RuntimeNotFoundError {
            detected_pm: Some(PackageManager::Pnpm),
        };
        let msg = error.display_message();
        assert!(msg.contains("pnpm add -D tsx"));
        assert!(!msg.contains("yarn add"));
    }

    #[test]
    fn test_not_found_message_without_pm() {
        let msg = RuntimeNotFoundError { detected_pm: None }.display_message();
        assert!(msg.contains("npm install -D tsx"));
        assert!(msg.contains("bun add -D tsx"));
    }

    #[test]
    fn test_detect_from_lockfile_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_package_manager(dir.path()), None);

        std::fs::write(dir.path().join("package.json"), r#"{"packageManager":"yarn@4.1.0"}"#)
            .unwrap();
        assert_eq!(detect_package_manager(dir.path()), Some(PackageManager::Yarn));

        std::fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(detect_package_manager(dir.path()), Some(PackageManager::Pnpm));
    }

    #[test]
    fn test_into_compile_error() {
        let err = EvalError::NotAnObject { found: "array" }
            .into_compile_error(Path::new("/src/pages/index.vue"), "definePageJson");
        match err {
            CompileError::ConfigEvaluation {
                filename,
                origin,
                message,
            } => {
                assert_eq!(filename, "/src/pages/index.vue");
                assert_eq!(origin, "definePageJson");
                assert!(message.contains("got array"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
