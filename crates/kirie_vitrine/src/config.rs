//! Plugin options and `kirie.config.json` loading.

use kirie_atelier_sfc::{ClassStyleRuntime, RouteKind};
use kirie_carton::path::normalize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional config file in the project root.
pub const CONFIG_FILE: &str = "kirie.config.json";

/// Top-level plugin options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginOptions {
    /// JSON Schema reference (for editor autocompletion).
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Source root, relative to the project root. Output paths are relative to it.
    pub src_root: PathBuf,

    /// Module the compiled script imports `registerComponent` from.
    pub runtime_module: String,

    pub class_style_runtime: ClassStyleRuntime,

    /// Explicit page list, relative to `srcRoot` and without extension
    /// (e.g. `"pages/index/index"`).
    pub pages: Vec<String>,

    /// Directories under `srcRoot` whose components are pages.
    pub page_dirs: Vec<String>,

    /// App entry relative to `srcRoot`, without extension.
    pub app_entry: String,

    /// Extensions compiled as components.
    pub component_extensions: Vec<String>,

    /// Timeout for one config evaluation.
    pub evaluator_timeout_ms: u64,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            schema: None,
            src_root: PathBuf::from("src"),
            runtime_module: "@kirie/runtime".to_string(),
            class_style_runtime: ClassStyleRuntime::default(),
            pages: Vec::new(),
            page_dirs: vec!["pages".to_string()],
            app_entry: "app".to_string(),
            component_extensions: vec![".vue".to_string()],
            evaluator_timeout_ms: 30000,
        }
    }
}

impl PluginOptions {
    /// Whether `path` (ignoring any query) is a component file.
    pub fn is_component_file(&self, path: &str) -> bool {
        self.component_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Classify a component file. `src_root` must already be absolute.
    pub fn route_kind(&self, src_root: &Path, file: &Path) -> RouteKind {
        let Ok(relative) = normalize(file).strip_prefix(normalize(src_root)).map(Path::to_path_buf)
        else {
            return RouteKind::Component;
        };
        let stem = kirie_carton::path::to_posix(&relative.with_extension(""));

        if stem == self.app_entry.trim_matches('/') {
            return RouteKind::App;
        }
        if self.pages.iter().any(|page| page.trim_matches('/') == stem) {
            return RouteKind::Page;
        }
        let under_page_dir = self.page_dirs.iter().any(|dir| {
            let dir = dir.trim_matches('/');
            stem.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
        });
        if under_page_dir {
            RouteKind::Page
        } else {
            RouteKind::Component
        }
    }
}

/// Load `kirie.config.json` from the given directory (or CWD if None).
///
/// A missing file yields defaults; an unreadable or invalid one yields
/// defaults and a warning.
pub fn load_config(dir: Option<&Path>) -> PluginOptions {
    let base = dir
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let config_path = base.join(CONFIG_FILE);

    if !config_path.exists() {
        return PluginOptions::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match json5::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "failed to parse config");
                PluginOptions::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %config_path.display(), error = %e, "failed to read config");
            PluginOptions::default()
        }
    }
}
