//! Config block and macro evaluation.
//!
//! JSON-like blocks are parsed in-process. Everything else is written to a
//! temp module next to the component and handed to a [`ModuleLoader`].

use crate::error::{EvalError, EvalResult};
use crate::loader::ModuleLoader;
use kirie_atelier_sfc::{CompileResult, ConfigMacro, MacroArgument, RouteKind, SfcCustomBlock};
use kirie_carton::json::{deep_merge, deep_merge_into, is_plain_object, ArrayMerge};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Custom block types that contribute to the JSON descriptor.
pub const CONFIG_BLOCK_TYPES: &[&str] = &["json", "config"];

/// Prefix of every temp evaluation module.
pub const TEMP_MODULE_PREFIX: &str = ".kirie-eval-";

/// Block languages parsed as JSON5. No `lang` means JSON.
pub fn is_json_like(lang: Option<&str>) -> bool {
    matches!(lang, None | Some("json" | "jsonc" | "json5"))
}

fn module_extension(lang: &str) -> Option<&'static str> {
    match lang {
        "js" | "mjs" => Some(".mjs"),
        "ts" | "mts" => Some(".mts"),
        _ => None,
    }
}

/// Parse JSON, JSONC or JSON5 text into a plain object.
pub fn parse_json_like(content: &str) -> EvalResult<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = json5::from_str(content).map_err(|e| EvalError::Parse(e.to_string()))?;
    expect_object(value)
}

fn expect_object(value: Value) -> EvalResult<Value> {
    if is_plain_object(&value) {
        Ok(value)
    } else {
        Err(EvalError::NotAnObject {
            found: value_kind(&value),
        })
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Defaults every descriptor starts from.
pub fn baseline_config(route: RouteKind) -> Value {
    match route {
        RouteKind::Component => serde_json::json!({ "component": true }),
        RouteKind::Page | RouteKind::App => Value::Object(Map::new()),
    }
}

/// Label used in errors for a custom block, e.g. `<config lang="ts">`.
fn block_origin(block: &SfcCustomBlock<'_>) -> String {
    match block.lang() {
        Some(lang) => format!("<{} lang=\"{}\">", block.block_type, lang),
        None => format!("<{}>", block.block_type),
    }
}

/// Evaluates config blocks and macro arguments for one plugin context.
#[derive(Clone)]
pub struct ConfigEvaluator {
    loader: Arc<dyn ModuleLoader>,
}

impl ConfigEvaluator {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self { loader }
    }

    /// Evaluate a single `<json>`/`<config>` block.
    pub async fn evaluate_block(
        &self,
        filename: &Path,
        block: &SfcCustomBlock<'_>,
    ) -> CompileResult<Value> {
        let lang = block.lang();
        let result = if is_json_like(lang) {
            parse_json_like(&block.content)
        } else {
            let lang = lang.unwrap_or_default();
            match module_extension(lang) {
                Some(ext) => self.evaluate_module(filename, &block.content, ext).await,
                None => Err(EvalError::UnsupportedLang(lang.to_string())),
            }
        };
        result.map_err(|e| e.into_compile_error(filename, &block_origin(block)))
    }

    /// Evaluate a page/component/app JSON macro argument.
    pub async fn evaluate_macro(
        &self,
        filename: &Path,
        config_macro: &ConfigMacro,
    ) -> CompileResult<Value> {
        self.evaluate_argument(filename, config_macro.kind.macro_name(), &config_macro.argument)
            .await
    }

    /// Evaluate any macro argument to a plain object. `macro_name` labels errors.
    pub async fn evaluate_argument(
        &self,
        filename: &Path,
        macro_name: &str,
        argument: &MacroArgument,
    ) -> CompileResult<Value> {
        let result = match argument {
            MacroArgument::Static(value) => expect_object(value.clone()),
            MacroArgument::Module(module) => {
                let ext = if module.is_ts { ".mts" } else { ".mjs" };
                self.evaluate_module(filename, &module.code, ext).await
            }
        };
        result.map_err(|e| e.into_compile_error(filename, macro_name))
    }

    /// Merge every config block left to right. Other custom blocks are ignored.
    pub async fn merge_blocks(
        &self,
        filename: &Path,
        blocks: &[SfcCustomBlock<'_>],
    ) -> CompileResult<Value> {
        let mut merged = Value::Object(Map::new());
        for block in blocks
            .iter()
            .filter(|b| CONFIG_BLOCK_TYPES.contains(&b.block_type.as_ref()))
        {
            let value = self.evaluate_block(filename, block).await?;
            deep_merge_into(&mut merged, &value, ArrayMerge::IndexWise);
        }
        Ok(merged)
    }

    /// Full descriptor for one file: baseline, then blocks, then macros.
    pub async fn resolve_config(
        &self,
        filename: &Path,
        route: RouteKind,
        blocks: &[SfcCustomBlock<'_>],
        macros: &[ConfigMacro],
    ) -> CompileResult<Value> {
        let from_blocks = self.merge_blocks(filename, blocks).await?;
        let mut from_macros = Value::Object(Map::new());
        for config_macro in macros {
            let value = self.evaluate_macro(filename, config_macro).await?;
            deep_merge_into(&mut from_macros, &value, ArrayMerge::IndexWise);
        }
        Ok(deep_merge(
            [&baseline_config(route), &from_blocks, &from_macros],
            ArrayMerge::IndexWise,
        ))
    }

    /// Write `code` to a fresh temp module beside `filename`, load it and
    /// remove it again.
    pub async fn evaluate_module(&self, filename: &Path, code: &str, ext: &str) -> EvalResult<Value> {
        let dir = match filename.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(TEMP_MODULE_PREFIX)
            .suffix(ext)
            .tempfile_in(dir)?;
        tokio::fs::write(temp.path(), code).await?;

        tracing::debug!(
            file = %filename.display(),
            module = %temp.path().display(),
            "loading config module"
        );
        let loaded = self.loader.load_default(temp.path()).await;
        temp.close()?;

        expect_object(loaded?)
    }
}
