//! Host bundler hooks.
//!
//! Every hook returns `None` for ids it does not own so the host can hand
//! them to other plugins.

use crate::cache::CompiledUnit;
use crate::compile::compile_unit;
use crate::context::PluginContext;
use crate::output::Bundle;
use kirie_atelier_sfc::style_request::is_virtual_request;
use kirie_atelier_sfc::{CompileError, CompileResult, RouteKind, StyleCompileOptions, StyleRequest};
use kirie_carton::json::{deep_merge, ArrayMerge};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of [`KiriePlugin::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub code: String,
    /// File relative `@import`/`url()` references resolve against
    pub path: PathBuf,
}

/// Result of [`KiriePlugin::transform`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformResult {
    pub code: String,
    /// Files the host should watch on behalf of this module
    pub dependencies: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// The plugin instance handed to the host.
#[derive(Clone)]
pub struct KiriePlugin {
    ctx: Arc<PluginContext>,
}

impl KiriePlugin {
    pub fn new(ctx: PluginContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &PluginContext {
        &self.ctx
    }

    /// Claim virtual style requests.
    pub fn resolve_id(&self, id: &str, _importer: Option<&str>) -> Option<String> {
        if !is_virtual_request(id) {
            return None;
        }
        if StyleRequest::parse(id).is_none() {
            tracing::warn!(id, "malformed style request");
            return None;
        }
        Some(id.to_string())
    }

    /// Serve the source of a virtual style request.
    pub async fn load(&self, id: &str) -> CompileResult<Option<LoadResult>> {
        let Some(request) = StyleRequest::parse(id) else {
            return Ok(None);
        };
        let unit = self.unit(Path::new(&request.filename)).await?;
        Ok(unit
            .style_sources
            .get(request.index)
            .map(|source| LoadResult {
                code: source.content.clone(),
                path: source.path.clone(),
            }))
    }

    /// Compile a component file, or finish a style request after the host's
    /// CSS pipeline ran.
    pub async fn transform(&self, code: &str, id: &str) -> CompileResult<Option<TransformResult>> {
        self.transform_with_route(code, id, None).await
    }

    /// [`KiriePlugin::transform`] with an explicit route kind.
    pub async fn transform_with_route(
        &self,
        code: &str,
        id: &str,
        route: Option<RouteKind>,
    ) -> CompileResult<Option<TransformResult>> {
        if let Some(request) = StyleRequest::parse(id) {
            return Ok(Some(self.transform_style(code, &request)));
        }
        if id.contains('?') || !self.ctx.options.is_component_file(id) {
            return Ok(None);
        }

        let path = PathBuf::from(id);
        self.ctx.check_runtime_once(&path).await;
        let unit = compile_unit(&self.ctx, &path, code, route).await?;

        let mut out = String::new();
        for request in &unit.style_requests {
            out.push_str("import ");
            out.push_str(&serde_json::to_string(&request.to_id()).unwrap_or_default());
            out.push_str(";\n");
        }
        out.push_str(&unit.script);

        let result = TransformResult {
            code: out,
            dependencies: unit.meta.external_deps.clone(),
            warnings: unit.meta.warnings.clone(),
        };
        self.ctx.cache.insert(path, unit);
        Ok(Some(result))
    }

    fn transform_style(&self, code: &str, request: &StyleRequest) -> TransformResult {
        let output = self.ctx.style_compiler.compile(
            code,
            &StyleCompileOptions {
                filename: request.filename.clone(),
                scope_id: request.scoped.clone().unwrap_or_default(),
                scoped: request.scoped.is_some(),
                module: request.module.clone(),
                lang: request.lang.clone(),
            },
        );
        TransformResult {
            code: output.code,
            dependencies: Vec::new(),
            warnings: output.warnings,
        }
    }

    /// Drop the cached unit of a changed file; the host's HMR continues.
    pub fn handle_hot_update(&self, file: &Path) -> Option<Vec<String>> {
        if self.ctx.cache.remove(file).is_some() {
            tracing::debug!(file = %file.display(), "evicted compiled unit");
        }
        None
    }

    /// Merge computed configs into the staged JSON assets and stage templates.
    ///
    /// Staged JSON is the base; the computed config wins on scalars and
    /// replaces arrays wholesale.
    pub fn generate_bundle(&self, bundle: &mut Bundle) {
        let naming = &self.ctx.output_naming;
        let mut merged = 0usize;

        for path in self.ctx.cache.paths() {
            let Some(unit) = self.ctx.cache.get(&path) else {
                continue;
            };

            match naming.json_asset(&path) {
                Some(name) => {
                    let base = bundle
                        .get(&name)
                        .map(|source| parse_staged(&name, source))
                        .unwrap_or_else(|| Value::Object(Map::new()));
                    let config = deep_merge([&base, &unit.config], ArrayMerge::Replace);
                    let json = serde_json::to_string_pretty(&config).unwrap_or_default();
                    bundle.insert(name, json);
                    merged += 1;
                }
                None => tracing::warn!(file = %path.display(), "no output name for config"),
            }

            if !unit.template.is_empty() {
                if let Some(name) = naming.template_asset(&path) {
                    bundle.insert(name, unit.template.clone());
                }
            }
        }

        tracing::info!(configs = merged, "finalized component configs");
    }

    /// The cached unit for `path`, compiling from disk when absent.
    async fn unit(&self, path: &Path) -> CompileResult<CompiledUnit> {
        if let Some(unit) = self.ctx.cache.get(path) {
            return Ok(unit);
        }
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CompileError::Io {
                filename: path.display().to_string(),
                source,
            })?;
        let unit = compile_unit(&self.ctx, path, &source, None).await?;
        self.ctx.cache.insert(path.to_path_buf(), unit.clone());
        Ok(unit)
    }
}

fn parse_staged(name: &str, source: &str) -> Value {
    match json5::from_str::<Value>(source) {
        Ok(value) if value.is_object() => value,
        Ok(_) | Err(_) => {
            tracing::warn!(asset = %name, "staged config is not a JSON object; replacing it");
            Value::Object(Map::new())
        }
    }
}
