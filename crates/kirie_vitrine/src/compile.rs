//! Per-file compile pipeline.

use crate::cache::{CompiledUnit, StyleSource, UnitMeta};
use crate::context::PluginContext;
use crate::resolve::load_block_src;
use crate::using_components::ComponentResolver;
use kirie_atelier_sfc::template::{collect_identifiers, collect_tags};
use kirie_atelier_sfc::{
    parse_sfc, transform_script, CompileResult, ConfigMacroKind, CssModules, RouteKind,
    ScriptTransformOptions, SfcDescriptor, SfcParseOptions, StyleCompileOptions, StyleRequest,
    TemplateCompileOptions,
};
use kirie_carton::json::{deep_merge, ArrayMerge};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Compile one component file from its current source text.
///
/// Nothing from a previous compile of the same path is consulted.
pub async fn compile_unit(
    ctx: &PluginContext,
    path: &Path,
    source: &str,
    route: Option<RouteKind>,
) -> CompileResult<CompiledUnit> {
    let filename = path.display().to_string();
    let mut descriptor = parse_sfc(
        source,
        SfcParseOptions {
            filename: filename.clone(),
        },
    )?
    .into_owned();

    let options = ctx.compile_options(path, route);
    let mut meta = UnitMeta {
        has_script_setup: descriptor.script_setup.is_some(),
        route: options.route,
        ..Default::default()
    };

    let style_paths = inline_src_blocks(ctx, path, &mut descriptor, &mut meta.external_deps).await?;

    // Styles
    let mut style = String::new();
    let mut css_modules = CssModules::new();
    let mut style_requests = Vec::with_capacity(descriptor.styles.len());
    let mut style_sources = Vec::with_capacity(descriptor.styles.len());
    for (index, (block, origin)) in descriptor.styles.iter().zip(style_paths).enumerate() {
        let module = block.module.as_deref().map(str::to_string);
        let output = ctx.style_compiler.compile(
            &block.content,
            &StyleCompileOptions {
                filename: filename.clone(),
                scope_id: options.scope_id.clone(),
                scoped: block.scoped,
                module: module.clone(),
                lang: block.lang_or_css().to_string(),
            },
        );
        style.push_str(&output.code);
        meta.warnings.extend(output.warnings);
        // The class map is needed by the script before the host preprocesses
        // the block, so it can only come from the raw source.
        if module.is_some() && block.lang_or_css() != "css" {
            meta.warnings.push(format!(
                "class map of module style block {} is computed from its unprocessed `{}` source",
                index,
                block.lang_or_css()
            ));
        }
        if let (Some(name), Some(classes)) = (&module, output.modules) {
            css_modules.entry(name.clone()).or_default().extend(classes);
        }
        style_requests.push(StyleRequest {
            filename: filename.clone(),
            index,
            scoped: block.scoped.then(|| options.scope_id.clone()),
            module,
            lang: block.lang_or_css().to_string(),
        });
        style_sources.push(StyleSource {
            content: block.content.to_string(),
            path: origin,
        });
    }

    // Template
    let has_scoped = descriptor.styles.iter().any(|s| s.scoped);
    let (template, tags, identifiers) = match &descriptor.template {
        Some(block) => {
            let output = ctx.template_compiler.compile(
                &block.content,
                &TemplateCompileOptions {
                    filename: filename.clone(),
                    scope_id: has_scoped.then(|| options.scope_id.clone()),
                    class_style_runtime: options.class_style_runtime,
                },
            );
            meta.warnings.extend(output.warnings);
            (
                output.code,
                collect_tags(&block.content),
                Some(collect_identifiers(&block.content)),
            )
        }
        None => (String::new(), BTreeSet::new(), None),
    };

    // Script
    let mut config_macros = Vec::new();
    let mut imports = Vec::new();
    let script = match descriptor.primary_script() {
        Some(block) => {
            let transform = transform_script(
                &block.content,
                &ScriptTransformOptions {
                    filename: &filename,
                    is_ts: block.is_ts(),
                    setup: block.setup,
                    route: options.route,
                    runtime_module: &options.runtime_module,
                    css_modules: (!css_modules.is_empty()).then_some(&css_modules),
                    template_identifiers: identifiers.as_ref(),
                    start_line: block.loc.start_line,
                },
            )?;
            meta.macro_hash = transform.macro_hash;
            config_macros = transform.config_macros;
            imports = transform.imports;
            transform.code
        }
        None => String::new(),
    };

    for config_macro in &config_macros {
        if let Some(warning) = route_mismatch(config_macro.kind, options.route) {
            meta.warnings.push(warning);
        }
    }

    // Config
    let config = ctx
        .evaluator
        .resolve_config(path, options.route, &descriptor.custom_blocks, &config_macros)
        .await?;

    let src_root = ctx.src_root();
    let resolver = ctx.resolver();
    meta.using_components = ComponentResolver {
        resolver: &resolver,
        src_root: &src_root,
        component_extensions: &ctx.options.component_extensions,
    }
    .resolve(path, &tags, &imports)
    .await?;

    let config = if meta.using_components.is_empty() {
        config
    } else {
        let base = json!({ "usingComponents": meta.using_components });
        deep_merge([&base, &config], ArrayMerge::IndexWise)
    };

    for warning in &meta.warnings {
        tracing::warn!(file = %filename, "{}", warning);
    }
    tracing::debug!(
        file = %filename,
        route = ?options.route,
        styles = style_requests.len(),
        macro_hash = ?meta.macro_hash,
        "compiled component"
    );

    Ok(CompiledUnit {
        script,
        template,
        style,
        config,
        css_modules,
        style_requests,
        style_sources,
        meta,
    })
}

fn route_mismatch(kind: ConfigMacroKind, route: RouteKind) -> Option<String> {
    let expected = match kind {
        ConfigMacroKind::Page => RouteKind::Page,
        ConfigMacroKind::Component => RouteKind::Component,
        ConfigMacroKind::App => RouteKind::App,
    };
    (expected != route).then(|| {
        format!(
            "{}() in a file compiled as {:?}; its config is applied anyway",
            kind.macro_name(),
            route
        )
    })
}

/// Replace the content of every `src=` block with the referenced file.
///
/// Returns, per style block, the file its relative imports resolve against.
async fn inline_src_blocks(
    ctx: &PluginContext,
    path: &Path,
    descriptor: &mut SfcDescriptor<'static>,
    external_deps: &mut Vec<PathBuf>,
) -> CompileResult<Vec<PathBuf>> {
    let resolver = ctx.resolver();

    if let Some(block) = descriptor.template.as_mut() {
        if let Some(src) = block.src.clone() {
            let loaded = load_block_src(&resolver, path, "template", &src, &block.content).await?;
            block.content = loaded.content.into();
            external_deps.push(loaded.path);
        }
    }

    for block in [descriptor.script.as_mut(), descriptor.script_setup.as_mut()]
        .into_iter()
        .flatten()
    {
        if let Some(src) = block.src.clone() {
            let loaded = load_block_src(&resolver, path, "script", &src, &block.content).await?;
            if block.lang.is_none() {
                block.lang = script_lang(&loaded.path).map(Into::into);
            }
            block.content = loaded.content.into();
            external_deps.push(loaded.path);
        }
    }

    let mut style_paths = Vec::with_capacity(descriptor.styles.len());
    for block in descriptor.styles.iter_mut() {
        match block.src.clone() {
            Some(src) => {
                let loaded = load_block_src(&resolver, path, "style", &src, &block.content).await?;
                block.content = loaded.content.into();
                style_paths.push(loaded.path.clone());
                external_deps.push(loaded.path);
            }
            None => style_paths.push(path.to_path_buf()),
        }
    }

    Ok(style_paths)
}

fn script_lang(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|ext| ext.to_str())? {
        "ts" | "mts" | "cts" => Some("ts"),
        "tsx" => Some("tsx"),
        _ => None,
    }
}
