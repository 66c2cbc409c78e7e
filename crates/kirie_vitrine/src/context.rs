//! Plugin context: options, collaborators and per-process state.

use crate::cache::UnitCache;
use crate::config::PluginOptions;
use crate::output::{DefaultOutputNaming, OutputNaming};
use crate::resolve::{ChainResolver, FsResolver, ModuleResolver, SrcResolver};
use kirie_atelier_sfc::{
    generate_scope_id, ClassStyleRuntime, DefaultStyleCompiler, PassthroughTemplateCompiler,
    RouteKind, StyleCompiler, TemplateCompiler,
};
use kirie_carton::path::{normalize, to_posix};
use kirie_crucible::{ConfigEvaluator, ModuleLoader, NodeLoaderConfig, NodeModuleLoader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-file compile settings derived from [`PluginOptions`] and the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub route: RouteKind,
    pub class_style_runtime: ClassStyleRuntime,
    pub runtime_module: String,
    pub scope_id: String,
}

/// Shared state of one plugin instance.
pub struct PluginContext {
    pub options: PluginOptions,
    /// Project root; `srcRoot` is resolved against it
    pub root: PathBuf,
    pub cache: UnitCache,
    pub(crate) template_compiler: Arc<dyn TemplateCompiler>,
    pub(crate) style_compiler: Arc<dyn StyleCompiler>,
    pub(crate) src_resolver: Option<Arc<dyn SrcResolver>>,
    pub(crate) module_resolver: Arc<dyn ModuleResolver>,
    pub(crate) output_naming: Arc<dyn OutputNaming>,
    pub(crate) evaluator: ConfigEvaluator,
    pub(crate) fs: FsResolver,
    /// Set once the runtime module lookup ran; never reset
    runtime_checked: AtomicBool,
}

impl PluginContext {
    pub fn builder(root: impl Into<PathBuf>, options: PluginOptions) -> PluginContextBuilder {
        PluginContextBuilder {
            root: root.into(),
            options,
            template_compiler: None,
            style_compiler: None,
            src_resolver: None,
            module_resolver: None,
            module_loader: None,
            output_naming: None,
        }
    }

    /// Absolute source root.
    pub fn src_root(&self) -> PathBuf {
        normalize(&self.root.join(&self.options.src_root))
    }

    /// Settings for compiling `file`. `route` overrides path-based detection.
    pub fn compile_options(&self, file: &Path, route: Option<RouteKind>) -> CompileOptions {
        let src_root = self.src_root();
        let route = route.unwrap_or_else(|| self.options.route_kind(&src_root, file));
        let scope_key = normalize(file)
            .strip_prefix(&src_root)
            .map(to_posix)
            .unwrap_or_else(|_| to_posix(file));
        CompileOptions {
            route,
            class_style_runtime: self.options.class_style_runtime,
            runtime_module: self.options.runtime_module.clone(),
            scope_id: generate_scope_id(&scope_key),
        }
    }

    pub(crate) fn resolver(&self) -> ChainResolver<'_> {
        ChainResolver {
            src: self.src_resolver.as_deref(),
            modules: &*self.module_resolver,
            fs: &self.fs,
        }
    }

    /// Warn once per context when the runtime module cannot be resolved.
    pub(crate) async fn check_runtime_once(&self, importer: &Path) {
        if self.runtime_checked.swap(true, Ordering::SeqCst) {
            return;
        }
        let module = &self.options.runtime_module;
        match self.resolver().module(module, importer).await {
            Some(_) => {}
            None => tracing::warn!(
                module = %module,
                "runtime module is not installed; compiled components will fail to load"
            ),
        }
    }

    pub fn runtime_checked(&self) -> bool {
        self.runtime_checked.load(Ordering::SeqCst)
    }
}

/// Builder for [`PluginContext`]. Unset collaborators get built-in defaults.
pub struct PluginContextBuilder {
    root: PathBuf,
    options: PluginOptions,
    template_compiler: Option<Arc<dyn TemplateCompiler>>,
    style_compiler: Option<Arc<dyn StyleCompiler>>,
    src_resolver: Option<Arc<dyn SrcResolver>>,
    module_resolver: Option<Arc<dyn ModuleResolver>>,
    module_loader: Option<Arc<dyn ModuleLoader>>,
    output_naming: Option<Arc<dyn OutputNaming>>,
}

impl PluginContextBuilder {
    pub fn template_compiler(mut self, compiler: Arc<dyn TemplateCompiler>) -> Self {
        self.template_compiler = Some(compiler);
        self
    }

    pub fn style_compiler(mut self, compiler: Arc<dyn StyleCompiler>) -> Self {
        self.style_compiler = Some(compiler);
        self
    }

    pub fn src_resolver(mut self, resolver: Arc<dyn SrcResolver>) -> Self {
        self.src_resolver = Some(resolver);
        self
    }

    pub fn module_resolver(mut self, resolver: Arc<dyn ModuleResolver>) -> Self {
        self.module_resolver = Some(resolver);
        self
    }

    pub fn module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.module_loader = Some(loader);
        self
    }

    pub fn output_naming(mut self, naming: Arc<dyn OutputNaming>) -> Self {
        self.output_naming = Some(naming);
        self
    }

    pub fn build(self) -> PluginContext {
        let src_root = normalize(&self.root.join(&self.options.src_root));
        let fs = FsResolver::new(self.options.component_extensions.clone());
        let loader = self.module_loader.unwrap_or_else(|| {
            Arc::new(NodeModuleLoader::new(NodeLoaderConfig {
                node_path: None,
                project_root: self.root.clone(),
                timeout_ms: self.options.evaluator_timeout_ms,
            }))
        });

        PluginContext {
            template_compiler: self
                .template_compiler
                .unwrap_or_else(|| Arc::new(PassthroughTemplateCompiler)),
            style_compiler: self
                .style_compiler
                .unwrap_or_else(|| Arc::new(DefaultStyleCompiler)),
            src_resolver: self.src_resolver,
            module_resolver: self
                .module_resolver
                .unwrap_or_else(|| Arc::new(fs.clone())),
            output_naming: self
                .output_naming
                .unwrap_or_else(|| Arc::new(DefaultOutputNaming::new(src_root))),
            evaluator: ConfigEvaluator::new(loader),
            fs,
            cache: UnitCache::new(),
            options: self.options,
            root: self.root,
            runtime_checked: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options() {
        let ctx = PluginContext::builder("/p", PluginOptions::default()).build();
        let page = ctx.compile_options(Path::new("/p/src/pages/index.vue"), None);
        assert_eq!(page.route, RouteKind::Page);
        assert_eq!(page.runtime_module, "@kirie/runtime");
        assert!(page.scope_id.starts_with("data-v-"));

        let forced = ctx.compile_options(Path::new("/p/src/pages/index.vue"), Some(RouteKind::Component));
        assert_eq!(forced.route, RouteKind::Component);
        assert_eq!(forced.scope_id, page.scope_id);

        let other = ctx.compile_options(Path::new("/p/src/pages/about.vue"), None);
        assert_ne!(other.scope_id, page.scope_id);
    }
}
