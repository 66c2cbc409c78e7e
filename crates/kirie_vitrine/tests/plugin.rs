//! End-to-end tests of the plugin hooks against a temp project.

use async_trait::async_trait;
use kirie_atelier_sfc::{CompileError, SrcResolutionReason, StyleRequest};
use kirie_crucible::{EvalError, EvalResult, ModuleLoader};
use kirie_vitrine::{
    Bundle, KiriePlugin, ModuleResolver, PluginContext, PluginOptions, Resolved, SrcResolver,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Parses whatever follows the last `export default` as JSON5.
struct FakeLoader;

#[async_trait]
impl ModuleLoader for FakeLoader {
    async fn load_default(&self, path: &Path) -> EvalResult<Value> {
        let code = tokio::fs::read_to_string(path).await?;
        tokio::task::yield_now().await;
        let start = code
            .rfind("export default")
            .ok_or_else(|| EvalError::Parse("no default export".into()))?;
        let expr = code[start + "export default".len()..]
            .trim()
            .trim_end_matches(';')
            .trim();
        let expr = expr
            .strip_prefix('(')
            .and_then(|e| e.strip_suffix(')'))
            .unwrap_or(expr);
        json5::from_str(expr).map_err(|e| EvalError::Parse(e.to_string()))
    }
}

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn file(&self, relative: &str) -> PathBuf {
        self.root().join("src").join(relative)
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.file(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn plugin(&self) -> KiriePlugin {
        KiriePlugin::new(
            PluginContext::builder(self.root(), PluginOptions::default())
                .module_loader(Arc::new(FakeLoader))
                .build(),
        )
    }

    fn temp_modules(&self, relative_dir: &str) -> usize {
        std::fs::read_dir(self.file(relative_dir))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".kirie-eval-"))
            .count()
    }
}

fn id(path: &Path) -> String {
    path.display().to_string()
}

async fn config_of(plugin: &KiriePlugin, path: &Path, source: &str) -> Value {
    plugin.transform(source, &id(path)).await.unwrap().unwrap();
    plugin.context().cache.get(path).unwrap().config
}

#[tokio::test]
async fn config_precedence() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");
    let source = r#"<json>{"a":1,"b":1}</json>
<script setup>
defineComponentJson({ b: 2, c: 2 })
</script>
"#;

    let config = config_of(&plugin, &path, source).await;
    assert_eq!(config, json!({ "component": true, "a": 1, "b": 2, "c": 2 }));
}

#[tokio::test]
async fn macros_are_erased() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("pages/index.vue");
    let source = r#"<script setup lang="ts">
import { ref } from 'vue'
const props = defineProps<{ title: string }>()
definePageJson({ navigationBarTitleText: 'Home' })
const n = ref(0)
</script>
"#;

    let result = plugin.transform(source, &id(&path)).await.unwrap().unwrap();
    for name in ["defineProps", "definePageJson"] {
        assert!(!result.code.contains(name), "{} left in:\n{}", name, result.code);
    }
    assert!(result.code.contains("registerComponent(__sfc_main);"));

    let unit = plugin.context().cache.get(&path).unwrap();
    assert!(unit.meta.has_script_setup);
    assert!(unit.meta.macro_hash.is_some());
    assert_eq!(unit.config, json!({ "navigationBarTitleText": "Home" }));
}

#[tokio::test]
async fn options_setup_macros_are_collected() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("pages/index.vue");
    let source = r#"<script>
export default {
  setup() {
    definePageJson({ navigationBarTitleText: 'x' })
    return {}
  },
}
</script>
"#;

    let result = plugin.transform(source, &id(&path)).await.unwrap().unwrap();
    assert!(!result.code.contains("definePageJson"));
    assert!(result.code.contains("registerComponent(__sfc_main);"));
    assert_eq!(
        plugin.context().cache.get(&path).unwrap().config,
        json!({ "navigationBarTitleText": "x" })
    );
}

#[tokio::test]
async fn define_options_keeps_function_members() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");
    let source = r#"<script setup>
import { format } from './format'
const step = 2
defineOptions({
  methods: { format },
  observers: { 'a': function () { this.x = step } },
})
</script>
"#;

    let result = plugin.transform(source, &id(&path)).await.unwrap().unwrap();
    assert!(!result.code.contains("defineOptions"));
    assert!(result.code.contains("  methods: { format },\n"));
    assert!(result.code.contains("  observers: { 'a': function () { this.x = 2 } },\n"));
}

#[tokio::test]
async fn bundle_merge_keeps_staged_entries() {
    let project = Project::new();
    project.write("components/Y.vue", "<template><view /></template>\n");
    let plugin = project.plugin();
    let path = project.file("pages/index.vue");
    let source = r#"<template><Y /></template>
<json>{"navigationBarTitleText":"T"}</json>
<script setup>
import Y from '../components/Y.vue'
</script>
"#;
    plugin.transform(source, &id(&path)).await.unwrap();

    let mut bundle = Bundle::new();
    bundle.insert("pages/index.json", r#"{"usingComponents":{"X":"/x"}}"#);
    plugin.generate_bundle(&mut bundle);

    let merged: Value = serde_json::from_str(bundle.get("pages/index.json").unwrap()).unwrap();
    assert_eq!(
        merged,
        json!({
            "usingComponents": { "X": "/x", "y": "/components/Y" },
            "navigationBarTitleText": "T"
        })
    );
    assert_eq!(bundle.get("pages/index.wxml"), Some("<Y />"));
}

#[tokio::test]
async fn finalizer_replaces_staged_arrays() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("app.vue");
    let source = "<json>{\"pages\":[\"pages/b\"]}</json>\n";
    plugin.transform(source, &id(&path)).await.unwrap();

    let mut bundle = Bundle::new();
    bundle.insert("app.json", r#"{"pages":["pages/a","pages/c"],"debug":true}"#);
    plugin.generate_bundle(&mut bundle);

    let merged: Value = serde_json::from_str(bundle.get("app.json").unwrap()).unwrap();
    assert_eq!(merged, json!({ "pages": ["pages/b"], "debug": true }));
}

#[tokio::test]
async fn removing_a_macro_drops_its_config() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");
    let with_macro = "<script setup>\ndefineComponentJson({ styleIsolation: 'shared' })\n</script>\n";
    let without = "<script setup>\nconst a = 1\n</script>\n";

    let mut bundle = Bundle::new();
    plugin.transform(with_macro, &id(&path)).await.unwrap();
    plugin.generate_bundle(&mut bundle);
    assert!(bundle.get("components/card.json").unwrap().contains("styleIsolation"));

    plugin.handle_hot_update(&path);
    plugin.transform(without, &id(&path)).await.unwrap();
    let mut bundle = Bundle::new();
    plugin.generate_bundle(&mut bundle);
    let config: Value = serde_json::from_str(bundle.get("components/card.json").unwrap()).unwrap();
    assert_eq!(config, json!({ "component": true }));
    assert!(plugin.context().cache.get(&path).unwrap().meta.macro_hash.is_none());
}

#[tokio::test]
async fn recompiling_is_idempotent() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");
    let source = r#"<template><view class="a">{{ n }}</view></template>
<script>
export default { data() { return { n: 1 } } }
</script>
<style scoped>.a { color: red; }</style>
<json>{ styleIsolation: 'apply-shared' }</json>
"#;

    let first = plugin.transform(source, &id(&path)).await.unwrap().unwrap();
    let first_unit = plugin.context().cache.get(&path).unwrap();
    let second = plugin.transform(source, &id(&path)).await.unwrap().unwrap();
    let second_unit = plugin.context().cache.get(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_unit.script, second_unit.script);
    assert_eq!(first_unit.style, second_unit.style);
    assert_eq!(first_unit.config, second_unit.config);
    insta::assert_json_snapshot!(second_unit.meta, @r###"
    {
      "hasScriptSetup": false,
      "route": "component",
      "macroHash": null,
      "externalDeps": [],
      "usingComponents": {},
      "warnings": []
    }
    "###);
}

#[tokio::test]
async fn style_blocks_become_virtual_requests() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");
    let source = "<template><view class=\"a\" /></template>\n<style scoped lang=\"scss\">.a { .b { color: red; } }</style>\n";

    let result = plugin.transform(source, &id(&path)).await.unwrap().unwrap();
    let unit = plugin.context().cache.get(&path).unwrap();
    let request = &unit.style_requests[0];
    let request_id = request.to_id();

    assert!(result.code.starts_with(&format!("import {:?};\n", request_id)));
    assert_eq!(request.lang, "scss");
    assert!(request.scoped.as_deref().unwrap().starts_with("data-v-"));
    assert_eq!(StyleRequest::parse(&request_id).as_ref(), Some(request));

    assert_eq!(plugin.resolve_id(&request_id, Some(&id(&path))), Some(request_id.clone()));
    assert_eq!(plugin.resolve_id("./other.css", Some(&id(&path))), None);
    assert_eq!(plugin.resolve_id("/src/a.vue?kirie&type=style", None), None);

    let loaded = plugin.load(&request_id).await.unwrap().unwrap();
    assert_eq!(loaded.code, ".a { .b { color: red; } }");
    assert_eq!(loaded.path, path);

    let styled = plugin
        .transform(".a .b { color: red; }", &request_id)
        .await
        .unwrap()
        .unwrap();
    assert!(styled.code.contains(request.scoped.as_deref().unwrap()));
}

#[tokio::test]
async fn preprocessed_module_styles_warn() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");

    let plain = plugin
        .transform("<style module>.title { color: red; }</style>\n", &id(&path))
        .await
        .unwrap()
        .unwrap();
    assert!(plain.warnings.is_empty());

    let scss = plugin
        .transform(
            "<style module lang=\"scss\">.title { color: red; }</style>\n",
            &id(&path),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scss.warnings.len(), 1);
    assert!(scss.warnings[0].contains("unprocessed `scss` source"));
}

#[tokio::test]
async fn src_style_is_inlined_and_tracked() {
    let project = Project::new();
    let css = project.write("components/card.css", ".a { color: red; }");
    let plugin = project.plugin();
    let path = project.file("components/card.vue");
    let source = "<style src=\"./card.css\"></style>\n";

    let result = plugin.transform(source, &id(&path)).await.unwrap().unwrap();
    assert_eq!(result.dependencies, vec![css.clone()]);

    let request_id = plugin.context().cache.get(&path).unwrap().style_requests[0].to_id();
    let loaded = plugin.load(&request_id).await.unwrap().unwrap();
    assert_eq!(loaded.code, ".a { color: red; }");
    assert_eq!(loaded.path, css);
}

#[tokio::test]
async fn src_with_inline_content_fails() {
    let project = Project::new();
    project.write("components/card.css", ".a {}");
    let plugin = project.plugin();
    let path = project.file("components/card.vue");

    let err = plugin
        .transform("<style src=\"./card.css\">.b {}</style>\n", &id(&path))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::StyleResolution {
            reason: SrcResolutionReason::CombinedSource,
            ..
        }
    ));
    assert!(err.to_string().contains("both `src` and inline content"));
}

struct VirtualSrc;

#[async_trait]
impl SrcResolver for VirtualSrc {
    async fn resolve_src(&self, src: &str, _importer: &Path) -> Option<Resolved> {
        Some(Resolved::Virtual(format!("\0{}", src)))
    }
}

#[tokio::test]
async fn src_resolving_to_virtual_module_fails() {
    let project = Project::new();
    let plugin = KiriePlugin::new(
        PluginContext::builder(project.root(), PluginOptions::default())
            .module_loader(Arc::new(FakeLoader))
            .src_resolver(Arc::new(VirtualSrc))
            .build(),
    );
    let path = project.file("components/card.vue");

    let err = plugin
        .transform("<style src=\"virtual:theme\"></style>\n", &id(&path))
        .await
        .unwrap_err();
    match err {
        CompileError::StyleResolution {
            block,
            src,
            reason: SrcResolutionReason::VirtualModule { id },
            ..
        } => {
            assert_eq!(block, "style");
            assert_eq!(src, "virtual:theme");
            assert_eq!(id, "\0virtual:theme");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn barrel_imports_resolve_to_component_files() {
    let project = Project::new();
    project.write("components/button/Button.vue", "<template><button /></template>\n");
    project.write(
        "components/index.ts",
        "export { default as KButton } from './button/Button.vue'\n",
    );
    let plugin = project.plugin();
    let path = project.file("pages/index.vue");
    let source = r#"<template><k-button /></template>
<script setup>
import { KButton } from '../components'
</script>
"#;

    let config = config_of(&plugin, &path, source).await;
    assert_eq!(config["usingComponents"], json!({ "k-button": "/components/button/Button" }));
}

#[tokio::test]
async fn explicit_using_components_win() {
    let project = Project::new();
    project.write("components/Y.vue", "");
    let plugin = project.plugin();
    let path = project.file("pages/index.vue");
    let source = r#"<template><Y /></template>
<json>{ usingComponents: { y: "/vendor/y" } }</json>
<script setup>
import Y from '../components/Y.vue'
</script>
"#;

    let config = config_of(&plugin, &path, source).await;
    assert_eq!(config["usingComponents"], json!({ "y": "/vendor/y" }));
}

#[tokio::test]
async fn hot_update_evicts_and_defers() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");
    plugin
        .transform("<template><view /></template>\n", &id(&path))
        .await
        .unwrap();
    assert!(plugin.context().cache.contains(&path));

    assert_eq!(plugin.handle_hot_update(&path), None);
    assert!(!plugin.context().cache.contains(&path));
}

#[tokio::test]
async fn non_component_ids_are_deferred() {
    let project = Project::new();
    let plugin = project.plugin();
    let ts = id(&project.file("utils/format.ts"));
    assert_eq!(plugin.transform("export const a = 1", &ts).await.unwrap(), None);
    assert_eq!(plugin.load(&ts).await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_script_configs_do_not_interfere() {
    let project = Project::new();
    let plugin = project.plugin();
    let a = project.file("components/a.vue");
    let b = project.file("components/b.vue");
    std::fs::create_dir_all(a.parent().unwrap()).unwrap();
    let source_a = "<config lang=\"js\">export default { from: 'a' }</config>\n";
    let source_b = "<config lang=\"ts\">export default { from: 'b' }</config>\n";

    let id_a = id(&a);
    let id_b = id(&b);
    let (left, right) = tokio::join!(
        plugin.transform(source_a, &id_a),
        plugin.transform(source_b, &id_b),
    );
    left.unwrap();
    right.unwrap();

    let cache = &plugin.context().cache;
    assert_eq!(cache.get(&a).unwrap().config, json!({ "component": true, "from": "a" }));
    assert_eq!(cache.get(&b).unwrap().config, json!({ "component": true, "from": "b" }));
    assert_eq!(project.temp_modules("components"), 0);
}

#[tokio::test]
async fn config_errors_name_the_block() {
    let project = Project::new();
    let plugin = project.plugin();
    let path = project.file("components/card.vue");

    let err = plugin
        .transform("<json>{ broken: </json>\n", &id(&path))
        .await
        .unwrap_err();
    match &err {
        CompileError::ConfigEvaluation { filename, origin, .. } => {
            assert_eq!(filename, &id(&path));
            assert_eq!(origin, "<json>");
        }
        other => panic!("unexpected {:?}", other),
    }
}

/// Counts lookups of the runtime module.
#[derive(Default)]
struct CountingResolver {
    runtime_lookups: AtomicUsize,
}

#[async_trait]
impl ModuleResolver for CountingResolver {
    async fn resolve_module(&self, specifier: &str, _importer: &Path) -> Option<Resolved> {
        if specifier == "@kirie/runtime" {
            self.runtime_lookups.fetch_add(1, Ordering::SeqCst);
        }
        None
    }
}

#[tokio::test]
async fn runtime_module_is_checked_once_per_context() {
    let project = Project::new();
    let resolver = Arc::new(CountingResolver::default());
    let build = || {
        KiriePlugin::new(
            PluginContext::builder(project.root(), PluginOptions::default())
                .module_loader(Arc::new(FakeLoader))
                .module_resolver(resolver.clone())
                .build(),
        )
    };

    let plugin = build();
    assert!(!plugin.context().runtime_checked());
    for name in ["a.vue", "b.vue"] {
        let path = project.file(name);
        plugin.transform("<template><view /></template>\n", &id(&path)).await.unwrap();
    }
    assert!(plugin.context().runtime_checked());
    assert_eq!(resolver.runtime_lookups.load(Ordering::SeqCst), 1);

    let fresh = build();
    fresh
        .transform("<template><view /></template>\n", &id(&project.file("c.vue")))
        .await
        .unwrap();
    assert_eq!(resolver.runtime_lookups.load(Ordering::SeqCst), 2);
}
