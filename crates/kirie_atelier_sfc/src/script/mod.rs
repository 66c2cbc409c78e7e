//! Script macro transformer.
//!
//! Turns either an Options-style `export default { ... }` or a
//! `<script setup>` block into one `registerComponent(options)` call,
//! erasing every compile-time macro along the way.
//!
//! # Pipeline
//!
//! 1. Parse with oxc and index the top level ([`analysis::ProgramInfo`]).
//! 2. Walk the program once, recording macro calls, page hooks and compiler
//!    artifacts by span ([`analysis::ScriptVisitor`]).
//! 3. Record replacements in an [`edit::EditList`] and splice them into the
//!    original text; the AST is never mutated.
//!
//! Config macro arguments are returned as [`MacroArgument`]s. Those that are
//! not statically known carry a small evaluation module for the caller to
//! run. `defineOptions` properties are spliced into the options object as
//! source text.

pub mod analysis;
mod default_export;
pub mod edit;
mod eval_module;
pub mod props;
pub mod static_eval;
mod transform;

use serde_json::Value;

pub use transform::transform_script;

pub const DEFINE_PROPS: &str = "defineProps";
pub const DEFINE_EMITS: &str = "defineEmits";
pub const DEFINE_MODEL: &str = "defineModel";
pub const DEFINE_OPTIONS: &str = "defineOptions";
pub const DEFINE_EXPOSE: &str = "defineExpose";
pub const DEFINE_SLOTS: &str = "defineSlots";
pub const WITH_DEFAULTS: &str = "withDefaults";
pub const DEFINE_PAGE_JSON: &str = "definePageJson";
pub const DEFINE_COMPONENT_JSON: &str = "defineComponentJson";
pub const DEFINE_APP_JSON: &str = "defineAppJson";

/// Macros that only make sense inside `<script setup>`.
pub const SETUP_MACROS: &[&str] = &[
    DEFINE_PROPS,
    DEFINE_EMITS,
    DEFINE_MODEL,
    DEFINE_OPTIONS,
    DEFINE_EXPOSE,
    DEFINE_SLOTS,
    WITH_DEFAULTS,
];

/// Every macro name the transformer recognizes.
pub const ALL_MACROS: &[&str] = &[
    DEFINE_PROPS,
    DEFINE_EMITS,
    DEFINE_MODEL,
    DEFINE_OPTIONS,
    DEFINE_EXPOSE,
    DEFINE_SLOTS,
    WITH_DEFAULTS,
    DEFINE_PAGE_JSON,
    DEFINE_COMPONENT_JSON,
    DEFINE_APP_JSON,
];

/// Page hooks whose presence must be declared as a static option flag.
pub const PAGE_FLAG_HOOKS: &[(&str, &str)] = &[
    ("onShareAppMessage", "enableOnShareAppMessage"),
    ("onShareTimeline", "enableOnShareTimeline"),
    ("onAddToFavorites", "enableOnAddToFavorites"),
    ("onPageScroll", "enableOnPageScroll"),
];

/// Binding the component options object is assigned to.
pub const SFC_MAIN: &str = "__sfc_main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedName {
    Default,
    Named(String),
    Namespace,
}

/// One local binding introduced by an import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub local: String,
    pub imported: ImportedName,
    /// Module specifier as written
    pub source: String,
    pub type_only: bool,
}

/// Which JSON descriptor a config macro contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMacroKind {
    Page,
    Component,
    App,
}

impl ConfigMacroKind {
    pub fn from_macro(name: &str) -> Option<Self> {
        match name {
            DEFINE_PAGE_JSON => Some(Self::Page),
            DEFINE_COMPONENT_JSON => Some(Self::Component),
            DEFINE_APP_JSON => Some(Self::App),
            _ => None,
        }
    }

    pub fn macro_name(self) -> &'static str {
        match self {
            Self::Page => DEFINE_PAGE_JSON,
            Self::Component => DEFINE_COMPONENT_JSON,
            Self::App => DEFINE_APP_JSON,
        }
    }
}

/// Source of a module whose default export is a macro argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalModule {
    pub code: String,
    pub is_ts: bool,
}

/// A macro argument, known now or after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroArgument {
    Static(Value),
    Module(EvalModule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMacro {
    pub kind: ConfigMacroKind,
    pub argument: MacroArgument,
}

/// Options for [`transform_script`].
#[derive(Debug, Clone, Copy)]
pub struct ScriptTransformOptions<'a> {
    pub filename: &'a str,
    pub is_ts: bool,
    pub setup: bool,
    pub route: crate::types::RouteKind,
    /// Module `registerComponent` is imported from
    pub runtime_module: &'a str,
    /// Class maps of module style blocks
    pub css_modules: Option<&'a crate::style::CssModules>,
    /// Identifiers the template uses; value imports among them stay
    /// reachable from `setup()`. `None` keeps every value import.
    pub template_identifiers: Option<&'a kirie_carton::FxHashSet<String>>,
    /// 1-based line of the script block, for parse diagnostics
    pub start_line: usize,
}

/// Result of [`transform_script`]; config macros may still need evaluation.
#[derive(Debug, Clone)]
pub struct ScriptTransform {
    pub filename: String,
    /// Hash over macro call source text; `None` without macros
    pub macro_hash: Option<String>,
    /// Config macros in source order
    pub config_macros: Vec<ConfigMacro>,
    pub imports: Vec<ImportBinding>,
    /// Whether the output ends in a `registerComponent` call
    pub registers_component: bool,
    pub code: String,
}
