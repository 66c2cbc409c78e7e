//! # kirie_atelier_sfc
//!
//! Atelier SFC - the workshop where Single File Components are taken apart
//! and reassembled for mini-program runtimes.
//!
//! ## Name Origin
//!
//! An **atelier** is an artist's workshop. This crate is the bench on which a
//! `.vue` file is split into its blocks, its script is recut around a single
//! `registerComponent` call, and its styles are scoped.
//!
//! ## Contents
//!
//! - [`parse_sfc`]: block extraction into an [`SfcDescriptor`]
//! - [`script::transform_script`]: macro erasure and component registration
//! - [`style`]: scope ids, scoped CSS and CSS modules
//! - [`style_request`]: virtual style module ids
//! - [`template`]: template compiler seam and tag scanning
//! - [`exports`]: re-export analysis for barrel files
//!
//! Everything here is synchronous and free of I/O.

pub mod error;
pub mod exports;
mod parse;
pub mod script;
pub mod style;
pub mod style_request;
pub mod template;
pub mod types;

pub use error::{CompileError, CompileResult, SrcResolutionReason};
pub use parse::parse_sfc;
pub use script::{
    transform_script, ConfigMacro, ConfigMacroKind, EvalModule, ImportBinding, ImportedName,
    MacroArgument, ScriptTransform, ScriptTransformOptions,
};
pub use style::{
    generate_scope_id, CssModules, DefaultStyleCompiler, StyleCompileOptions, StyleCompiler,
    StyleOutput,
};
pub use style_request::StyleRequest;
pub use template::{
    ClassStyleRuntime, PassthroughTemplateCompiler, TemplateCompileOptions, TemplateCompiler,
    TemplateOutput,
};
pub use types::*;
