//! # kirie_crucible
//!
//! Crucible - where config blocks and macro arguments are melted down into
//! plain JSON.
//!
//! ## Name Origin
//!
//! A **crucible** is the vessel metal is heated in until it can be poured.
//! Component config arrives as JSON5, JavaScript or TypeScript; this crate
//! reduces each form to a single JSON object.
//!
//! ## Evaluation
//!
//! - JSON-like blocks (`json`, `jsonc`, `json5`, or no `lang`) parse with `json5`
//! - script blocks and non-static macro arguments are written to a temp module
//!   beside the component and executed through a [`ModuleLoader`]
//! - [`ConfigEvaluator::resolve_config`] layers baseline, blocks and macros
//!
//! The `native` feature provides [`NodeModuleLoader`], which runs modules with
//! the `node` found on the system.

pub mod error;
pub mod evaluator;
pub mod loader;
#[cfg(feature = "native")]
pub mod node;

pub use error::{EvalError, EvalResult, PackageManager, RuntimeNotFoundError};
pub use evaluator::{
    baseline_config, is_json_like, parse_json_like, ConfigEvaluator, CONFIG_BLOCK_TYPES,
};
pub use loader::ModuleLoader;
#[cfg(feature = "native")]
pub use node::{NodeLoaderConfig, NodeModuleLoader};
