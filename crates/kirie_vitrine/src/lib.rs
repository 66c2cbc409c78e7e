//! # kirie_vitrine
//!
//! Vitrine - the display case that puts kirie in front of a host bundler.
//!
//! ## Name Origin
//!
//! A **vitrine** is a glass display cabinet. This crate is the surface the
//! host sees: its hooks take component files in and hand finished scripts,
//! templates, styles and JSON descriptors back out.
//!
//! ## Hooks
//!
//! - [`KiriePlugin::resolve_id`] / [`KiriePlugin::load`]: virtual style requests
//! - [`KiriePlugin::transform`]: compile a component, or finish a style block
//! - [`KiriePlugin::handle_hot_update`]: drop a stale compiled unit
//! - [`KiriePlugin::generate_bundle`]: merge configs into staged JSON assets
//!
//! ## Example
//!
//! ```ignore
//! use kirie_vitrine::{load_config, KiriePlugin, PluginContext};
//!
//! let options = load_config(Some(root));
//! let plugin = KiriePlugin::new(PluginContext::builder(root, options).build());
//! let result = plugin.transform(&source, "/project/src/pages/index.vue").await?;
//! ```

pub mod cache;
pub mod compile;
pub mod config;
pub mod context;
pub mod logging;
pub mod output;
pub mod plugin;
pub mod resolve;
pub mod using_components;

pub use cache::{CompiledUnit, UnitCache, UnitMeta};
pub use compile::compile_unit;
pub use config::{load_config, PluginOptions};
pub use context::{CompileOptions, PluginContext, PluginContextBuilder};
pub use logging::init_tracing;
pub use output::{Bundle, DefaultOutputNaming, OutputNaming};
pub use plugin::{KiriePlugin, LoadResult, TransformResult};
pub use resolve::{FsResolver, ModuleResolver, Resolved, SrcResolver};
