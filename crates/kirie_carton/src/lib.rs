//! Carton - the toolbox shared by every kirie crate.
//!
//! # Modules
//!
//! - **hash**: xxHash3 content hashing for change detection and scope ids
//! - **json**: deep merge of JSON descriptor fragments
//! - **path**: normalisation of filesystem paths into output component paths

pub mod hash;
pub mod json;
pub mod path;

// Re-export rustc-hash for fast hash maps/sets
pub use rustc_hash::{FxHashMap, FxHashSet};

pub use json::{deep_merge, deep_merge_into, ArrayMerge};
