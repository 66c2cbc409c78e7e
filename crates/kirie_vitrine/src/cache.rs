//! Compiled unit cache.

use dashmap::DashMap;
use kirie_atelier_sfc::{CssModules, RouteKind, StyleRequest};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything produced for one component file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledUnit {
    pub script: String,
    pub template: String,
    /// Compiled CSS of every style block, in order
    pub style: String,
    /// Final JSON descriptor before bundle merging
    pub config: Value,
    pub css_modules: CssModules,
    /// Virtual style modules the script imports
    #[serde(skip)]
    pub style_requests: Vec<StyleRequest>,
    /// Raw style block sources, by block index
    #[serde(skip)]
    pub style_sources: Vec<StyleSource>,
    pub meta: UnitMeta,
}

/// Source text behind one virtual style request.
#[derive(Debug, Clone)]
pub struct StyleSource {
    pub content: String,
    /// File relative imports in the block resolve against
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMeta {
    pub has_script_setup: bool,
    pub route: RouteKind,
    /// Hash over macro call text; `None` without macros
    pub macro_hash: Option<String>,
    /// Files inlined through `src=`
    pub external_deps: Vec<PathBuf>,
    pub using_components: BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

/// One entry per component path, replaced wholesale on every compile.
#[derive(Debug, Default)]
pub struct UnitCache {
    units: DashMap<PathBuf, CompiledUnit>,
}

impl UnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: PathBuf, unit: CompiledUnit) {
        self.units.insert(path, unit);
    }

    pub fn get(&self, path: &Path) -> Option<CompiledUnit> {
        self.units.get(path).map(|unit| unit.clone())
    }

    pub fn remove(&self, path: &Path) -> Option<CompiledUnit> {
        self.units.remove(path).map(|(_, unit)| unit)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.units.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Paths currently cached, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.units.iter().map(|r| r.key().clone()).collect();
        paths.sort();
        paths
    }
}
