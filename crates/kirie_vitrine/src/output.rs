//! Output asset naming and the in-memory bundle.

use kirie_carton::path::{normalize, to_posix};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps a component source path to its bundle asset names.
///
/// Extensions are platform specific; hosts targeting something other than
/// `.json` + `.wxml` supply their own.
pub trait OutputNaming: Send + Sync {
    fn json_asset(&self, source: &Path) -> Option<String>;
    fn template_asset(&self, source: &Path) -> Option<String>;
}

/// `<srcRoot-relative path>.json` / `.wxml`.
#[derive(Debug, Clone)]
pub struct DefaultOutputNaming {
    pub src_root: PathBuf,
    pub template_extension: String,
}

impl DefaultOutputNaming {
    pub fn new(src_root: impl Into<PathBuf>) -> Self {
        Self {
            src_root: src_root.into(),
            template_extension: "wxml".to_string(),
        }
    }

    fn asset(&self, source: &Path, ext: &str) -> Option<String> {
        let relative = normalize(source)
            .strip_prefix(normalize(&self.src_root))
            .ok()?
            .with_extension(ext);
        Some(to_posix(&relative))
    }
}

impl OutputNaming for DefaultOutputNaming {
    fn json_asset(&self, source: &Path) -> Option<String> {
        self.asset(source, "json")
    }

    fn template_asset(&self, source: &Path) -> Option<String> {
        self.asset(source, &self.template_extension)
    }
}

/// Emitted assets of one build pass, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    assets: BTreeMap<String, String>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_name: impl Into<String>, source: impl Into<String>) {
        self.assets.insert(file_name.into(), source.into());
    }

    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.assets.get(file_name).map(String::as_str)
    }

    pub fn remove(&mut self, file_name: &str) -> Option<String> {
        self.assets.remove(file_name)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assets.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
