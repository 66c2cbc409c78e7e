//! `usingComponents` resolution.
//!
//! Template tags are matched against the script's imports; each matched
//! import is followed through barrel files to the component file that
//! defines it, and mapped to that file's output path.

use crate::resolve::{ChainResolver, Resolved};
use kirie_atelier_sfc::exports::{analyze_exports, ExportOrigin};
use kirie_atelier_sfc::template::hyphenate;
use kirie_atelier_sfc::{CompileError, CompileResult, ImportBinding, ImportedName};
use kirie_carton::path::output_component_path;
use kirie_carton::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Re-export hops followed before giving up.
pub const MAX_BARREL_DEPTH: usize = 16;

pub(crate) struct ComponentResolver<'a> {
    pub resolver: &'a ChainResolver<'a>,
    pub src_root: &'a Path,
    pub component_extensions: &'a [String],
}

impl ComponentResolver<'_> {
    /// Build the tag -> output path map for one file.
    pub async fn resolve(
        &self,
        filename: &Path,
        tags: &BTreeSet<String>,
        imports: &[ImportBinding],
    ) -> CompileResult<BTreeMap<String, String>> {
        let mut using = BTreeMap::new();

        for binding in imports.iter().filter(|b| !b.type_only) {
            let export_name = match &binding.imported {
                ImportedName::Default => "default".to_string(),
                ImportedName::Named(name) => name.clone(),
                ImportedName::Namespace => continue,
            };
            let tag = hyphenate(&binding.local);
            if !tags.contains(&binding.local) && !tags.contains(&tag) {
                continue;
            }

            let error = |message: String| CompileError::UsingComponentResolution {
                filename: filename.display().to_string(),
                tag: tag.clone(),
                specifier: binding.source.clone(),
                message,
            };

            let start = match self.resolver.module(&binding.source, filename).await {
                Some(Resolved::File(path)) => path,
                Some(Resolved::Virtual(id)) => {
                    return Err(error(format!("resolves to virtual module `{}`", id)))
                }
                None => return Err(error("module not found".to_string())),
            };
            let component = self.chase(start, export_name).await.map_err(&error)?;
            let output = output_component_path(self.src_root, &component).ok_or_else(|| {
                error(format!(
                    "{} is outside the source root {}",
                    component.display(),
                    self.src_root.display()
                ))
            })?;

            tracing::debug!(file = %filename.display(), tag = %tag, output = %output, "using component");
            using.insert(tag, output);
        }

        Ok(using)
    }

    fn is_component(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.component_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Follow export `name` of `start` until it lands in a component file.
    async fn chase(&self, start: PathBuf, name: String) -> Result<PathBuf, String> {
        let mut stack = vec![(start, name, 0usize)];
        let mut visited = FxHashSet::default();
        let mut last_error = None;

        while let Some((path, name, depth)) = stack.pop() {
            if self.is_component(&path) {
                return Ok(path);
            }
            if depth >= MAX_BARREL_DEPTH {
                last_error = Some(format!("re-export chain is deeper than {}", MAX_BARREL_DEPTH));
                continue;
            }
            if !visited.insert((path.clone(), name.clone())) {
                last_error = Some(format!("re-export cycle through {}", path.display()));
                continue;
            }

            let source = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            let Some(exports) = analyze_exports(&source, is_typescript(&path)) else {
                last_error = Some(format!("{} does not parse", path.display()));
                continue;
            };

            match exports.origin(&name) {
                Some(ExportOrigin::Forwarded { source, name: inner }) => {
                    match self.resolver.module(source, &path).await {
                        Some(Resolved::File(next)) => stack.push((next, inner, depth + 1)),
                        _ => {
                            last_error = Some(format!(
                                "cannot resolve \"{}\" from {}",
                                source,
                                path.display()
                            ))
                        }
                    }
                }
                Some(ExportOrigin::Defined) => {
                    last_error = Some(format!(
                        "`{}` is defined in {}, which is not a component file",
                        name,
                        path.display()
                    ));
                }
                None => {
                    let stars: Vec<&str> = exports.star_sources().collect();
                    if stars.is_empty() {
                        last_error = Some(format!("{} does not export `{}`", path.display(), name));
                    }
                    // Reversed so the first `export *` is tried first
                    for source in stars.into_iter().rev() {
                        if let Some(Resolved::File(next)) = self.resolver.module(source, &path).await {
                            stack.push((next, name.clone(), depth + 1));
                        }
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| "no component file found".to_string()))
    }
}

fn is_typescript(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("ts" | "mts" | "cts" | "tsx")
    )
}
