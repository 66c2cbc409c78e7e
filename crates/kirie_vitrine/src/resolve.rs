//! Module and `src=` resolution.
//!
//! Hosts plug in their own resolvers (aliases, package exports, virtual
//! modules). Whatever they cannot answer falls back to [`FsResolver`].

use async_trait::async_trait;
use kirie_atelier_sfc::{CompileError, CompileResult, SrcResolutionReason};
use kirie_carton::path::normalize;
use std::path::{Path, PathBuf};

/// Where a specifier points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A file on disk
    File(PathBuf),
    /// A bundler-virtual module id with no file behind it
    Virtual(String),
}

/// Resolves `src=` attributes of SFC blocks.
#[async_trait]
pub trait SrcResolver: Send + Sync {
    async fn resolve_src(&self, src: &str, importer: &Path) -> Option<Resolved>;
}

/// Resolves import specifiers.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve_module(&self, specifier: &str, importer: &Path) -> Option<Resolved>;
}

/// Extensions tried for extension-less specifiers, in order.
const PROBE_EXTENSIONS: &[&str] = &[".vue", ".ts", ".mts", ".js", ".mjs", ".json"];

/// Relative/absolute filesystem resolution plus `node_modules` lookup.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    /// Extra extensions probed before the built-in ones
    pub extensions: Vec<String>,
}

impl FsResolver {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Resolve a relative or absolute specifier against `importer`'s directory.
    pub fn resolve_path(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let base = if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else if specifier.starts_with("./") || specifier.starts_with("../") {
            importer.parent()?.join(specifier)
        } else {
            return None;
        };
        self.probe(&normalize(&base))
    }

    /// Find a bare package in the nearest `node_modules`.
    pub fn resolve_package(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        let mut dir = importer.parent();
        while let Some(current) = dir {
            let candidate = current.join("node_modules").join(specifier);
            if let Some(found) = self.probe(&candidate) {
                return Some(found);
            }
            dir = current.parent();
        }
        None
    }

    fn probe(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        let extensions = self
            .extensions
            .iter()
            .map(String::as_str)
            .chain(PROBE_EXTENSIONS.iter().copied());
        for ext in extensions.clone() {
            let mut candidate = base.as_os_str().to_owned();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if base.is_dir() {
            if base.join("package.json").is_file() {
                return Some(base.to_path_buf());
            }
            for ext in extensions {
                let candidate = base.join(format!("index{}", ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[async_trait]
impl SrcResolver for FsResolver {
    async fn resolve_src(&self, src: &str, importer: &Path) -> Option<Resolved> {
        let relative = if src.starts_with('.') || Path::new(src).is_absolute() {
            src.to_string()
        } else {
            format!("./{}", src)
        };
        self.resolve_path(&relative, importer).map(Resolved::File)
    }
}

#[async_trait]
impl ModuleResolver for FsResolver {
    async fn resolve_module(&self, specifier: &str, importer: &Path) -> Option<Resolved> {
        self.resolve_path(specifier, importer)
            .or_else(|| self.resolve_package(specifier, importer))
            .map(Resolved::File)
    }
}

/// The host's resolver first, then the filesystem.
pub(crate) struct ChainResolver<'a> {
    pub src: Option<&'a dyn SrcResolver>,
    pub modules: &'a dyn ModuleResolver,
    pub fs: &'a FsResolver,
}

impl ChainResolver<'_> {
    pub async fn src(&self, src: &str, importer: &Path) -> Option<Resolved> {
        if let Some(resolver) = self.src {
            if let Some(resolved) = resolver.resolve_src(src, importer).await {
                return Some(resolved);
            }
        }
        self.fs.resolve_src(src, importer).await
    }

    pub async fn module(&self, specifier: &str, importer: &Path) -> Option<Resolved> {
        if let Some(resolved) = self.modules.resolve_module(specifier, importer).await {
            return Some(resolved);
        }
        self.fs.resolve_module(specifier, importer).await
    }
}

/// Content of a block's `src=` target.
#[derive(Debug)]
pub(crate) struct SrcContent {
    pub path: PathBuf,
    pub content: String,
}

/// Load the `src=` target of a block.
///
/// `inline` is the content between the block tags, which must be blank.
pub(crate) async fn load_block_src(
    resolver: &ChainResolver<'_>,
    filename: &Path,
    block: &str,
    src: &str,
    inline: &str,
) -> CompileResult<SrcContent> {
    let error = |reason| CompileError::StyleResolution {
        filename: filename.display().to_string(),
        block: block.to_string(),
        src: src.to_string(),
        reason,
    };

    if !inline.trim().is_empty() {
        return Err(error(SrcResolutionReason::CombinedSource));
    }

    match resolver.src(src, filename).await {
        Some(Resolved::File(path)) => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| CompileError::Io {
                    filename: path.display().to_string(),
                    source,
                })?;
            Ok(SrcContent { path, content })
        }
        Some(Resolved::Virtual(id)) => Err(error(SrcResolutionReason::VirtualModule { id })),
        None => Err(error(SrcResolutionReason::NotFound)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoResolver;

    #[async_trait]
    impl ModuleResolver for NoResolver {
        async fn resolve_module(&self, _: &str, _: &Path) -> Option<Resolved> {
            None
        }
    }

    #[test]
    fn test_resolves_extensions_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("components/card")).unwrap();
        std::fs::write(root.join("components/card/index.ts"), "").unwrap();
        std::fs::write(root.join("components/Button.vue"), "").unwrap();
        let importer = root.join("pages/index.vue");

        let fs = FsResolver::default();
        assert_eq!(
            fs.resolve_path("../components/Button", &importer),
            Some(root.join("components/Button.vue"))
        );
        assert_eq!(
            fs.resolve_path("../components/card", &importer),
            Some(root.join("components/card/index.ts"))
        );
        assert_eq!(fs.resolve_path("vue", &importer), None);
    }

    #[test]
    fn test_resolve_package() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@kirie/runtime");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("package.json"), "{}").unwrap();

        let fs = FsResolver::default();
        let importer = dir.path().join("src/app.vue");
        assert_eq!(fs.resolve_package("@kirie/runtime", &importer), Some(pkg));
        assert_eq!(fs.resolve_package("@kirie/missing", &importer), None);
    }

    #[tokio::test]
    async fn test_load_block_src_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.vue");
        std::fs::write(dir.path().join("a.css"), ".a {}").unwrap();
        let fs = FsResolver::default();
        let chain = ChainResolver {
            src: None,
            modules: &NoResolver,
            fs: &fs,
        };

        let loaded = load_block_src(&chain, &file, "style", "./a.css", "\n").await.unwrap();
        assert_eq!(loaded.content, ".a {}");

        let err = load_block_src(&chain, &file, "style", "./a.css", ".b {}")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::StyleResolution {
                reason: SrcResolutionReason::CombinedSource,
                ..
            }
        ));

        let err = load_block_src(&chain, &file, "style", "./missing.css", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::StyleResolution {
                reason: SrcResolutionReason::NotFound,
                ..
            }
        ));
    }
}
