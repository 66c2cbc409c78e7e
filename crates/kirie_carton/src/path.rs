//! Path helpers.

use std::path::{Component, Path, PathBuf};

/// Render a path with forward slashes regardless of platform.
pub fn to_posix(path: &Path) -> String {
    let mut out = String::new();
    for (i, component) in path.components().enumerate() {
        match component {
            Component::RootDir => {
                out.push('/');
                continue;
            }
            Component::Prefix(prefix) => {
                out.push_str(&prefix.as_os_str().to_string_lossy());
                continue;
            }
            _ => {}
        }
        if i > 0 && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Lexically normalise `.` and `..` segments without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `/`-prefixed, extension-less path of `file` relative to `root`.
///
/// `src/components/card/index.vue` under `src` becomes `/components/card/index`.
/// Returns `None` when `file` is not inside `root`.
pub fn output_component_path(root: &Path, file: &Path) -> Option<String> {
    let relative = normalize(file)
        .strip_prefix(normalize(root))
        .ok()?
        .with_extension("");
    let mut out = String::from("/");
    out.push_str(&to_posix(&relative));
    Some(out)
}
