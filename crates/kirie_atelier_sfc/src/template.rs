//! Template collaborator seam and lightweight template scanning.
//!
//! Template compilation itself belongs to the host; this module only defines
//! the interface and scans markup for the tags and identifiers the rest of
//! the pipeline needs.

use kirie_carton::FxHashSet;
use memchr::memchr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How `class`/`style` bindings are lowered in templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStyleRuntime {
    /// Bindings are resolved at compile time where possible
    #[default]
    Static,
    /// Bindings are resolved by the runtime helper
    Runtime,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCompileOptions {
    pub filename: String,
    /// Scope id when at least one style block is scoped
    pub scope_id: Option<String>,
    pub class_style_runtime: ClassStyleRuntime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateOutput {
    pub code: String,
    pub warnings: Vec<String>,
}

/// Compiles template markup into the mini-program template format.
pub trait TemplateCompiler: Send + Sync {
    fn compile(&self, source: &str, options: &TemplateCompileOptions) -> TemplateOutput;
}

/// Returns the markup unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTemplateCompiler;

impl TemplateCompiler for PassthroughTemplateCompiler {
    fn compile(&self, source: &str, _options: &TemplateCompileOptions) -> TemplateOutput {
        TemplateOutput {
            code: source.to_string(),
            warnings: Vec::new(),
        }
    }
}

/// Collect every opening tag name used in a template, in sorted order.
pub fn collect_tags(template: &str) -> BTreeSet<String> {
    let bytes = template.as_bytes();
    let mut tags = BTreeSet::new();
    let mut pos = 0;

    while let Some(offset) = memchr(b'<', &bytes[pos..]) {
        pos += offset + 1;
        if bytes[pos..].starts_with(b"!--") {
            match memchr::memmem::find(&bytes[pos..], b"-->") {
                Some(end) => pos += end + 3,
                None => break,
            }
            continue;
        }
        let start = pos;
        while pos < bytes.len() && is_tag_char(bytes[pos]) {
            pos += 1;
        }
        if pos > start && bytes[start].is_ascii_alphabetic() {
            tags.insert(template[start..pos].to_string());
        }
    }

    tags
}

#[inline]
fn is_tag_char(b: u8) -> bool {
    matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b':')
}

/// Collect identifier-like words used in a template.
///
/// This over-approximates: any word in markup counts. Used to decide which
/// value imports must stay reachable from `setup()` bindings.
pub fn collect_identifiers(template: &str) -> FxHashSet<String> {
    let mut idents = FxHashSet::default();
    let mut current = String::new();
    for c in template.chars() {
        if c == '_' || c == '$' || c.is_ascii_alphanumeric() {
            current.push(c);
        } else if !current.is_empty() {
            if !current.as_bytes()[0].is_ascii_digit() {
                idents.insert(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if !current.is_empty() && !current.as_bytes()[0].is_ascii_digit() {
        idents.insert(current);
    }
    idents
}

/// `MyCard` -> `my-card`
pub fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.char_indices() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
