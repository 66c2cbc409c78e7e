//! Style block processing: scope ids, scoped CSS and CSS modules.

use kirie_carton::hash::short_hash;
use std::collections::BTreeMap;

#[cfg(feature = "native")]
use lightningcss::css_modules::Config as CssModulesConfig;
#[cfg(feature = "native")]
use lightningcss::printer::PrinterOptions;
#[cfg(feature = "native")]
use lightningcss::stylesheet::{ParserOptions, StyleSheet};

/// Class-name maps of every module style block, keyed by module name.
pub type CssModules = BTreeMap<String, BTreeMap<String, String>>;

/// Generate the scope id for a component from its posix path.
///
/// Stable across runs for the same path.
pub fn generate_scope_id(posix_path: &str) -> String {
    let mut id = String::with_capacity(15);
    id.push_str("data-v-");
    id.push_str(&short_hash(posix_path));
    id
}

/// Options handed to a [`StyleCompiler`] for one block.
#[derive(Debug, Clone, Default)]
pub struct StyleCompileOptions {
    /// Component file the block belongs to
    pub filename: String,
    /// Scope attribute name, e.g. `data-v-1a2b3c4d`
    pub scope_id: String,
    pub scoped: bool,
    /// CSS module name when the block is a module
    pub module: Option<String>,
    /// Block language; preprocessing already happened when this is not `css`
    pub lang: String,
}

/// Result of compiling one style block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOutput {
    pub code: String,
    /// Local class name -> exported class name, for module blocks
    pub modules: Option<BTreeMap<String, String>>,
    pub warnings: Vec<String>,
}

/// Compiles style block content. Hosts may supply their own.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, source: &str, options: &StyleCompileOptions) -> StyleOutput;
}

/// Built-in compiler: lightningcss CSS modules plus attribute scoping.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStyleCompiler;

impl StyleCompiler for DefaultStyleCompiler {
    fn compile(&self, source: &str, options: &StyleCompileOptions) -> StyleOutput {
        let mut output = StyleOutput {
            code: source.to_string(),
            ..Default::default()
        };

        if options.module.is_some() {
            match compile_css_module(source, &options.filename) {
                Ok((code, classes)) => {
                    output.code = code;
                    output.modules = Some(classes);
                }
                Err(message) => {
                    output.warnings.push(message);
                    output.modules = Some(BTreeMap::new());
                }
            }
        }

        if options.scoped {
            output.code = apply_scoped_css(&output.code, &options.scope_id);
        }

        output
    }
}

/// Run a stylesheet through lightningcss CSS modules.
///
/// Returns the rewritten CSS and the local -> hashed class name map.
#[cfg(feature = "native")]
pub fn compile_css_module(
    css: &str,
    filename: &str,
) -> Result<(String, BTreeMap<String, String>), String> {
    let parser_options = ParserOptions {
        filename: filename.to_string(),
        css_modules: Some(CssModulesConfig::default()),
        error_recovery: true,
        ..Default::default()
    };

    let stylesheet = StyleSheet::parse(css, parser_options).map_err(|e| {
        let mut message = String::from("CSS parse error: ");
        message.push_str(&e.to_string());
        message
    })?;

    let result = stylesheet
        .to_css(PrinterOptions::default())
        .map_err(|e| format!("CSS print error: {}", e))?;

    let classes = result
        .exports
        .unwrap_or_default()
        .into_iter()
        .map(|(local, export)| (local, export.name))
        .collect();

    Ok((result.code, classes))
}

/// Compile CSS modules (wasm fallback - no LightningCSS)
#[cfg(not(feature = "native"))]
pub fn compile_css_module(
    _css: &str,
    filename: &str,
) -> Result<(String, BTreeMap<String, String>), String> {
    Err(format!(
        "{}: CSS modules require the `native` feature",
        filename
    ))
}

/// Render the `__cssModules` binding injected into the script.
pub fn css_modules_declaration(modules: &CssModules) -> String {
    let json = serde_json::to_string(modules).unwrap_or_else(|_| "{}".to_string());
    format!("const __cssModules = {};\n", json)
}

/// Block kinds that contain rules; everything else is copied verbatim.
const GROUPING_AT_RULES: &[&str] = &["media", "supports", "container", "layer", "document", "scope"];

enum CssBlock {
    /// `@media { ... }` and friends: holds nested rules
    Group,
    /// A style rule or an opaque at-rule (`@keyframes`, `@font-face`)
    Verbatim { nested: usize },
}

/// Apply scoped CSS transformation.
///
/// The scope attribute is appended to the last compound selector of every
/// rule, including rules nested in grouping at-rules. `@keyframes` and other
/// non-grouping at-rules pass through untouched.
pub fn apply_scoped_css(css: &str, scope_id: &str) -> String {
    let mut attr_selector = String::with_capacity(scope_id.len() + 2);
    attr_selector.push('[');
    attr_selector.push_str(scope_id);
    attr_selector.push(']');

    let mut output = String::with_capacity(css.len() + css.len() / 4);
    let mut stack: Vec<CssBlock> = Vec::new();
    let mut prelude = String::new();
    let mut rest = css;

    while let Some(c) = rest.chars().next() {
        // Comments and strings are copied as a unit
        if rest.starts_with("/*") {
            let end = rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
            output.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }
        if c == '"' || c == '\'' {
            let end = string_end(rest, c);
            match stack.last() {
                Some(CssBlock::Verbatim { .. }) => output.push_str(&rest[..end]),
                _ => prelude.push_str(&rest[..end]),
            }
            rest = &rest[end..];
            continue;
        }
        rest = &rest[c.len_utf8()..];

        match stack.last_mut() {
            Some(CssBlock::Verbatim { nested }) => match c {
                '{' => {
                    *nested += 1;
                    output.push(c);
                }
                '}' => {
                    output.push(c);
                    if *nested == 0 {
                        stack.pop();
                    } else {
                        *nested -= 1;
                    }
                }
                _ => output.push(c),
            },
            None | Some(CssBlock::Group) => match c {
                '{' => {
                    let (lead, body, trail) = split_whitespace_edges(&prelude);
                    output.push_str(lead);
                    if let Some(at_rule) = body.strip_prefix('@') {
                        output.push_str(body);
                        let name = at_rule
                            .split(|ch: char| ch.is_whitespace() || ch == '(')
                            .next()
                            .unwrap_or("")
                            .to_ascii_lowercase();
                        if GROUPING_AT_RULES.contains(&name.as_str()) {
                            stack.push(CssBlock::Group);
                        } else {
                            stack.push(CssBlock::Verbatim { nested: 0 });
                        }
                    } else {
                        output.push_str(&scope_selector(body, &attr_selector));
                        stack.push(CssBlock::Verbatim { nested: 0 });
                    }
                    output.push_str(trail);
                    output.push('{');
                    prelude.clear();
                }
                ';' => {
                    // Statement at-rules such as `@import url(a.css);`
                    output.push_str(&prelude);
                    output.push(';');
                    prelude.clear();
                }
                '}' => {
                    output.push_str(&prelude);
                    output.push('}');
                    prelude.clear();
                    stack.pop();
                }
                _ => prelude.push(c),
            },
        }
    }

    output.push_str(&prelude);
    output
}

/// Byte length of the quoted string at the start of `s`, quotes included.
fn string_end(s: &str, quote: char) -> usize {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return i + c.len_utf8();
        }
    }
    s.len()
}

fn split_whitespace_edges(s: &str) -> (&str, &str, &str) {
    let start = s.len() - s.trim_start().len();
    let end = s.trim_end().len().max(start);
    (&s[..start], &s[start..end], &s[end..])
}

/// Add scope attribute to a selector list
fn scope_selector(selector: &str, attr_selector: &str) -> String {
    split_top_level(selector, ',')
        .into_iter()
        .map(|s| scope_single_selector(s.trim(), attr_selector))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split on `sep` outside of parentheses and brackets.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Add scope attribute to a single selector
fn scope_single_selector(selector: &str, attr_selector: &str) -> String {
    if selector.is_empty() {
        return selector.to_string();
    }

    if selector.contains(":deep(") || selector.contains("::v-deep(") {
        return transform_deep(selector, attr_selector);
    }

    if selector.contains(":global(") {
        return transform_global(selector);
    }

    let start = last_compound_start(selector);
    let mut result = String::with_capacity(selector.len() + attr_selector.len());
    result.push_str(&selector[..start]);
    result.push_str(&add_scope_to_element(&selector[start..], attr_selector));
    result
}

/// Byte offset where the last compound selector begins.
fn last_compound_start(selector: &str) -> usize {
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ' ' | '\t' | '\n' | '>' | '+' | '~' if depth == 0 => start = i + c.len_utf8(),
            _ => {}
        }
    }
    start
}

/// Add scope attribute to a compound selector, before its first pseudo.
fn add_scope_to_element(selector: &str, attr_selector: &str) -> String {
    let mut depth = 0usize;
    let mut prev = '\0';
    let mut pseudo_pos = None;
    for (i, c) in selector.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 && prev != '\\' => {
                pseudo_pos = Some(i);
                break;
            }
            _ => {}
        }
        prev = c;
    }

    let split = pseudo_pos.unwrap_or(selector.len());
    let (before, after) = selector.split_at(split);
    let mut result = String::with_capacity(before.len() + attr_selector.len() + after.len());
    result.push_str(before);
    result.push_str(attr_selector);
    result.push_str(after);
    result
}

/// Transform :deep() to descendant selector
fn transform_deep(selector: &str, attr_selector: &str) -> String {
    // :deep(.child) -> [data-v-xxx] .child
    let (start, open_len) = match selector.find("::v-deep(") {
        Some(pos) => (pos, 9),
        None => match selector.find(":deep(") {
            Some(pos) => (pos, 6),
            None => return selector.to_string(),
        },
    };

    let before = selector[..start].trim();
    let after = &selector[start + open_len..];
    let Some(end) = matching_paren(after) else {
        return selector.to_string();
    };
    let inner = &after[..end];
    let rest = &after[end + 1..];

    let mut result = if before.is_empty() {
        attr_selector.to_string()
    } else {
        scope_single_selector(before, attr_selector)
    };
    result.push(' ');
    result.push_str(inner.trim());
    result.push_str(rest);
    result
}

/// Transform :global() to unscoped
fn transform_global(selector: &str) -> String {
    // :global(.class) -> .class
    let Some(start) = selector.find(":global(") else {
        return selector.to_string();
    };
    let before = &selector[..start];
    let after = &selector[start + 8..];
    let Some(end) = matching_paren(after) else {
        return selector.to_string();
    };

    let mut result = String::with_capacity(selector.len());
    result.push_str(before);
    result.push_str(&after[..end]);
    result.push_str(&after[end + 1..]);
    result
}

/// Offset of the `)` closing an already-opened parenthesis.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
