//! SFC type definitions.
//!
//! Zero-copy design using borrowed strings; call `into_owned` to get a
//! private copy that can be rewritten (e.g. when `src=` content is inlined).

use kirie_carton::FxHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub type Attrs<'a> = FxHashMap<Cow<'a, str>, Cow<'a, str>>;

/// SFC Descriptor - parsed result of a component file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcDescriptor<'a> {
    /// Filename
    #[serde(borrow)]
    pub filename: Cow<'a, str>,

    /// Source code
    #[serde(borrow)]
    pub source: Cow<'a, str>,

    /// Template block
    pub template: Option<SfcTemplateBlock<'a>>,

    /// Script block (options API or <script> without setup)
    pub script: Option<SfcScriptBlock<'a>>,

    /// Script setup block
    pub script_setup: Option<SfcScriptBlock<'a>>,

    /// Style blocks, in document order
    pub styles: Vec<SfcStyleBlock<'a>>,

    /// Custom blocks, in document order
    pub custom_blocks: Vec<SfcCustomBlock<'a>>,
}

impl<'a> Default for SfcDescriptor<'a> {
    fn default() -> Self {
        Self {
            filename: Cow::Borrowed(""),
            source: Cow::Borrowed(""),
            template: None,
            script: None,
            script_setup: None,
            styles: Vec::new(),
            custom_blocks: Vec::new(),
        }
    }
}

impl<'a> SfcDescriptor<'a> {
    /// Convert to owned version (for rewriting or storage)
    pub fn into_owned(self) -> SfcDescriptor<'static> {
        SfcDescriptor {
            filename: Cow::Owned(self.filename.into_owned()),
            source: Cow::Owned(self.source.into_owned()),
            template: self.template.map(|t| t.into_owned()),
            script: self.script.map(|s| s.into_owned()),
            script_setup: self.script_setup.map(|s| s.into_owned()),
            styles: self.styles.into_iter().map(|s| s.into_owned()).collect(),
            custom_blocks: self
                .custom_blocks
                .into_iter()
                .map(|c| c.into_owned())
                .collect(),
        }
    }

    /// The script that carries component logic: `<script setup>` when present,
    /// otherwise the plain `<script>`.
    pub fn primary_script(&self) -> Option<&SfcScriptBlock<'a>> {
        self.script_setup.as_ref().or(self.script.as_ref())
    }
}

fn owned_attrs(attrs: Attrs<'_>) -> Attrs<'static> {
    attrs
        .into_iter()
        .map(|(k, v)| (Cow::Owned(k.into_owned()), Cow::Owned(v.into_owned())))
        .collect()
}

fn owned_opt(value: Option<Cow<'_, str>>) -> Option<Cow<'static, str>> {
    value.map(|s| Cow::Owned(s.into_owned()))
}

/// Template block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcTemplateBlock<'a> {
    /// Block content
    #[serde(borrow)]
    pub content: Cow<'a, str>,

    /// Block location in source
    pub loc: BlockLocation,

    /// Template language (default: html)
    #[serde(default, borrow)]
    pub lang: Option<Cow<'a, str>>,

    /// Source attribute for external template
    #[serde(default, borrow)]
    pub src: Option<Cow<'a, str>>,

    /// Additional attributes
    #[serde(default)]
    pub attrs: Attrs<'a>,
}

impl<'a> SfcTemplateBlock<'a> {
    /// Convert to owned version
    pub fn into_owned(self) -> SfcTemplateBlock<'static> {
        SfcTemplateBlock {
            content: Cow::Owned(self.content.into_owned()),
            loc: self.loc,
            lang: owned_opt(self.lang),
            src: owned_opt(self.src),
            attrs: owned_attrs(self.attrs),
        }
    }
}

/// Script block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcScriptBlock<'a> {
    /// Block content
    #[serde(borrow)]
    pub content: Cow<'a, str>,

    /// Block location in source
    pub loc: BlockLocation,

    /// Script language (js/ts)
    #[serde(default, borrow)]
    pub lang: Option<Cow<'a, str>>,

    /// Source attribute for external script
    #[serde(default, borrow)]
    pub src: Option<Cow<'a, str>>,

    /// Whether this is script setup
    #[serde(default)]
    pub setup: bool,

    /// Additional attributes
    #[serde(default)]
    pub attrs: Attrs<'a>,
}

impl<'a> SfcScriptBlock<'a> {
    /// Convert to owned version
    pub fn into_owned(self) -> SfcScriptBlock<'static> {
        SfcScriptBlock {
            content: Cow::Owned(self.content.into_owned()),
            loc: self.loc,
            lang: owned_opt(self.lang),
            src: owned_opt(self.src),
            setup: self.setup,
            attrs: owned_attrs(self.attrs),
        }
    }

    pub fn is_ts(&self) -> bool {
        matches!(self.lang.as_deref(), Some("ts" | "tsx" | "mts" | "cts"))
    }
}

/// Style block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcStyleBlock<'a> {
    /// Block content
    #[serde(borrow)]
    pub content: Cow<'a, str>,

    /// Block location in source
    pub loc: BlockLocation,

    /// Style language (css/scss/less/etc)
    #[serde(default, borrow)]
    pub lang: Option<Cow<'a, str>>,

    /// Source attribute for external style
    #[serde(default, borrow)]
    pub src: Option<Cow<'a, str>>,

    /// Whether the style is scoped
    #[serde(default)]
    pub scoped: bool,

    /// CSS module name; a bare `module` attribute yields `$style`
    #[serde(default, borrow)]
    pub module: Option<Cow<'a, str>>,

    /// Additional attributes
    #[serde(default)]
    pub attrs: Attrs<'a>,
}

impl<'a> SfcStyleBlock<'a> {
    /// Convert to owned version
    pub fn into_owned(self) -> SfcStyleBlock<'static> {
        SfcStyleBlock {
            content: Cow::Owned(self.content.into_owned()),
            loc: self.loc,
            lang: owned_opt(self.lang),
            src: owned_opt(self.src),
            scoped: self.scoped,
            module: owned_opt(self.module),
            attrs: owned_attrs(self.attrs),
        }
    }

    /// Language of the block, `css` when unspecified.
    pub fn lang_or_css(&self) -> &str {
        self.lang.as_deref().unwrap_or("css")
    }
}

/// Custom block (e.g. `<json>`, `<config>`, `<docs>`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcCustomBlock<'a> {
    /// Block type/tag name
    #[serde(rename = "type", borrow)]
    pub block_type: Cow<'a, str>,

    /// Block content
    #[serde(borrow)]
    pub content: Cow<'a, str>,

    /// Block location in source
    pub loc: BlockLocation,

    /// Additional attributes
    #[serde(default)]
    pub attrs: Attrs<'a>,
}

impl<'a> SfcCustomBlock<'a> {
    /// Convert to owned version
    pub fn into_owned(self) -> SfcCustomBlock<'static> {
        SfcCustomBlock {
            block_type: Cow::Owned(self.block_type.into_owned()),
            content: Cow::Owned(self.content.into_owned()),
            loc: self.loc,
            attrs: owned_attrs(self.attrs),
        }
    }

    pub fn lang(&self) -> Option<&str> {
        self.attrs.get("lang").map(|v| v.as_ref())
    }
}

/// Location information for a block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    /// Start offset of the content in source
    pub start: usize,

    /// End offset of the content in source
    pub end: usize,

    /// Start line (1-based)
    pub start_line: usize,

    /// Start column (1-based)
    pub start_column: usize,

    /// End line (1-based)
    pub end_line: usize,

    /// End column (1-based)
    pub end_column: usize,
}

/// Parse options for SFC
#[derive(Debug, Clone, Default)]
pub struct SfcParseOptions {
    /// Filename, used in diagnostics
    pub filename: String,
}

/// What a component file is in the mini-program output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    App,
    Page,
    #[default]
    Component,
}

impl RouteKind {
    pub fn is_page(self) -> bool {
        self == RouteKind::Page
    }
}
