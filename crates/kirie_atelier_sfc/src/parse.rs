//! SFC block extraction.
//!
//! Zero-copy design with byte-level operations. Block contents are slices of
//! the source, so concatenating prefix, content and suffix of every block
//! reproduces the original text.

use crate::error::{CompileError, CompileResult};
use crate::types::*;
use kirie_carton::FxHashMap;
use memchr::memchr;
use std::borrow::Cow;

// Static closing tags for fast comparison (avoid format!)
const CLOSING_TEMPLATE: &[u8] = b"</template>";
const CLOSING_SCRIPT: &[u8] = b"</script>";
const CLOSING_STYLE: &[u8] = b"</style>";

const TAG_TEMPLATE: &str = "template";
const TAG_SCRIPT: &str = "script";
const TAG_STYLE: &str = "style";

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";

/// A block found by the scanner, before it is sorted into the descriptor.
struct RawBlock<'a> {
    tag: &'a str,
    attrs: Attrs<'a>,
    content: Cow<'a, str>,
    content_start: usize,
    content_end: usize,
    end_pos: usize,
    end_line: usize,
    end_column: usize,
}

enum BlockScan<'a> {
    Block(RawBlock<'a>),
    /// `<` that does not open a tag (stray text, closing tag, etc.)
    NotABlock,
    /// An opening tag whose closing tag never appears.
    Unclosed { tag: &'a str },
}

/// Parse a component file into a descriptor with zero-copy strings.
///
/// The first structural problem (duplicate block, unclosed block, `<script>`
/// next to `<script setup>`) is reported as [`CompileError::SfcParse`].
pub fn parse_sfc<'a>(source: &'a str, options: SfcParseOptions) -> CompileResult<SfcDescriptor<'a>> {
    let filename = options.filename;
    let fail = |message: String, line: usize, column: usize| CompileError::SfcParse {
        filename: filename.clone(),
        message,
        line,
        column,
    };

    let mut descriptor = SfcDescriptor {
        filename: Cow::Owned(filename.clone()),
        source: Cow::Borrowed(source),
        ..Default::default()
    };

    let bytes = source.as_bytes();
    let len = bytes.len();

    let mut pos = 0;
    let mut line = 1;
    let mut column = 1;

    while pos < len {
        // Use memchr to find next '<' quickly
        if bytes[pos] != b'<' {
            let Some(next_lt) = memchr(b'<', &bytes[pos..]) else {
                break;
            };
            advance_position(&bytes[pos..pos + next_lt], &mut line, &mut column);
            pos += next_lt;
        }

        // Top-level comments may contain anything, including block tags
        if starts_with_bytes(&bytes[pos..], COMMENT_OPEN) {
            let body = pos + COMMENT_OPEN.len();
            let end = memchr::memmem::find(&bytes[body..], COMMENT_CLOSE)
                .map(|offset| body + offset + COMMENT_CLOSE.len())
                .unwrap_or(len);
            advance_position(&bytes[pos..end], &mut line, &mut column);
            pos = end;
            continue;
        }

        match scan_block(bytes, source, pos, line) {
            BlockScan::Block(block) => {
                let loc = BlockLocation {
                    start: block.content_start,
                    end: block.content_end,
                    start_line: line,
                    start_column: column,
                    end_line: block.end_line,
                    end_column: block.end_column,
                };
                let (start_line, start_column) = (line, column);
                pos = block.end_pos;
                line = block.end_line;
                column = block.end_column;

                let RawBlock {
                    tag,
                    attrs,
                    content,
                    ..
                } = block;

                if tag.eq_ignore_ascii_case(TAG_TEMPLATE) {
                    if descriptor.template.is_some() {
                        return Err(fail(
                            "SFC can only contain one <template> block".into(),
                            start_line,
                            start_column,
                        ));
                    }
                    descriptor.template = Some(SfcTemplateBlock {
                        content,
                        loc,
                        lang: attrs.get("lang").cloned(),
                        src: attrs.get("src").cloned(),
                        attrs,
                    });
                } else if tag.eq_ignore_ascii_case(TAG_SCRIPT) {
                    let is_setup = attrs.contains_key("setup");
                    let slot = if is_setup {
                        &mut descriptor.script_setup
                    } else {
                        &mut descriptor.script
                    };
                    if slot.is_some() {
                        let which = if is_setup { "<script setup>" } else { "<script>" };
                        return Err(fail(
                            format!("SFC can only contain one {} block", which),
                            start_line,
                            start_column,
                        ));
                    }
                    *slot = Some(SfcScriptBlock {
                        content,
                        loc,
                        lang: attrs.get("lang").cloned(),
                        src: attrs.get("src").cloned(),
                        setup: is_setup,
                        attrs,
                    });
                } else if tag.eq_ignore_ascii_case(TAG_STYLE) {
                    let scoped = attrs.contains_key("scoped");
                    let module = attrs.get("module").map(|name| {
                        if name.is_empty() {
                            Cow::Borrowed("$style")
                        } else {
                            name.clone()
                        }
                    });
                    descriptor.styles.push(SfcStyleBlock {
                        content,
                        loc,
                        lang: attrs.get("lang").cloned(),
                        src: attrs.get("src").cloned(),
                        scoped,
                        module,
                        attrs,
                    });
                } else {
                    descriptor.custom_blocks.push(SfcCustomBlock {
                        block_type: Cow::Borrowed(tag),
                        content,
                        loc,
                        attrs,
                    });
                }
            }
            BlockScan::Unclosed { tag } => {
                return Err(fail(
                    format!("Element <{}> is missing end tag", tag),
                    line,
                    column,
                ));
            }
            BlockScan::NotABlock => {
                pos += 1;
                column += 1;
            }
        }
    }

    if let (Some(_), Some(setup)) = (&descriptor.script, &descriptor.script_setup) {
        return Err(fail(
            "<script> and <script setup> cannot be used in the same file".into(),
            setup.loc.start_line,
            setup.loc.start_column,
        ));
    }

    Ok(descriptor)
}

#[inline]
fn advance_position(skipped: &[u8], line: &mut usize, column: &mut usize) {
    for &b in skipped {
        if b == b'\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    }
}

/// Scan a single block starting at `<`.
fn scan_block<'a>(bytes: &[u8], source: &'a str, start: usize, start_line: usize) -> BlockScan<'a> {
    let len = bytes.len();

    // Skip '<'
    let mut pos = start + 1;
    if pos >= len {
        return BlockScan::NotABlock;
    }

    let tag_start = pos;
    while pos < len && is_tag_name_char_fast(bytes[pos]) {
        pos += 1;
    }
    if pos == tag_start || !bytes[tag_start].is_ascii_alphabetic() {
        return BlockScan::NotABlock;
    }
    // Tag names are ASCII, so this slice is on char boundaries
    let tag = &source[tag_start..pos];

    let mut attrs: Attrs<'a> = FxHashMap::default();

    while pos < len && bytes[pos] != b'>' {
        while pos < len && is_whitespace_fast(bytes[pos]) {
            pos += 1;
        }

        if pos >= len || bytes[pos] == b'>' {
            break;
        }
        if bytes[pos] == b'/' {
            if pos + 1 < len && bytes[pos + 1] == b'>' {
                break;
            }
            pos += 1;
            continue;
        }

        let attr_start = pos;
        while pos < len && !matches!(bytes[pos], b'=' | b'>' | b'/') && !is_whitespace_fast(bytes[pos]) {
            pos += 1;
        }

        if pos == attr_start {
            pos += 1;
            continue;
        }

        let attr_name: Cow<'a, str> = Cow::Borrowed(&source[attr_start..pos]);

        while pos < len && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }

        let attr_value: Cow<'a, str> = if pos < len && bytes[pos] == b'=' {
            pos += 1;

            while pos < len && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
                pos += 1;
            }

            if pos < len && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                let quote_char = bytes[pos];
                pos += 1;
                let value_start = pos;
                let value_end = memchr(quote_char, &bytes[pos..])
                    .map(|offset| pos + offset)
                    .unwrap_or(len);
                pos = (value_end + 1).min(len);
                Cow::Borrowed(&source[value_start..value_end])
            } else {
                let value_start = pos;
                while pos < len && !matches!(bytes[pos], b'>' | b'/') && !is_whitespace_fast(bytes[pos]) {
                    pos += 1;
                }
                Cow::Borrowed(&source[value_start..pos])
            }
        } else {
            // Boolean attribute
            Cow::Borrowed("")
        };

        attrs.insert(attr_name, attr_value);
    }

    if pos >= len {
        return BlockScan::Unclosed { tag };
    }

    // Self-closing tag: `<script src="./x.ts" />`
    if bytes[pos] == b'/' {
        pos += 1;
        if pos < len && bytes[pos] == b'>' {
            pos += 1;
        }
        return BlockScan::Block(RawBlock {
            tag,
            attrs,
            content: Cow::Borrowed(""),
            content_start: pos,
            content_end: pos,
            end_pos: pos,
            end_line: start_line,
            end_column: pos - start + 1,
        });
    }

    // Skip '>'
    pos += 1;
    let content_start = pos;

    let closing = if tag.eq_ignore_ascii_case(TAG_TEMPLATE) {
        find_template_end(bytes, pos)
    } else if tag.eq_ignore_ascii_case(TAG_SCRIPT) {
        find_closing(bytes, pos, CLOSING_SCRIPT)
    } else if tag.eq_ignore_ascii_case(TAG_STYLE) {
        find_closing(bytes, pos, CLOSING_STYLE)
    } else {
        find_custom_block_end(bytes, pos, tag.as_bytes())
    };

    let Some((content_end, end_pos)) = closing else {
        return BlockScan::Unclosed { tag };
    };

    let mut end_line = start_line;
    let mut last_newline = None;
    for (offset, &b) in bytes[start..end_pos].iter().enumerate() {
        if b == b'\n' {
            end_line += 1;
            last_newline = Some(start + offset);
        }
    }
    let end_column = match last_newline {
        Some(nl) => end_pos - nl,
        None => end_pos - start + 1,
    };

    BlockScan::Block(RawBlock {
        tag,
        attrs,
        content: Cow::Borrowed(&source[content_start..content_end]),
        content_start,
        content_end,
        end_pos,
        end_line,
        end_column,
    })
}

/// Template block: handle nested `<template>` tags.
/// Returns `(content_end, end_pos)`.
fn find_template_end(bytes: &[u8], mut pos: usize) -> Option<(usize, usize)> {
    let len = bytes.len();
    let mut depth = 1;

    while pos < len {
        let lt_offset = memchr(b'<', &bytes[pos..])?;
        pos += lt_offset;

        if starts_with_bytes(&bytes[pos..], CLOSING_TEMPLATE) {
            depth -= 1;
            if depth == 0 {
                return Some((pos, pos + CLOSING_TEMPLATE.len()));
            }
            pos += CLOSING_TEMPLATE.len();
            continue;
        }

        let name_end = pos + 1 + TAG_TEMPLATE.len();
        if starts_with_bytes(&bytes[pos + 1..], TAG_TEMPLATE.as_bytes())
            && name_end < len
            && (bytes[name_end] == b'>' || is_whitespace_fast(bytes[name_end]))
        {
            let tag_end = memchr(b'>', &bytes[name_end..]).map(|offset| name_end + offset);
            let self_closing = tag_end.is_some_and(|end| bytes[end - 1] == b'/');
            if !self_closing {
                depth += 1;
            }
        }

        pos += 1;
    }

    None
}

/// Script/style blocks: content ends at the first static closing tag.
fn find_closing(bytes: &[u8], mut pos: usize, closing_tag: &[u8]) -> Option<(usize, usize)> {
    while pos < bytes.len() {
        let lt_offset = memchr(b'<', &bytes[pos..])?;
        pos += lt_offset;
        if starts_with_bytes(&bytes[pos..], closing_tag) {
            return Some((pos, pos + closing_tag.len()));
        }
        pos += 1;
    }
    None
}

/// Custom block: find `</name>` for a dynamic tag name.
fn find_custom_block_end(bytes: &[u8], mut pos: usize, tag_name: &[u8]) -> Option<(usize, usize)> {
    let len = bytes.len();

    while pos < len {
        let lt_offset = memchr(b'<', &bytes[pos..])?;
        pos += lt_offset;

        if pos + 2 < len && bytes[pos + 1] == b'/' {
            let close_tag_start = pos + 2;
            let after_name = close_tag_start + tag_name.len();
            if after_name < len
                && bytes[close_tag_start..after_name].eq_ignore_ascii_case(tag_name)
                && bytes[after_name] == b'>'
            {
                return Some((pos, after_name + 1));
            }
        }
        pos += 1;
    }

    None
}

/// Fast byte slice prefix check
#[inline(always)]
fn starts_with_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// Fast tag name character check
#[inline(always)]
fn is_tag_name_char_fast(b: u8) -> bool {
    matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_')
}

/// Fast whitespace check
#[inline(always)]
fn is_whitespace_fast(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
