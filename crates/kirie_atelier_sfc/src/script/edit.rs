//! Position-preserving text edits over an immutable source.
//!
//! Edits are recorded against byte offsets of the original text and applied
//! in one splice, so earlier edits never shift the offsets of later ones.

use oxc_span::Span;

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
    seq: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EditList {
    edits: Vec<Edit>,
}

impl EditList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.push(at, at, text.into());
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.push(span.start, span.end, text.into());
    }

    pub fn remove(&mut self, span: Span) {
        self.push(span.start, span.end, String::new());
    }

    fn push(&mut self, start: u32, end: u32, text: String) {
        let seq = self.edits.len();
        self.edits.push(Edit {
            start,
            end,
            text,
            seq,
        });
    }

    /// Apply every edit to `source`.
    pub fn apply(&self, source: &str) -> String {
        self.apply_range(source, 0, source.len() as u32)
    }

    /// Apply the edits that fall inside `start..end` and return that slice.
    ///
    /// An insertion exactly at `start` belongs to the preceding range, except
    /// at offset 0. An edit crossing a range boundary is clipped to the range
    /// when the part left outside is whitespace. Edits overlapping an
    /// already-applied replacement are dropped.
    pub fn apply_range(&self, source: &str, start: u32, end: u32) -> String {
        let mut edits: Vec<(u32, u32, &Edit)> = self
            .edits
            .iter()
            .filter_map(|e| clip(source, e, start, end).map(|(s, t)| (s, t, e)))
            .collect();
        edits.sort_by_key(|(s, t, e)| (*s, *t, e.seq));

        let mut out = String::with_capacity((end - start) as usize + 64);
        let mut cursor = start as usize;
        for (edit_start, edit_end, edit) in edits {
            let (edit_start, edit_end) = (edit_start as usize, edit_end as usize);
            if edit_start < cursor {
                continue;
            }
            out.push_str(&source[cursor..edit_start]);
            out.push_str(&edit.text);
            cursor = edit_end;
        }
        out.push_str(&source[cursor..end as usize]);
        out
    }
}

/// The part of `edit` that applies to `start..end`, if any.
fn clip(source: &str, edit: &Edit, start: u32, end: u32) -> Option<(u32, u32)> {
    if edit.start == edit.end {
        let inside = edit.start >= start && edit.start <= end;
        return (inside && (edit.start > start || start == 0)).then_some((edit.start, edit.end));
    }
    if edit.start >= start && edit.end <= end {
        return Some((edit.start, edit.end));
    }
    if edit.end <= start || edit.start >= end {
        return None;
    }
    let (s, t) = (edit.start.max(start), edit.end.min(end));
    let blank = |from: u32, to: u32| source[from as usize..to as usize].trim().is_empty();
    (blank(edit.start, s) && blank(t, edit.end) && !blank(s, t)).then_some((s, t))
}

/// Widen `span` over a following comma and the spaces around it, for
/// removing one element from a comma separated list.
pub fn extend_over_comma(source: &str, span: Span) -> Span {
    let rest = &source[span.end as usize..];
    let trimmed = rest.trim_start();
    match trimmed.strip_prefix(',') {
        Some(after) => {
            let after_spaces = after.trim_start_matches([' ', '\t']);
            let consumed = rest.len() - after_spaces.len();
            Span::new(span.start, span.end + consumed as u32)
        }
        None => span,
    }
}

/// Widen `span` to its whole line, newline included, when nothing else
/// shares that line.
pub fn extend_over_line(source: &str, span: Span) -> Span {
    let (start, end) = (span.start as usize, span.end as usize);
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    if !source[line_start..start].trim().is_empty() {
        return span;
    }
    let line_end = source[end..]
        .find('\n')
        .map_or(source.len(), |i| end + i + 1);
    if !source[end..line_end].trim().is_empty() {
        return span;
    }
    Span::new(line_start as u32, line_end as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_insert() {
        let source = "const a = defineProps()\nfoo()";
        let mut edits = EditList::new();
        edits.replace(Span::new(10, 23), "__props");
        edits.insert(source.len() as u32, ";");
        assert_eq!(edits.apply(source), "const a = __props\nfoo();");
    }

    #[test]
    fn test_inserts_at_same_offset_keep_order() {
        let mut edits = EditList::new();
        edits.insert(1, "x");
        edits.insert(1, "y");
        assert_eq!(edits.apply("ab"), "axyb");
    }

    #[test]
    fn test_overlapping_edit_is_dropped() {
        let mut edits = EditList::new();
        edits.remove(Span::new(0, 5));
        edits.replace(Span::new(2, 3), "Z");
        assert_eq!(edits.apply("abcdefg"), "fg");
    }

    #[test]
    fn test_apply_range() {
        let source = "aaa;bbb;";
        let mut edits = EditList::new();
        edits.replace(Span::new(0, 3), "A");
        edits.replace(Span::new(4, 7), "B");
        edits.insert(4, "!");
        assert_eq!(edits.apply_range(source, 0, 4), "A;!");
        assert_eq!(edits.apply_range(source, 4, 8), "B;");
    }

    #[test]
    fn test_apply_range_clips_whitespace_overhang() {
        let source = "a();\n__expose();\nb();";
        let mut edits = EditList::new();
        edits.remove(extend_over_line(source, Span::new(5, 16)));
        assert_eq!(edits.apply_range(source, 4, 16), "\n");
        assert_eq!(edits.apply_range(source, 16, 21), "\nb();");
        assert_eq!(edits.apply(source), "a();\nb();");
    }

    #[test]
    fn test_apply_range_keeps_edits_with_code_outside() {
        let source = "aaa;bbb;";
        let mut edits = EditList::new();
        edits.remove(Span::new(2, 6));
        assert_eq!(edits.apply_range(source, 0, 4), "aaa;");
        assert_eq!(edits.apply_range(source, 4, 8), "bbb;");
    }

    #[test]
    fn test_extend_over_comma() {
        let source = "{ __name: 'A' , b: 1 }";
        let span = extend_over_comma(source, Span::new(2, 13));
        assert_eq!(&source[span.start as usize..span.end as usize], "__name: 'A' , ");
        let last = extend_over_comma(source, Span::new(16, 20));
        assert_eq!(&source[last.start as usize..last.end as usize], "b: 1");
    }

    #[test]
    fn test_extend_over_line() {
        let source = "a();\n    __expose();\nb();";
        let span = extend_over_line(source, Span::new(9, 20));
        assert_eq!(&source[span.start as usize..span.end as usize], "    __expose();\n");
        let shared = extend_over_line(source, Span::new(0, 3));
        assert_eq!(shared, Span::new(0, 3));
    }
}
