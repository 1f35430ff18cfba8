//! Utility functions shared by the bundler plugin and the obfuscator.
//!
//! - Span-based source rewriting (edits are applied to the original text, so
//!   untouched code keeps its exact bytes)
//! - Post-build output normalization

use tracing::trace;

// ---------------------------------------------------------------------------
// Source edits
// ---------------------------------------------------------------------------

/// A replacement of `source[start..end]`; `start == end` is an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

/// An unordered collection of edits against one source string.
#[derive(Debug, Default)]
pub struct SourceEdits {
    edits: Vec<Edit>,
}

impl SourceEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
        });
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.replace(at, at, text);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all edits. Insertions at an offset land before a replacement
    /// starting at the same offset; insertions at one offset keep their
    /// recording order. An edit overlapping an earlier one is dropped.
    pub fn apply(mut self, source: &str) -> String {
        self.edits.sort_by_key(|e| (e.start, e.end));

        let extra: usize = self.edits.iter().map(|e| e.text.len()).sum();
        let mut out = String::with_capacity(source.len() + extra);
        let mut cursor = 0usize;

        for edit in self.edits {
            let (start, end) = (edit.start as usize, edit.end as usize);
            if start < cursor || end > source.len() {
                trace!(start, end, "dropping overlapping edit");
                continue;
            }
            out.push_str(&source[cursor..start]);
            out.push_str(&edit.text);
            cursor = end;
        }

        out.push_str(&source[cursor..]);
        out
    }
}

/// Whether text inserted at `pos` must start with a space to avoid gluing
/// onto a preceding keyword or identifier (`return"a"` → `return _0x(…)`).
pub fn needs_separator(source: &str, pos: u32) -> bool {
    source[..pos as usize]
        .chars()
        .next_back()
        .is_some_and(is_identifier_char)
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

// ---------------------------------------------------------------------------
// Output normalization
// ---------------------------------------------------------------------------

/// Strip Rolldown's `//#region` markers (they carry absolute paths) and
/// normalize line endings to `\n`.
pub fn strip_region_comments(code: &str) -> String {
    code.lines()
        .filter(|line| {
            let line = line.trim_start();
            !line.starts_with("//#region") && !line.starts_with("//#endregion")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn applies_replacements_in_offset_order() {
        let mut edits = SourceEdits::new();
        edits.replace(8, 9, "2");
        edits.replace(4, 5, "y");
        assert_eq!(edits.apply("let x = 1;"), "let y = 2;");
    }

    #[test]
    fn insertion_precedes_replacement_at_same_offset() {
        let mut edits = SourceEdits::new();
        edits.replace(1, 2, "_0xab");
        edits.insert(1, "a:");
        assert_eq!(edits.apply("{a}"), "{a:_0xab}");
    }

    #[test]
    fn overlapping_edits_are_dropped() {
        let mut edits = SourceEdits::new();
        edits.replace(0, 5, "A");
        edits.replace(2, 3, "B");
        assert_eq!(edits.apply("abcdef"), "Af");
    }

    #[test]
    fn separator_detection() {
        assert!(needs_separator("return\"a\"", 6));
        assert!(!needs_separator("x=\"a\"", 2));
        assert!(!needs_separator("\"a\"", 0));
    }

    #[test]
    fn region_comments_are_stripped() {
        let code = "//#region /abs/path/src/worker.js\nconst a = 1;\n//#endregion\r\nexport { a };";
        assert_eq!(strip_region_comments(code), "const a = 1;\nexport { a };");
    }
}
