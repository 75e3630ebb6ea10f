//! Patch IR: spans, edit spans, and the single-pass splice that applies them.
//!
//! This module implements the format-independent half of a rewrite:
//! - Byte spans into the decoded document text
//! - Edit spans (span + replacement text)
//! - Ordering and overlap invariants for one patch pass
//! - Linear-time apply that copies everything outside the edited spans
//! - Materialization of edits for reports and diffs
//!
//! Encoding, BOM and newline metadata are handled by [`crate::document`]; the
//! applier only ever sees decoded text, so nothing outside an edit can change.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::text::offset_to_position;

/// Hash type for content verification (SHA-256, stored as hex string for JSON compatibility).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 hash of the given bytes, returning hex-encoded string.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Spans
// ============================================================================

/// Byte offsets into decoded document text.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// A sub-span expressed relative to this span's start.
    pub fn narrow(&self, start: usize, end: usize) -> Span {
        assert!(
            self.start + end <= self.end,
            "narrowed range {}..{} exceeds span {}",
            start,
            end,
            self
        );
        Span::new(self.start + start, self.start + end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Edit Spans
// ============================================================================

/// A replacement of the bytes in `span` with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSpan {
    pub span: Span,
    pub text: String,
}

impl EditSpan {
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        EditSpan {
            span,
            text: text.into(),
        }
    }
}

/// The ordered, non-overlapping edits of one patch pass over one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    edits: Vec<EditSpan>,
}

impl PatchSet {
    pub fn new() -> Self {
        PatchSet::default()
    }

    /// Build a patch set from edits in any order.
    ///
    /// # Panics
    /// Panics if two edits overlap once sorted. Callers resolve overlapping
    /// candidates before producing edits.
    pub fn from_unordered(mut edits: Vec<EditSpan>) -> Self {
        edits.sort_by_key(|e| (e.span.start, e.span.end));
        let patch = PatchSet { edits };
        patch.assert_ordered();
        patch
    }

    /// Append an edit that starts at or after the end of the previous one.
    ///
    /// # Panics
    /// Panics if the edit is out of order or overlaps the previous edit.
    pub fn push(&mut self, edit: EditSpan) {
        if let Some(last) = self.edits.last() {
            assert!(
                last.span.end <= edit.span.start,
                "edit {} is out of order after {}",
                edit.span,
                last.span
            );
        }
        self.edits.push(edit);
    }

    /// Check if this patch set contains any edits.
    pub fn has_edits(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Get the number of edits.
    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    pub fn edits(&self) -> &[EditSpan] {
        &self.edits
    }

    fn assert_ordered(&self) {
        for pair in self.edits.windows(2) {
            assert!(
                pair[0].span.end <= pair[1].span.start,
                "overlapping edits {} and {}",
                pair[0].span,
                pair[1].span
            );
        }
    }

    /// Apply the edits to `original` in one forward pass.
    ///
    /// Every byte outside the edited spans is copied verbatim, so a patch set
    /// with no edits returns the input unchanged.
    ///
    /// # Panics
    /// Panics if an edit lies outside `original` or splits a character.
    #[must_use]
    pub fn apply(&self, original: &str) -> String {
        let added: usize = self.edits.iter().map(|e| e.text.len()).sum();
        let mut out = String::with_capacity(original.len() + added);
        let mut cursor = 0usize;

        for edit in &self.edits {
            assert!(
                edit.span.end <= original.len(),
                "edit {} exceeds document length {}",
                edit.span,
                original.len()
            );
            out.push_str(&original[cursor..edit.span.start]);
            out.push_str(&edit.text);
            cursor = edit.span.end;
        }
        out.push_str(&original[cursor..]);
        out
    }

    /// Materialize the edits for reports and diffs.
    pub fn materialize(&self, file: &str, original: &str) -> Vec<OutputEdit> {
        self.edits
            .iter()
            .map(|edit| {
                let (line, col) = offset_to_position(original, edit.span.start);
                OutputEdit {
                    file: file.to_string(),
                    span: edit.span,
                    old_text: original
                        .get(edit.span.start..edit.span.end)
                        .unwrap_or_default()
                        .to_string(),
                    new_text: edit.text.clone(),
                    line,
                    col,
                }
            })
            .collect()
    }
}

// ============================================================================
// Patch Materialization
// ============================================================================

/// A single edit as it appears in output (for JSON serialization).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEdit {
    /// Workspace-relative file path.
    pub file: String,
    /// Byte range being replaced.
    pub span: Span,
    /// Original text.
    pub old_text: String,
    /// Replacement text.
    pub new_text: String,
    /// 1-indexed line number (for display).
    pub line: u32,
    /// 1-indexed column (for display).
    pub col: u32,
}

// ============================================================================
// Tests
// ============================================================================
