//! Text position utilities for byte offset and line:column conversions.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed** into the decoded, BOM-stripped text
//! - Columns count Unicode scalar values, not bytes
//!
//! Some parsers report positions as character indices rather than byte
//! offsets. [`CharOffsets`] converts those so every span in the crate speaks
//! the same unit.

// ============================================================================
// Offset <-> Position
// ============================================================================

/// Convert a byte offset to 1-indexed line and column (Unicode-aware).
///
/// Offsets past the end clamp to the end of the content.
pub fn offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;

    for (i, ch) in content.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

// ============================================================================
// Char Index Conversion
// ============================================================================

/// Maps character indices to byte offsets for one text buffer.
///
/// ASCII text needs no table: character index and byte offset coincide.
#[derive(Debug, Clone)]
pub struct CharOffsets {
    table: Option<Vec<usize>>,
    len: usize,
}

impl CharOffsets {
    pub fn new(content: &str) -> Self {
        let table = if content.is_ascii() {
            None
        } else {
            Some(content.char_indices().map(|(i, _)| i).collect())
        };
        CharOffsets {
            table,
            len: content.len(),
        }
    }

    /// Byte offset of the character at `index`, or the content length when
    /// `index` is past the end.
    pub fn byte_offset(&self, index: usize) -> usize {
        match &self.table {
            None => index.min(self.len),
            Some(table) => table.get(index).copied().unwrap_or(self.len),
        }
    }
}

// ============================================================================
// Line Utilities
// ============================================================================

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Byte offset of the end of the line containing `offset`, excluding the
/// line terminator (`\n` or `\r\n`).
pub fn line_end(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    let end = content[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(content.len());
    if end > offset && content.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    }
}

/// Iterate the lines of `content` with the byte offset each starts at.
///
/// Line terminators are not included in the yielded text; a trailing `\r`
/// from a CRLF terminator is stripped as well.
pub fn lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0usize;
    content.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        (start, line)
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod positions {
        use super::*;

        #[test]
        fn offset_to_position_simple() {
            let content = "line1\nline2\nline3\n";
            assert_eq!(offset_to_position(content, 0), (1, 1));
            assert_eq!(offset_to_position(content, 4), (1, 5));
            assert_eq!(offset_to_position(content, 6), (2, 1));
            assert_eq!(offset_to_position(content, 12), (3, 1));
        }

        #[test]
        fn columns_count_chars() {
            let content = "é: net6.0";
            // 'é' is two bytes but one column
            assert_eq!(offset_to_position(content, 4), (1, 4));
        }

        #[test]
        fn beyond_content_clamps() {
            let content = "short";
            assert_eq!(offset_to_position(content, 100), (1, 6));
        }
    }

    mod char_offsets {
        use super::*;

        #[test]
        fn ascii_is_identity() {
            let offsets = CharOffsets::new("abc");
            assert_eq!(offsets.byte_offset(2), 2);
            assert_eq!(offsets.byte_offset(9), 3);
        }

        #[test]
        fn multibyte_shifts_offsets() {
            let content = "ü: 6.0";
            let offsets = CharOffsets::new(content);
            assert_eq!(offsets.byte_offset(1), 2);
            assert_eq!(&content[offsets.byte_offset(3)..], "6.0");
        }
    }

    mod lines {
        use super::*;

        #[test]
        fn line_bounds() {
            let content = "a: 1\r\n  b: 2\n";
            assert_eq!(line_start(content, 9), 6);
            assert_eq!(line_end(content, 2), 4);
        }

        #[test]
        fn lines_with_offsets_strips_terminators() {
            let content = "one\r\ntwo\nthree";
            let lines: Vec<_> = lines_with_offsets(content).collect();
            assert_eq!(lines, vec![(0, "one"), (5, "two"), (9, "three")]);
        }
    }
}
