//! Unified diff generation for patch previews.
//!
//! Each hunk shows the whole source lines an edit touches, so a preview of
//! `6.0.x` -> `8.0.x` shows the YAML line it lives on rather than the bare
//! token. Edits on the same line share one hunk. No context lines
//! are emitted.

use crate::patch::{EditSpan, PatchSet};
use crate::text::{line_end, line_start};

/// Generate a unified diff of `patch` applied to `original`.
pub fn generate_unified_diff(path: &str, original: &str, patch: &PatchSet) -> String {
    if !patch.has_edits() {
        return String::new();
    }

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", path));
    diff.push_str(&format!("+++ b/{}\n", path));

    let mut line_delta: i64 = 0;
    for hunk in group_hunks(original, patch.edits()) {
        let old_text = &original[hunk.start..hunk.end];
        let mut new_text = String::with_capacity(old_text.len());
        let mut cursor = hunk.start;
        for edit in hunk.edits {
            new_text.push_str(&original[cursor..edit.span.start]);
            new_text.push_str(&edit.text);
            cursor = edit.span.end;
        }
        new_text.push_str(&original[cursor..hunk.end]);

        let old_lines: Vec<&str> = old_text.split('\n').map(trim_cr).collect();
        let new_lines: Vec<&str> = new_text.split('\n').map(trim_cr).collect();
        let old_first = line_number(original, hunk.start);
        let new_first = (old_first as i64 + line_delta) as usize;

        diff.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_first,
            old_lines.len(),
            new_first,
            new_lines.len()
        ));
        for line in &old_lines {
            diff.push_str(&format!("-{}\n", line));
        }
        for line in &new_lines {
            diff.push_str(&format!("+{}\n", line));
        }
        line_delta += new_lines.len() as i64 - old_lines.len() as i64;
    }
    diff
}

struct Hunk<'a> {
    start: usize,
    end: usize,
    edits: Vec<&'a EditSpan>,
}

fn group_hunks<'a>(original: &str, edits: &'a [EditSpan]) -> Vec<Hunk<'a>> {
    let mut hunks: Vec<Hunk<'a>> = Vec::new();
    for edit in edits {
        let start = line_start(original, edit.span.start);
        let end = line_end(original, edit.span.end);
        match hunks.last_mut() {
            Some(last) if start <= last.end => {
                last.end = last.end.max(end);
                last.edits.push(edit);
            }
            _ => hunks.push(Hunk {
                start,
                end,
                edits: vec![edit],
            }),
        }
    }
    hunks
}

fn trim_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn line_number(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}
