//! Floating channel expressions as used for SDK pinning in CI pipelines.
//!
//! An expression has one to three dot-separated segments. The last segment
//! may be a wildcard (`x`, `X` or `*`) or, in third position, a feature band
//! shorthand such as `1xx`. A value can also be a multi-line list with one
//! expression per line; each line may carry a trailing `# comment`.

use std::collections::BTreeSet;
use std::ops::Range;

use super::channel::UpgradeChannel;
use super::{FormatOptions, NumericVersion, PreLabel, TokenKind};
use crate::error::ParseFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Number(u64),
    Wildcard(char),
    /// `Nxx`: the band digit and the literal suffix as written.
    Band(u64, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingExpr {
    segments: Vec<Segment>,
    prerelease: Vec<PreLabel>,
}

impl FloatingExpr {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let fail = |reason: &str| ParseFailure::new(text, TokenKind::FloatingChannel, reason);

        let (core, pre) = match text.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (text, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(fail("expected one to three segments"));
        }

        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let last = i + 1 == parts.len();
            let segment = if let Some(n) = number(part) {
                Segment::Number(n)
            } else if last && i > 0 && matches!(*part, "x" | "X" | "*") {
                Segment::Wildcard(part.chars().next().unwrap_or('x'))
            } else if last && i == 2 {
                band(part).ok_or_else(|| fail("malformed feature band"))?
            } else {
                return Err(fail(&format!("segment '{}' is not a number", part)));
            };
            segments.push(segment);
        }

        let prerelease = match pre {
            None => Vec::new(),
            Some(pre) => {
                let full = segments.len() == 3 && segments.iter().all(|s| matches!(s, Segment::Number(_)));
                if !full {
                    return Err(fail("prerelease labels need a full major.minor.patch"));
                }
                pre.split('.')
                    .map(PreLabel::parse)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| fail("malformed prerelease label"))?
            }
        };

        Ok(FloatingExpr {
            segments,
            prerelease,
        })
    }

    /// Number of segments written.
    pub fn precision(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_floating(&self) -> bool {
        matches!(
            self.segments.last(),
            Some(Segment::Wildcard(_)) | Some(Segment::Band(..))
        )
    }

    pub fn major(&self) -> u64 {
        match self.segments.first() {
            Some(Segment::Number(n)) => *n,
            _ => 0,
        }
    }

    fn minor(&self) -> Option<u64> {
        match self.segments.get(1) {
            Some(Segment::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn to_numeric(&self) -> NumericVersion {
        let patch = match self.segments.get(2) {
            Some(Segment::Number(n)) => Some(*n),
            Some(Segment::Band(n, _)) => Some(n * 100),
            _ => None,
        };
        NumericVersion {
            major: self.major(),
            minor: self.minor(),
            patch,
            prerelease: self.prerelease.clone(),
        }
    }

    /// Channel-level comparison at the precision written: `8.x` and `8`
    /// only compare majors.
    pub fn is_at_least(&self, channel: &UpgradeChannel) -> bool {
        match self.minor() {
            Some(minor) => (self.major(), minor) >= (channel.major(), channel.minor()),
            None => self.major() >= channel.major(),
        }
    }

    /// The same shape written for `channel`.
    pub fn format_for(&self, channel: &UpgradeChannel) -> String {
        let major = channel.major();
        let minor = channel.minor();
        match self.segments.as_slice() {
            [Segment::Number(_)] => major.to_string(),
            [_, Segment::Wildcard(c)] => format!("{}.{}", major, c),
            [_, _] => format!("{}.{}", major, minor),
            [_, _, Segment::Wildcard(c)] => format!("{}.{}.{}", major, minor, c),
            [_, _, Segment::Band(_, suffix)] => {
                format!("{}.{}.{}{}", major, minor, channel.feature_band() / 100, suffix)
            }
            _ => channel.sdk_version().to_string(),
        }
    }
}

fn number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn band(text: &str) -> Option<Segment> {
    let digits = text.len().checked_sub(2)?;
    let (n, suffix) = text.split_at(digits);
    if !matches!(suffix, "xx" | "XX") {
        return None;
    }
    number(n).map(|n| Segment::Band(n, suffix.to_string()))
}

// ============================================================================
// Lists
// ============================================================================

/// One line of a floating value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingEntry {
    pub expr: FloatingExpr,
    /// Trailing comment including the whitespace before `#`.
    pub comment: Option<String>,
    /// Byte range of the expression within the whole value.
    range: Range<usize>,
    /// Leading whitespace of the line.
    indent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingList {
    raw: String,
    entries: Vec<FloatingEntry>,
}

impl FloatingList {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let mut entries = Vec::new();
        let mut offset = 0usize;
        for line in text.split('\n') {
            let line_start = offset;
            offset += line.len() + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);

            let (body, comment) = match line.find('#') {
                Some(i) => {
                    let body = &line[..i];
                    let kept = body.trim_end();
                    (kept, Some(line[kept.len()..].to_string()))
                }
                None => (line.trim_end(), None),
            };
            let expr_text = body.trim_start();
            if expr_text.is_empty() {
                continue;
            }
            let indent = body[..body.len() - expr_text.len()].to_string();
            let start = line_start + indent.len();
            entries.push(FloatingEntry {
                expr: FloatingExpr::parse(expr_text)?,
                comment,
                range: start..start + expr_text.len(),
                indent,
            });
        }
        if entries.is_empty() {
            return Err(ParseFailure::new(
                text,
                TokenKind::FloatingChannel,
                "no version expression found",
            ));
        }
        Ok(FloatingList {
            raw: text.to_string(),
            entries,
        })
    }

    pub fn entries(&self) -> &[FloatingEntry] {
        &self.entries
    }

    pub fn is_multi_line(&self) -> bool {
        self.entries.len() > 1
    }

    /// Majors already listed.
    pub fn majors(&self) -> BTreeSet<u64> {
        self.entries.iter().map(|e| e.expr.major()).collect()
    }

    pub fn highest(&self) -> Option<&FloatingEntry> {
        let mut best: Option<&FloatingEntry> = None;
        for entry in &self.entries {
            if !best.is_some_and(|b| entry.expr.to_numeric() <= b.expr.to_numeric()) {
                best = Some(entry);
            }
        }
        best
    }

    pub fn is_at_least(&self, channel: &UpgradeChannel) -> bool {
        self.entries.iter().any(|e| e.expr.is_at_least(channel))
    }

    /// A single expression is rewritten in place; a multi-line list gains a
    /// line in the style of its highest entry, indented like its last line.
    pub fn format_upgraded(&self, channel: &UpgradeChannel, options: &FormatOptions) -> String {
        if self.is_at_least(channel) {
            return self.raw.clone();
        }
        if !self.is_multi_line() {
            let entry = &self.entries[0];
            let mut out = String::with_capacity(self.raw.len());
            out.push_str(&self.raw[..entry.range.start]);
            out.push_str(&entry.expr.format_for(channel));
            out.push_str(&self.raw[entry.range.end..]);
            return out;
        }

        let template = match self.highest() {
            Some(entry) => entry,
            None => return self.raw.clone(),
        };
        let indent = self
            .entries
            .last()
            .map(|e| e.indent.as_str())
            .unwrap_or_default();
        let body = self.raw.trim_end();
        let tail = &self.raw[body.len()..];
        format!(
            "{}{}{}{}{}",
            body,
            options.newline,
            indent,
            template.expr.format_for(channel),
            tail
        )
    }
}
