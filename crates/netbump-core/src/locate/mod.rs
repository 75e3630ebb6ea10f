//! Candidate token location across document formats.
//!
//! Every format exposes the same capability: walk the parsed document and
//! report each scalar it contains as a [`Site`], together with the path of
//! keys or elements that leads to it. A [`SitePredicate`] decides which sites
//! carry a version token and in what grammar; [`Locator::find_candidates`]
//! turns the selected sites into parsed tokens with exact source spans.
//!
//! Walking never mutates the parsed document, so one document can be queried
//! with several predicates.

use std::ops::Range;

use tracing::debug;

use crate::patch::Span;
use crate::text::offset_to_position;
use crate::version::{parse, TokenKind, VersionToken};

pub mod dockerfile;
pub mod json;
pub mod xml;
pub mod yaml;

pub use dockerfile::DockerfileDocument;
pub use json::JsonDocument;
pub use xml::XmlDocument;
pub use yaml::YamlDocument;

// ============================================================================
// Sites
// ============================================================================

/// One step of the path from the document root to a scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Mapping or object key.
    Key(String),
    /// Sequence or array position.
    Index(usize),
    /// XML element name, or a line instruction such as `FROM`.
    Element(String),
}

impl Segment {
    pub fn is_key(&self, name: &str) -> bool {
        matches!(self, Segment::Key(k) if k == name)
    }

    pub fn is_element(&self, name: &str) -> bool {
        matches!(self, Segment::Element(e) if e == name)
    }
}

/// A path segment plus the scalar siblings visible at that level.
///
/// For a mapping key the fields are the other scalar entries of the same
/// mapping; for an XML element they are its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub segment: Segment,
    pub fields: Vec<(String, String)>,
}

impl Frame {
    pub fn new(segment: Segment) -> Self {
        Frame {
            segment,
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A scalar value found while walking a document.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub path: &'a [Frame],
    /// The decoded value.
    pub value: &'a str,
    /// Source span of the value content (quotes and indicators excluded).
    pub span: Span,
    /// The value spans several source lines.
    pub block: bool,
    /// The source text under `span` is exactly the token text, so the span
    /// can be patched. Escaped or folded values are not patchable.
    pub patchable: bool,
}

impl Site<'_> {
    /// The innermost path segment.
    pub fn leaf(&self) -> Option<&Segment> {
        self.path.last().map(|f| &f.segment)
    }

    /// The frame `depth` levels above the leaf (`0` is the leaf itself).
    pub fn ancestor(&self, depth: usize) -> Option<&Frame> {
        self.path.len().checked_sub(depth + 1).map(|i| &self.path[i])
    }

    /// Whether the path ends with the given keys, in order.
    pub fn ends_with_keys(&self, keys: &[&str]) -> bool {
        if keys.len() > self.path.len() {
            return false;
        }
        let tail = &self.path[self.path.len() - keys.len()..];
        tail.iter()
            .zip(keys)
            .all(|(frame, key)| frame.segment.is_key(key))
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// What a predicate selected at a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub kind: TokenKind,
    /// Higher values win when two selections overlap.
    pub specificity: u8,
    /// Sub-range of the value holding the token; the whole value if `None`.
    pub range: Option<Range<usize>>,
}

impl Selection {
    pub fn whole(kind: TokenKind, specificity: u8) -> Self {
        Selection {
            kind,
            specificity,
            range: None,
        }
    }

    pub fn part(kind: TokenKind, specificity: u8, range: Range<usize>) -> Self {
        Selection {
            kind,
            specificity,
            range: Some(range),
        }
    }
}

/// Decides where in a document a version token is meaningful.
pub trait SitePredicate {
    fn select(&self, site: &Site<'_>) -> Option<Selection>;
}

impl<F> SitePredicate for F
where
    F: Fn(&Site<'_>) -> Option<Selection>,
{
    fn select(&self, site: &Site<'_>) -> Option<Selection> {
        self(site)
    }
}

/// Several predicates queried together; the most specific selection wins.
///
/// # Panics
/// Two predicates selecting the same site with equal specificity is a
/// programming error and panics.
pub struct AnyOf<'p>(pub Vec<&'p dyn SitePredicate>);

impl SitePredicate for AnyOf<'_> {
    fn select(&self, site: &Site<'_>) -> Option<Selection> {
        let mut best: Option<Selection> = None;
        for predicate in &self.0 {
            let Some(selection) = predicate.select(site) else {
                continue;
            };
            match &best {
                Some(current) => {
                    assert_ne!(
                        current.specificity, selection.specificity,
                        "two predicates selected the value at {} with equal specificity",
                        site.span
                    );
                    if selection.specificity > current.specificity {
                        best = Some(selection);
                    }
                }
                None => best = Some(selection),
            }
        }
        best
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// A parsed token and where it sits in the source.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub token: VersionToken,
    pub span: Span,
    /// 1-indexed line of the span start.
    pub line: u32,
    pub specificity: u8,
    pub block: bool,
}

/// A parsed document that can report its scalar sites.
pub trait Locator {
    /// Short format name for logs and diagnostics.
    fn format(&self) -> &'static str;

    /// The decoded text the document was parsed from.
    fn source(&self) -> &str;

    /// Call `visitor` for every scalar site, in document order.
    fn visit(&self, visitor: &mut dyn FnMut(&Site<'_>));

    /// Collect the tokens `predicate` selects, sorted by span and with
    /// overlaps resolved.
    ///
    /// Sites whose text does not parse as the selected kind are skipped. A
    /// document with no matching sites yields an empty list.
    fn find_candidates(&self, predicate: &dyn SitePredicate) -> Vec<Candidate> {
        let source = self.source();
        let mut found = Vec::new();
        self.visit(&mut |site| {
            let Some(selection) = predicate.select(site) else {
                return;
            };
            if !site.patchable {
                debug!(span = %site.span, "skipping escaped or folded value");
                return;
            }
            let span = match &selection.range {
                Some(range) => site.span.narrow(range.start, range.end),
                None => site.span,
            };
            let Some(text) = source.get(span.start..span.end) else {
                return;
            };
            match parse(text, selection.kind) {
                Ok(token) => found.push(Candidate {
                    token,
                    span,
                    line: offset_to_position(source, span.start).0,
                    specificity: selection.specificity,
                    block: site.block,
                }),
                Err(failure) => debug!(%failure, "not a version token"),
            }
        });
        resolve_overlaps(found)
    }
}

/// Sort candidates and drop the losers of every overlap.
///
/// The more specific candidate wins; at equal specificity the one nested
/// inside the other wins.
///
/// # Panics
/// Panics on overlapping candidates of equal specificity where neither
/// contains the other, or on identical spans of equal specificity.
pub fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by_key(|c| (c.span.start, c.span.end));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(last) = kept.last() else {
            kept.push(candidate);
            continue;
        };
        if !last.span.overlaps(&candidate.span) {
            kept.push(candidate);
            continue;
        }
        let replace = if candidate.specificity != last.specificity {
            candidate.specificity > last.specificity
        } else if last.span == candidate.span {
            panic!(
                "ambiguous candidates at {} with equal specificity",
                candidate.span
            );
        } else if last.span.contains(&candidate.span) {
            true
        } else if candidate.span.contains(&last.span) {
            false
        } else {
            panic!(
                "candidates {} and {} overlap with equal specificity",
                last.span, candidate.span
            );
        };
        if replace {
            kept.pop();
            kept.push(candidate);
        }
    }
    kept
}
