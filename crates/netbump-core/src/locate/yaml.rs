//! YAML locator built on the `yaml-rust2` event parser.
//!
//! The event stream is folded into a small owned tree whose scalars remember
//! where their content sits in the source. Scalar markers count characters;
//! they are converted to byte offsets before any span is built.

use tracing::trace;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::{Frame, Locator, Segment, Site};
use crate::error::DocumentError;
use crate::patch::Span;
use crate::text::{line_start, lines_with_offsets, CharOffsets};

#[derive(Debug, Clone)]
struct ScalarNode {
    value: String,
    span: Span,
    block: bool,
    patchable: bool,
}

#[derive(Debug, Clone)]
enum YamlNode {
    Scalar(ScalarNode),
    Sequence(Vec<YamlNode>),
    Mapping(Vec<(Option<String>, YamlNode)>),
    Alias,
}

impl YamlNode {
    fn as_scalar(&self) -> Option<&str> {
        match self {
            YamlNode::Scalar(s) => Some(&s.value),
            _ => None,
        }
    }
}

/// A parsed YAML stream (one or more documents).
#[derive(Debug)]
pub struct YamlDocument<'s> {
    source: &'s str,
    documents: Vec<YamlNode>,
}

impl<'s> YamlDocument<'s> {
    pub fn parse(source: &'s str) -> Result<Self, DocumentError> {
        let mut builder = TreeBuilder {
            source,
            offsets: CharOffsets::new(source),
            stack: Vec::new(),
            documents: Vec::new(),
        };
        let mut parser = Parser::new(source.chars());
        parser
            .load(&mut builder, true)
            .map_err(|e| DocumentError::Syntax {
                format: "yaml",
                line: e.marker().line() as u32,
                col: e.marker().col() as u32 + 1,
                message: e.info().to_string(),
            })?;
        Ok(YamlDocument {
            source,
            documents: builder.documents,
        })
    }

    /// Number of documents in the stream.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Locator for YamlDocument<'_> {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn source(&self) -> &str {
        self.source
    }

    fn visit(&self, visitor: &mut dyn FnMut(&Site<'_>)) {
        let mut frames = Vec::new();
        for document in &self.documents {
            walk(document, &mut frames, visitor);
        }
    }
}

fn walk(node: &YamlNode, frames: &mut Vec<Frame>, visitor: &mut dyn FnMut(&Site<'_>)) {
    match node {
        YamlNode::Scalar(scalar) => visitor(&Site {
            path: frames.as_slice(),
            value: &scalar.value,
            span: scalar.span,
            block: scalar.block,
            patchable: scalar.patchable,
        }),
        YamlNode::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                frames.push(Frame::new(Segment::Index(i)));
                walk(item, frames, visitor);
                frames.pop();
            }
        }
        YamlNode::Mapping(entries) => {
            let fields: Vec<(String, String)> = entries
                .iter()
                .filter_map(|(k, v)| Some((k.clone()?, v.as_scalar()?.to_string())))
                .collect();
            for (key, value) in entries {
                let Some(key) = key else { continue };
                frames.push(Frame {
                    segment: Segment::Key(key.clone()),
                    fields: fields.clone(),
                });
                walk(value, frames, visitor);
                frames.pop();
            }
        }
        YamlNode::Alias => {}
    }
}

// ============================================================================
// Event Receiver
// ============================================================================

enum Building {
    Sequence(Vec<YamlNode>),
    Mapping {
        entries: Vec<(Option<String>, YamlNode)>,
        /// `Some` once the key of the current entry has been seen.
        key: Option<Option<String>>,
    },
}

struct TreeBuilder<'s> {
    source: &'s str,
    offsets: CharOffsets,
    stack: Vec<Building>,
    documents: Vec<YamlNode>,
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        match event {
            Event::Scalar(value, style, ..) => {
                let node = self.scalar(value, style, mark);
                self.push(node);
            }
            Event::SequenceStart(..) => self.stack.push(Building::Sequence(Vec::new())),
            Event::MappingStart(..) => self.stack.push(Building::Mapping {
                entries: Vec::new(),
                key: None,
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                let node = match self.stack.pop() {
                    Some(Building::Sequence(items)) => YamlNode::Sequence(items),
                    Some(Building::Mapping { entries, .. }) => YamlNode::Mapping(entries),
                    None => return,
                };
                self.push(node);
            }
            Event::Alias(..) => self.push(YamlNode::Alias),
            _ => {}
        }
    }
}

impl TreeBuilder<'_> {
    fn push(&mut self, node: YamlNode) {
        match self.stack.last_mut() {
            None => self.documents.push(node),
            Some(Building::Sequence(items)) => items.push(node),
            Some(Building::Mapping { entries, key }) => match key.take() {
                None => *key = Some(node.as_scalar().map(str::to_string)),
                Some(k) => entries.push((k, node)),
            },
        }
    }

    fn scalar(&self, value: String, style: TScalarStyle, mark: Marker) -> YamlNode {
        let start = self.offsets.byte_offset(mark.index());
        let source = self.source;
        let (span, block, patchable) = match style {
            TScalarStyle::Plain => {
                let end = start + value.len();
                let exact = source.get(start..end) == Some(value.as_str());
                (Span::new(start, if exact { end } else { start }), false, exact)
            }
            TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted => {
                let content = (start + 1).min(source.len());
                let end = content + value.len();
                let quote = if matches!(style, TScalarStyle::SingleQuoted) { '\'' } else { '"' };
                let exact = source.get(content..end) == Some(value.as_str())
                    && source.get(end..).is_some_and(|rest| rest.starts_with(quote));
                (Span::new(content, if exact { end } else { content }), false, exact)
            }
            _ => block_scalar(source, start, &value, matches!(style, TScalarStyle::Literal)),
        };
        trace!(%span, patchable, "yaml scalar");
        YamlNode::Scalar(ScalarNode {
            value,
            span,
            block,
            patchable,
        })
    }
}

/// Locate the content of a `|` or `>` scalar.
///
/// The parser marks a block scalar at its first content character, so the
/// marker line fixes the block indentation and the header line is the last
/// non-blank line above it. The span runs from the first content character
/// to the end of the last non-blank content line. Literal content is
/// patchable when the dedented source lines reproduce the value; folded
/// content only when it is a single line.
fn block_scalar(source: &str, marker: usize, value: &str, literal: bool) -> (Span, bool, bool) {
    let empty = (Span::new(marker, marker), false, false);
    let body_start = line_start(source, marker);
    let prefix = &source[body_start..marker];
    if value.is_empty() || body_start == 0 || !prefix.bytes().all(|b| b == b' ') {
        return empty;
    }
    let block_indent = prefix.len();
    let parent_indent = source[..body_start - 1]
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map_or(0, |line| line.len() - line.trim_start_matches(' ').len());
    if block_indent <= parent_indent {
        return empty;
    }

    let mut last_end = marker;
    let mut lines: Vec<&str> = Vec::new();
    for (offset, line) in lines_with_offsets(&source[body_start..]) {
        let content = line.trim_start_matches(' ');
        if content.trim().is_empty() {
            lines.push("");
            continue;
        }
        if line.len() - content.len() < block_indent {
            break;
        }
        lines.push(&line[block_indent..]);
        last_end = body_start + offset + line.trim_end().len();
    }

    while lines.last() == Some(&"") {
        lines.pop();
    }
    let multi = lines.len() > 1;
    let patchable = if literal {
        lines.join("\n") == value.trim_end_matches('\n')
    } else {
        !multi && lines.first().copied() == Some(value.trim_end_matches('\n'))
    };
    (Span::new(marker, last_end), multi, patchable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::Selection;
    use crate::version::TokenKind;

    fn sites(source: &str) -> Vec<(Vec<Segment>, String, Span, bool, bool)> {
        let doc = YamlDocument::parse(source).unwrap();
        let mut out = Vec::new();
        doc.visit(&mut |site| {
            out.push((
                site.path.iter().map(|f| f.segment.clone()).collect(),
                site.value.to_string(),
                site.span,
                site.block,
                site.patchable,
            ))
        });
        out
    }

    fn span_text<'a>(source: &'a str, span: Span) -> &'a str {
        &source[span.start..span.end]
    }

    mod scalar_spans {
        use super::*;

        #[test]
        fn plain_and_quoted_spans() {
            let source = "a: 6.0.x\nb: '7.0.x'\nc: \"8.0.x\"\n";
            let found = sites(source);
            assert_eq!(found.len(), 3);
            for (_, value, span, _, patchable) in &found {
                assert!(patchable);
                assert_eq!(span_text(source, *span), value);
            }
        }

        #[test]
        fn escaped_values_are_not_patchable() {
            let source = "a: \"6.0\\u002ex\"\nb: 'it''s'\n";
            let found = sites(source);
            assert!(found.iter().all(|(_, _, _, _, patchable)| !patchable));
        }

        #[test]
        fn multibyte_prefix_converts_to_bytes() {
            let source = "name: \"Ünïcødé\"\nversion: 6.0.x\n";
            let found = sites(source);
            let (_, value, span, _, _) = &found[1];
            assert_eq!(value, "6.0.x");
            assert_eq!(span_text(source, *span), "6.0.x");
        }

        #[test]
        fn crlf_spans_exclude_terminators() {
            let source = "a: 6.0.x\r\nb: 7.0.x\r\n";
            let found = sites(source);
            assert_eq!(span_text(source, found[1].2), "7.0.x");
        }
    }

    mod block_scalars {
        use super::*;

        #[test]
        fn literal_list_span_covers_all_lines() {
            let source = "with:\n  dotnet-version: |\n    6.0.x\n    7.0.x\n  other: 1\n";
            let found = sites(source);
            let (path, _, span, block, patchable) = &found[0];
            assert_eq!(path.last(), Some(&Segment::Key("dotnet-version".into())));
            assert!(*block && *patchable);
            assert_eq!(span_text(source, *span), "6.0.x\n    7.0.x");
        }

        #[test]
        fn literal_with_trailing_blank_lines() {
            let source = "v: |\n  6.0.x\n\n\nnext: 1\n";
            let found = sites(source);
            let (_, _, span, block, patchable) = &found[0];
            assert!(!block && *patchable);
            assert_eq!(span_text(source, *span), "6.0.x");
        }

        #[test]
        fn sequence_item_list_with_crlf() {
            let source = "versions:\r\n  - |\r\n    6.0.x\r\n    7.0.x\r\n  - 9.0.x\r\n";
            let found = sites(source);
            let (path, value, span, block, patchable) = &found[0];
            assert_eq!(path.last(), Some(&Segment::Index(0)));
            assert_eq!(value, "6.0.x\n7.0.x\n");
            assert!(*block && *patchable);
            assert_eq!(span_text(source, *span), "6.0.x\r\n    7.0.x");
            assert_eq!(span_text(source, found[1].2), "9.0.x");
        }

        #[test]
        fn header_comment_is_outside_the_span() {
            let source = "v: |  # sdk list\n  6.0.x\n  7.0.x\n";
            let found = sites(source);
            assert!(found[0].4);
            assert_eq!(span_text(source, found[0].2), "6.0.x\n  7.0.x");
        }

        #[test]
        fn folded_multi_line_is_not_patchable() {
            let source = "v: >\n  6.0.x\n  7.0.x\n";
            let found = sites(source);
            assert!(!found[0].4);
        }
    }

    mod walking {
        use super::*;

        #[test]
        fn fields_expose_mapping_siblings() {
            let source = "steps:\n  - uses: actions/setup-dotnet@v4\n    with:\n      dotnet-version: 6.0.x\n";
            let doc = YamlDocument::parse(source).unwrap();
            let mut uses = None;
            doc.visit(&mut |site| {
                if site.ends_with_keys(&["with", "dotnet-version"]) {
                    uses = site
                        .ancestor(1)
                        .and_then(|f| f.field("uses"))
                        .map(str::to_string);
                }
            });
            assert_eq!(uses.as_deref(), Some("actions/setup-dotnet@v4"));
        }

        #[test]
        fn find_candidates_parses_selected_sites() {
            let source = "jobs:\n  build:\n    version: 6.0.x\n    name: build\n";
            let doc = YamlDocument::parse(source).unwrap();
            let predicate = |site: &Site<'_>| {
                site.ends_with_keys(&["version"])
                    .then(|| Selection::whole(TokenKind::FloatingChannel, 1))
            };
            let candidates = doc.find_candidates(&predicate);
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].token.raw(), "6.0.x");
            assert_eq!(candidates[0].line, 3);
        }

        #[test]
        fn irrelevant_document_yields_nothing() {
            let doc = YamlDocument::parse("name: ci\non: push\n").unwrap();
            let predicate = |site: &Site<'_>| {
                site.ends_with_keys(&["dotnet-version"])
                    .then(|| Selection::whole(TokenKind::FloatingChannel, 1))
            };
            assert!(doc.find_candidates(&predicate).is_empty());
        }

        #[test]
        fn multiple_documents_are_walked() {
            let doc = YamlDocument::parse("a: 1\n---\nb: 2\n").unwrap();
            assert_eq!(doc.len(), 2);
        }

        #[test]
        fn syntax_error_reports_position() {
            let err = YamlDocument::parse("a: [1, 2\nb: 3\n").unwrap_err();
            assert!(matches!(err, DocumentError::Syntax { format: "yaml", .. }));
        }
    }
}
