//! JSON locator with comment tolerance.
//!
//! Accepts strict JSON plus `//` and `/* */` comments and trailing commas,
//! as found in `launch.json` and `tasks.json`. Every string remembers the
//! span of its content between the quotes.
//!
//! ## Grammar
//!
//! ```text
//! <value>  := <object> | <array> | <string> | <number> | "true" | "false" | "null"
//! <object> := "{" (<string> ":" <value> ("," <string> ":" <value>)* ","?)? "}"
//! <array>  := "[" (<value> ("," <value>)* ","?)? "]"
//! <trivia> := (whitespace | "//" ... eol | "/*" ... "*/")*
//! ```

use winnow::ascii::{multispace1, till_line_ending};
use winnow::combinator::{alt, delimited, opt, preceded, repeat};
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::{any, take_until, take_while};
use winnow::ModalResult;

use super::{Frame, Locator, Segment, Site};
use crate::error::DocumentError;
use crate::patch::Span;
use crate::text::offset_to_position;

#[derive(Debug, Clone, PartialEq, Eq)]
struct JsonString {
    value: String,
    /// Content between the quotes.
    span: Span,
    /// Contains escape sequences, so the source differs from the value.
    escaped: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum JsonNode {
    Object(Vec<(JsonString, JsonNode)>),
    Array(Vec<JsonNode>),
    String(JsonString),
    Other,
}

/// A parsed JSON (or JSONC) document.
#[derive(Debug)]
pub struct JsonDocument<'s> {
    source: &'s str,
    root: JsonNode,
}

impl<'s> JsonDocument<'s> {
    pub fn parse(source: &'s str) -> Result<Self, DocumentError> {
        let parser = JsonParser { source };
        let mut input = source;
        let root = parser.document(&mut input);

        let syntax = |input: &str, message: &str| {
            let (line, col) = offset_to_position(source, source.len() - input.len());
            DocumentError::Syntax {
                format: "json",
                line,
                col,
                message: message.to_string(),
            }
        };
        match root {
            Ok(root) if input.is_empty() => Ok(JsonDocument { source, root }),
            Ok(_) => Err(syntax(input, "trailing characters after document")),
            Err(_) => Err(syntax(input, "malformed JSON")),
        }
    }
}

impl Locator for JsonDocument<'_> {
    fn format(&self) -> &'static str {
        "json"
    }

    fn source(&self) -> &str {
        self.source
    }

    fn visit(&self, visitor: &mut dyn FnMut(&Site<'_>)) {
        let mut frames = Vec::new();
        walk(&self.root, &mut frames, visitor);
    }
}

fn walk(node: &JsonNode, frames: &mut Vec<Frame>, visitor: &mut dyn FnMut(&Site<'_>)) {
    match node {
        JsonNode::String(s) => visitor(&Site {
            path: frames.as_slice(),
            value: &s.value,
            span: s.span,
            block: false,
            patchable: !s.escaped,
        }),
        JsonNode::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                frames.push(Frame::new(Segment::Index(i)));
                walk(item, frames, visitor);
                frames.pop();
            }
        }
        JsonNode::Object(members) => {
            let fields: Vec<(String, String)> = members
                .iter()
                .filter_map(|(k, v)| match v {
                    JsonNode::String(s) => Some((k.value.clone(), s.value.clone())),
                    _ => None,
                })
                .collect();
            for (key, value) in members {
                frames.push(Frame {
                    segment: Segment::Key(key.value.clone()),
                    fields: fields.clone(),
                });
                walk(value, frames, visitor);
                frames.pop();
            }
        }
        JsonNode::Other => {}
    }
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

/// Holds the full source so spans can be computed from the remaining input.
struct JsonParser<'s> {
    source: &'s str,
}

impl<'s> JsonParser<'s> {
    fn offset(&self, input: &&'s str) -> usize {
        self.source.len() - input.len()
    }

    fn document(&self, input: &mut &'s str) -> ModalResult<JsonNode> {
        let _ = trivia(input)?;
        let value = self.value(input)?;
        let _ = trivia(input)?;
        Ok(value)
    }

    fn value(&self, input: &mut &'s str) -> ModalResult<JsonNode> {
        match input.chars().next() {
            Some('{') => self.object(input),
            Some('[') => self.array(input),
            Some('"') => self.string(input).map(JsonNode::String),
            _ => scalar.map(|_| JsonNode::Other).parse_next(input),
        }
    }

    fn object(&self, input: &mut &'s str) -> ModalResult<JsonNode> {
        '{'.parse_next(input)?;
        let mut members = Vec::new();
        loop {
            let _ = trivia(input)?;
            if opt('}').parse_next(input)?.is_some() {
                return Ok(JsonNode::Object(members));
            }
            let key = self.string(input)?;
            let _ = (trivia, ':', trivia).parse_next(input)?;
            let value = self.value(input)?;
            members.push((key, value));
            let _ = trivia(input)?;
            if opt(',').parse_next(input)?.is_none() {
                let _ = trivia(input)?;
                '}'.parse_next(input)?;
                return Ok(JsonNode::Object(members));
            }
        }
    }

    fn array(&self, input: &mut &'s str) -> ModalResult<JsonNode> {
        '['.parse_next(input)?;
        let mut items = Vec::new();
        loop {
            let _ = trivia(input)?;
            if opt(']').parse_next(input)?.is_some() {
                return Ok(JsonNode::Array(items));
            }
            items.push(self.value(input)?);
            let _ = trivia(input)?;
            if opt(',').parse_next(input)?.is_none() {
                let _ = trivia(input)?;
                ']'.parse_next(input)?;
                return Ok(JsonNode::Array(items));
            }
        }
    }

    fn string(&self, input: &mut &'s str) -> ModalResult<JsonString> {
        '"'.parse_next(input)?;
        let start = self.offset(input);
        let mut value = String::new();
        let mut escaped = false;
        loop {
            let chunk: &str = take_while(0.., |c: char| c != '"' && c != '\\' && c >= ' ')
                .parse_next(input)?;
            value.push_str(chunk);
            match any.parse_next(input)? {
                '"' => break,
                '\\' => {
                    escaped = true;
                    value.push(escape(input)?);
                }
                _ => return Err(ErrMode::from_input(input)),
            }
        }
        let end = self.offset(input) - 1;
        Ok(JsonString {
            value,
            span: Span::new(start, end),
            escaped,
        })
    }
}

fn escape(input: &mut &str) -> ModalResult<char> {
    let c = any.parse_next(input)?;
    let decoded = match c {
        '"' => '"',
        '\\' => '\\',
        '/' => '/',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'u' => {
            let hex: &str = take_while(4, |c: char| c.is_ascii_hexdigit()).parse_next(input)?;
            let code = u32::from_str_radix(hex, 16).map_err(|_| ErrMode::from_input(input))?;
            // surrogate pairs never hold version text; keep a placeholder
            char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
        }
        _ => return Err(ErrMode::from_input(input)),
    };
    Ok(decoded)
}

/// Numbers and literals; only their extent matters.
fn scalar<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    alt((
        "true",
        "false",
        "null",
        take_while(1.., |c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')),
    ))
    .parse_next(input)
}

/// Whitespace and comments.
fn trivia(input: &mut &str) -> ModalResult<()> {
    repeat(
        0..,
        alt((
            multispace1.void(),
            preceded("//", till_line_ending).void(),
            delimited("/*", take_until(0.., "*/"), "*/").void(),
        )),
    )
    .parse_next(input)
}
