//! XML locator for MSBuild project and property files, built on `roxmltree`.
//!
//! Element text is reported with the span of its trimmed content, so the
//! whitespace and formatting around a value never become part of an edit.
//! Attribute values are reported for inspection only and are never patchable.

use roxmltree::{Document, Node, ParsingOptions};

use super::{Frame, Locator, Segment, Site};
use crate::error::DocumentError;
use crate::patch::Span;

pub struct XmlDocument<'s> {
    source: &'s str,
    doc: Document<'s>,
}

impl<'s> XmlDocument<'s> {
    pub fn parse(source: &'s str) -> Result<Self, DocumentError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(source, options).map_err(|e| {
            let pos = e.pos();
            DocumentError::Syntax {
                format: "xml",
                line: pos.row,
                col: pos.col,
                message: e.to_string(),
            }
        })?;
        Ok(XmlDocument { source, doc })
    }
}

impl std::fmt::Debug for XmlDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlDocument")
            .field("root", &self.doc.root_element().tag_name().name())
            .finish()
    }
}

impl Locator for XmlDocument<'_> {
    fn format(&self) -> &'static str {
        "xml"
    }

    fn source(&self) -> &str {
        self.source
    }

    fn visit(&self, visitor: &mut dyn FnMut(&Site<'_>)) {
        let mut frames = Vec::new();
        walk(self.source, self.doc.root_element(), &mut frames, visitor);
    }
}

fn walk(
    source: &str,
    element: Node<'_, '_>,
    frames: &mut Vec<Frame>,
    visitor: &mut dyn FnMut(&Site<'_>),
) {
    let fields: Vec<(String, String)> = element
        .attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();
    frames.push(Frame {
        segment: Segment::Element(element.tag_name().name().to_string()),
        fields,
    });

    let start = element.range().start;
    for attribute in element.attributes() {
        frames.push(Frame::new(Segment::Key(attribute.name().to_string())));
        visitor(&Site {
            path: frames.as_slice(),
            value: attribute.value(),
            span: Span::new(start, start),
            block: false,
            patchable: false,
        });
        frames.pop();
    }

    for child in element.children() {
        if child.is_element() {
            walk(source, child, frames, visitor);
            continue;
        }
        if !child.is_text() {
            continue;
        }
        let Some(text) = child.text() else { continue };
        let value = text.trim();
        if value.is_empty() {
            continue;
        }
        let range = child.range();
        let raw = source.get(range.clone()).unwrap_or_default();
        let patchable = raw == text;
        let span = if patchable {
            let lead = raw.len() - raw.trim_start().len();
            Span::new(range.start + lead, range.start + lead + value.len())
        } else {
            Span::new(range.start, range.start)
        };
        visitor(&Site {
            path: frames.as_slice(),
            value,
            span,
            block: value.contains('\n'),
            patchable,
        });
    }

    frames.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::Selection;
    use crate::version::TokenKind;

    const PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk">

  <PropertyGroup>
    <TargetFramework>
      net6.0
    </TargetFramework>
    <RuntimeIdentifiers>win10-x64;osx.12-arm64</RuntimeIdentifiers>
  </PropertyGroup>

  <ItemGroup>
    <PackageReference Include="Microsoft.Extensions.Hosting" Version="6.0.1" />
  </ItemGroup>
</Project>
"#;

    fn element_predicate(name: &'static str, kind: TokenKind) -> impl Fn(&Site<'_>) -> Option<Selection> {
        move |site: &Site<'_>| {
            site.leaf()
                .is_some_and(|s| s.is_element(name))
                .then(|| Selection::whole(kind, 1))
        }
    }

    #[test]
    fn element_text_span_is_trimmed() {
        let doc = XmlDocument::parse(PROJECT).unwrap();
        let found = doc.find_candidates(&element_predicate("TargetFramework", TokenKind::FrameworkMoniker));
        assert_eq!(found.len(), 1);
        let span = found[0].span;
        assert_eq!(&PROJECT[span.start..span.end], "net6.0");
        assert_eq!(found[0].line, 5);
    }

    #[test]
    fn rid_list_candidate() {
        let doc = XmlDocument::parse(PROJECT).unwrap();
        let found =
            doc.find_candidates(&element_predicate("RuntimeIdentifiers", TokenKind::RuntimeIdentifier));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].token.raw(), "win10-x64;osx.12-arm64");
    }

    #[test]
    fn attributes_are_visible_but_not_patchable() {
        let doc = XmlDocument::parse(PROJECT).unwrap();
        let mut versions = Vec::new();
        doc.visit(&mut |site| {
            if site.leaf() == Some(&Segment::Key("Version".into())) {
                let include = site.ancestor(1).and_then(|f| f.field("Include")).map(str::to_string);
                versions.push((include, site.value.to_string(), site.patchable));
            }
        });
        assert_eq!(
            versions,
            vec![(
                Some("Microsoft.Extensions.Hosting".to_string()),
                "6.0.1".to_string(),
                false
            )]
        );
    }

    #[test]
    fn entity_text_is_not_patchable() {
        let source = "<Project><A>net6.0&#59;net7.0</A></Project>";
        let doc = XmlDocument::parse(source).unwrap();
        let found = doc.find_candidates(&element_predicate("A", TokenKind::FrameworkMoniker));
        assert!(found.is_empty());
    }

    #[test]
    fn malformed_xml_is_a_syntax_error() {
        let err = XmlDocument::parse("<Project><A></Project>").unwrap_err();
        assert!(matches!(err, DocumentError::Syntax { format: "xml", .. }));
    }
}
