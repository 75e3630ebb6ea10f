//! Line locator for Dockerfiles.
//!
//! Only `FROM` instructions are reported. The site value is the image
//! reference; `--platform` style flags are skipped and a stage name given
//! with `AS` is exposed as the `as` field of the frame.

use super::{Frame, Locator, Segment, Site};
use crate::patch::Span;
use crate::text::lines_with_offsets;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FromLine {
    image: Span,
    stage: Option<String>,
}

#[derive(Debug)]
pub struct DockerfileDocument<'s> {
    source: &'s str,
    lines: Vec<FromLine>,
}

impl<'s> DockerfileDocument<'s> {
    /// Dockerfiles have no syntax this locator rejects; unknown lines are
    /// ignored.
    pub fn parse(source: &'s str) -> Self {
        let mut lines = Vec::new();
        for (offset, line) in lines_with_offsets(source) {
            if let Some(from) = parse_from(line, offset) {
                lines.push(from);
            }
        }
        DockerfileDocument { source, lines }
    }
}

/// Whitespace-separated words with their byte ranges in `line`.
fn words(line: &str) -> impl Iterator<Item = (usize, &str)> {
    line.split_whitespace()
        .map(move |w| (w.as_ptr() as usize - line.as_ptr() as usize, w))
}

fn parse_from(line: &str, offset: usize) -> Option<FromLine> {
    let mut words = words(line);
    let (_, instruction) = words.next()?;
    if !instruction.eq_ignore_ascii_case("FROM") {
        return None;
    }
    let (start, image) = words.find(|(_, w)| !w.starts_with("--"))?;
    let stage = match (words.next(), words.next()) {
        (Some((_, kw)), Some((_, name))) if kw.eq_ignore_ascii_case("AS") => Some(name.to_string()),
        _ => None,
    };
    Some(FromLine {
        image: Span::new(offset + start, offset + start + image.len()),
        stage,
    })
}

impl Locator for DockerfileDocument<'_> {
    fn format(&self) -> &'static str {
        "dockerfile"
    }

    fn source(&self) -> &str {
        self.source
    }

    fn visit(&self, visitor: &mut dyn FnMut(&Site<'_>)) {
        for from in &self.lines {
            let frame = Frame {
                segment: Segment::Element("FROM".to_string()),
                fields: from
                    .stage
                    .iter()
                    .map(|s| ("as".to_string(), s.clone()))
                    .collect(),
            };
            visitor(&Site {
                path: std::slice::from_ref(&frame),
                value: &self.source[from.image.start..from.image.end],
                span: from.image,
                block: false,
                patchable: true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::Selection;
    use crate::version::TokenKind;

    const DOCKERFILE: &str = "# syntax=docker/dockerfile:1\r\nFROM --platform=$BUILDPLATFORM mcr.microsoft.com/dotnet/sdk:6.0 AS build\r\nRUN dotnet publish\r\n\r\nfrom mcr.microsoft.com/dotnet/aspnet:6.0-alpine\r\nCOPY --from=build /app .\r\n";

    #[test]
    fn finds_from_images() {
        let doc = DockerfileDocument::parse(DOCKERFILE);
        let mut images = Vec::new();
        doc.visit(&mut |site| {
            images.push((
                site.value.to_string(),
                site.ancestor(0).and_then(|f| f.field("as")).map(str::to_string),
            ))
        });
        assert_eq!(
            images,
            vec![
                (
                    "mcr.microsoft.com/dotnet/sdk:6.0".to_string(),
                    Some("build".to_string())
                ),
                ("mcr.microsoft.com/dotnet/aspnet:6.0-alpine".to_string(), None),
            ]
        );
    }

    #[test]
    fn candidate_spans_point_at_image() {
        let doc = DockerfileDocument::parse(DOCKERFILE);
        let predicate = |_: &Site<'_>| Some(Selection::whole(TokenKind::ImageTag, 1));
        let found = doc.find_candidates(&predicate);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].line, 5);
        let span = found[0].span;
        assert_eq!(&DOCKERFILE[span.start..span.end], "mcr.microsoft.com/dotnet/sdk:6.0");
    }

    #[test]
    fn comments_and_other_instructions_are_ignored() {
        let doc = DockerfileDocument::parse("# FROM old:1.0\nRUN echo FROM x:1.0\n");
        let mut count = 0;
        doc.visit(&mut |_| count += 1);
        assert_eq!(count, 0);
    }
}
