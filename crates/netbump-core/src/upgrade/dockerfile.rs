//! `FROM` images of .NET container builds.
//!
//! Version runs in the tag move to the channel. When the reference is pinned
//! by digest the new tag is resolved through the registry; if that fails the
//! line is left as it was, since a stale digest would silently keep the old
//! image.

use super::{DocumentFormat, DocumentRules, Refinement, UpgradeContext, UpgraderSpec};
use crate::error::BumpError;
use crate::locate::{Candidate, Segment, Selection, Site};
use crate::version::{ImageReference, TokenKind, TokenValue, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "dockerfile",
    patterns: &["**/Dockerfile", "**/*.Dockerfile", "**/Dockerfile.*", "**/*.dockerfile"],
    priority: 60,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Dockerfile;

impl DocumentRules for Dockerfile {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn format_of(&self, _path: &str) -> DocumentFormat {
        DocumentFormat::Dockerfile
    }

    fn select(&self, _path: &str, site: &Site<'_>) -> Option<Selection> {
        match site.leaf()? {
            Segment::Element(name) if name == "FROM" && site.value.contains("/dotnet/") => {
                Some(Selection::whole(TokenKind::ImageTag, 1))
            }
            _ => None,
        }
    }

    fn refine(
        &self,
        candidate: &Candidate,
        replacement: String,
        ctx: &mut UpgradeContext<'_>,
    ) -> Result<Refinement, BumpError> {
        let TokenValue::ImageTag(original) = candidate.token.value() else {
            return Ok(Refinement::Replace(replacement));
        };
        if original.digest().is_none() {
            return Ok(Refinement::Replace(replacement));
        }
        let upgraded = match ImageReference::parse(&replacement) {
            Ok(image) => image,
            Err(failure) => return Ok(Refinement::Skip(failure.to_string())),
        };
        let Some(registry) = ctx.registry else {
            return Ok(Refinement::Skip(format!(
                "{} is pinned by digest and registry lookups are disabled",
                original.raw()
            )));
        };

        ctx.cancel.check()?;
        let resolved = ctx
            .digests
            .resolve(registry, upgraded.repository(), upgraded.tag());
        Ok(match resolved {
            Ok(Some(digest)) => Refinement::Replace(ImageReference::with_digest(&replacement, &digest)),
            Ok(None) => Refinement::Skip(format!(
                "no digest found for {}:{}; {} left unchanged",
                upgraded.repository(),
                upgraded.tag(),
                original.raw()
            )),
            Err(e) => Refinement::Skip(e.to_string()),
        })
    }

    fn changelog(&self, channel: &UpgradeChannel) -> String {
        format!("Container images use .NET {}", channel)
    }
}
