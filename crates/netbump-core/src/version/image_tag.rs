//! Container image references with version numbers embedded in the tag.
//!
//! A tag like `6.0-alpine` or `8.0.100-bookworm-slim` is opaque text with
//! numeric runs in it. A run starts at the start of the tag or after `-`/`_`
//! and ends at the end of the tag or before `-`/`_`; anything else in the tag
//! is never touched.

use std::ops::Range;

use super::channel::UpgradeChannel;
use super::{NumericVersion, TokenKind};
use crate::error::ParseFailure;

/// One numeric run inside a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRun {
    /// Byte range within the whole reference.
    pub range: Range<usize>,
    pub segments: Vec<u64>,
}

impl VersionRun {
    fn to_numeric(&self) -> NumericVersion {
        NumericVersion::new(
            self.segments[0],
            self.segments.get(1).copied(),
            self.segments.get(2).copied(),
        )
    }

    fn is_at_least(&self, channel: &UpgradeChannel) -> bool {
        match self.segments.as_slice() {
            [major] => *major >= channel.major(),
            [major, minor, ..] => (*major, *minor) >= (channel.major(), channel.minor()),
            [] => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    raw: String,
    /// Range of the repository (registry host included) within `raw`.
    repository: Range<usize>,
    tag: Range<usize>,
    digest: Option<Range<usize>>,
    runs: Vec<VersionRun>,
}

impl ImageReference {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let fail = |reason: &str| ParseFailure::new(text, TokenKind::ImageTag, reason);
        if text.is_empty() || text.chars().any(char::is_whitespace) {
            return Err(fail("not an image reference"));
        }

        let (name_tag_end, digest) = match text.find('@') {
            Some(i) if i + 1 < text.len() => (i, Some(i + 1..text.len())),
            Some(_) => return Err(fail("empty digest")),
            None => (text.len(), None),
        };
        let name_tag = &text[..name_tag_end];
        let last_slash = name_tag.rfind('/').map(|i| i + 1).unwrap_or(0);
        let colon = name_tag[last_slash..]
            .rfind(':')
            .map(|i| last_slash + i)
            .ok_or_else(|| fail("image has no tag"))?;
        if colon == 0 || colon + 1 >= name_tag.len() {
            return Err(fail("empty repository or tag"));
        }

        let tag = colon + 1..name_tag_end;
        let runs = find_runs(text, tag.clone());
        if runs.is_empty() {
            return Err(fail("tag carries no version"));
        }

        Ok(ImageReference {
            raw: text.to_string(),
            repository: 0..colon,
            tag,
            digest,
            runs,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn repository(&self) -> &str {
        &self.raw[self.repository.clone()]
    }

    pub fn tag(&self) -> &str {
        &self.raw[self.tag.clone()]
    }

    /// Pinned digest without the `@`, e.g. `sha256:...`.
    pub fn digest(&self) -> Option<&str> {
        self.digest.clone().map(|r| &self.raw[r])
    }

    pub fn runs(&self) -> &[VersionRun] {
        &self.runs
    }

    /// SDK images are the only ones where a full `M.m.p` run is an SDK
    /// version the channel can supply.
    fn is_sdk_image(&self) -> bool {
        self.repository().rsplit('/').next() == Some("sdk")
    }

    fn is_upgradable(&self, run: &VersionRun) -> bool {
        run.segments.len() < 3 || self.is_sdk_image()
    }

    /// The lowest upgradable run.
    pub fn lowest_run(&self) -> Option<NumericVersion> {
        self.runs
            .iter()
            .filter(|r| self.is_upgradable(r))
            .map(VersionRun::to_numeric)
            .min()
    }

    pub fn is_at_least(&self, channel: &UpgradeChannel) -> bool {
        self.runs
            .iter()
            .filter(|r| self.is_upgradable(r))
            .all(|r| r.is_at_least(channel))
    }

    /// Every upgradable run below the channel rewritten at its own precision.
    pub fn format_upgraded(&self, channel: &UpgradeChannel) -> String {
        let mut out = String::with_capacity(self.raw.len());
        let mut cursor = 0usize;
        for run in &self.runs {
            if !self.is_upgradable(run) || run.is_at_least(channel) {
                continue;
            }
            let replacement = match run.segments.len() {
                1 => channel.major().to_string(),
                2 => format!("{}.{}", channel.major(), channel.minor()),
                _ => channel.sdk_version().to_string(),
            };
            out.push_str(&self.raw[cursor..run.range.start]);
            out.push_str(&replacement);
            cursor = run.range.end;
        }
        out.push_str(&self.raw[cursor..]);
        out
    }

    /// `raw` with the digest replaced; a reference without a digest is
    /// returned unchanged.
    pub fn with_digest(text: &str, digest: &str) -> String {
        match text.find('@') {
            Some(i) => format!("{}@{}", &text[..i], digest),
            None => text.to_string(),
        }
    }
}

fn find_runs(text: &str, tag: Range<usize>) -> Vec<VersionRun> {
    let mut runs = Vec::new();
    let mut start = tag.start;
    for piece in text[tag.clone()].split(['-', '_']) {
        let range = start..start + piece.len();
        start = range.end + 1;
        if piece.is_empty() {
            continue;
        }
        let segments: Option<Vec<u64>> = piece
            .split('.')
            .map(|s| {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    s.parse().ok()
                }
            })
            .collect();
        if let Some(segments) = segments {
            if (1..=3).contains(&segments.len()) {
                runs.push(VersionRun { range, segments });
            }
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::semver::SemVersion;

    fn channel() -> UpgradeChannel {
        UpgradeChannel::parse("8.0")
            .unwrap()
            .with_sdk_version(SemVersion::new(8, 0, 204))
            .unwrap()
    }

    fn upgrade(text: &str) -> String {
        ImageReference::parse(text).unwrap().format_upgraded(&channel())
    }

    #[test]
    fn suffix_is_untouched() {
        assert_eq!(
            upgrade("mcr.example/dotnet/sdk:6.0-alpine"),
            "mcr.example/dotnet/sdk:8.0-alpine"
        );
        assert_eq!(
            upgrade("mcr.microsoft.com/dotnet/aspnet:6.0-bookworm-slim"),
            "mcr.microsoft.com/dotnet/aspnet:8.0-bookworm-slim"
        );
    }

    #[test]
    fn letters_glued_to_numbers_are_not_runs() {
        let image = ImageReference::parse("mcr.microsoft.com/dotnet/runtime:6.0-alpine3.18").unwrap();
        assert_eq!(image.runs().len(), 1);
        assert_eq!(
            image.format_upgraded(&channel()),
            "mcr.microsoft.com/dotnet/runtime:8.0-alpine3.18"
        );
    }

    #[test]
    fn high_numeric_suffix_is_untouched() {
        assert_eq!(
            upgrade("mcr.microsoft.com/dotnet/runtime:6.0-nanoserver-1809"),
            "mcr.microsoft.com/dotnet/runtime:8.0-nanoserver-1809"
        );
    }

    #[test]
    fn full_sdk_version_uses_channel_sdk() {
        assert_eq!(
            upgrade("mcr.microsoft.com/dotnet/sdk:6.0.420-jammy"),
            "mcr.microsoft.com/dotnet/sdk:8.0.204-jammy"
        );
    }

    #[test]
    fn full_runtime_version_is_not_guessed() {
        let image = ImageReference::parse("mcr.microsoft.com/dotnet/aspnet:6.0.32").unwrap();
        assert!(image.is_at_least(&channel()));
        assert_eq!(image.format_upgraded(&channel()), image.raw());
    }

    #[test]
    fn registry_port_and_digest() {
        let image =
            ImageReference::parse("localhost:5000/dotnet/sdk:6.0@sha256:abc").unwrap();
        assert_eq!(image.repository(), "localhost:5000/dotnet/sdk");
        assert_eq!(image.tag(), "6.0");
        assert_eq!(image.digest(), Some("sha256:abc"));
        assert_eq!(
            image.format_upgraded(&channel()),
            "localhost:5000/dotnet/sdk:8.0@sha256:abc"
        );
        assert_eq!(
            ImageReference::with_digest("x/sdk:8.0@sha256:abc", "sha256:def"),
            "x/sdk:8.0@sha256:def"
        );
    }

    #[test]
    fn rejects_untagged_or_versionless() {
        for text in ["mcr.microsoft.com/dotnet/sdk", "mcr.microsoft.com/dotnet/sdk:latest", "sdk:${TAG}", "localhost:5000/sdk"] {
            assert!(ImageReference::parse(text).is_err(), "{} should not parse", text);
        }
    }
}
