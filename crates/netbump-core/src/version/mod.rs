//! Version model: parsing, comparison and upgrade formatting for every
//! version grammar the upgraders understand.
//!
//! Each grammar lives in its own submodule and produces a typed value;
//! [`VersionToken`] wraps one of those values together with the raw text it
//! was parsed from. The three entry points mirror how the rest of the crate
//! uses the model:
//!
//! - [`parse`]: text + kind -> token, or a [`ParseFailure`] value
//! - [`compare`]: numeric ordering with missing segments treated as zero
//! - [`format_upgraded`]: the text a token should become for a channel,
//!   preserving the token's precision, wildcard style and inline comment

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseFailure;

pub mod channel;
pub mod floating;
pub mod image_tag;
pub mod moniker;
pub mod rid;
pub mod runtime;
pub mod semver;

pub use channel::{ReleaseKind, SupportPhase, UpgradeChannel};
pub use floating::{FloatingExpr, FloatingList};
pub use image_tag::ImageReference;
pub use moniker::{FrameworkFamily, Moniker, MonikerList};
pub use rid::{RuntimeIdentifier, RuntimeIdentifierList};
pub use runtime::ManagedRuntime;
pub use semver::SemVersion;

// ============================================================================
// Token Kinds
// ============================================================================

/// The grammar a version token is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    /// `net8.0`, `netcoreapp3.1`, `net6.0;net7.0`
    FrameworkMoniker,
    /// `8.0.100`, `8.0.100-preview.7.23376.3`
    RegistrySemver,
    /// `win10-x64`, `osx.12-arm64`
    RuntimeIdentifier,
    /// `dotnet8`, `dotnetcore3.1`
    ManagedRuntime,
    /// `8.x`, `8.0.x`, `8.0.1xx`, multi-line lists of those
    FloatingChannel,
    /// `mcr.microsoft.com/dotnet/sdk:8.0-alpine`
    ImageTag,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::FrameworkMoniker => "framework moniker",
            TokenKind::RegistrySemver => "registry semver",
            TokenKind::RuntimeIdentifier => "runtime identifier",
            TokenKind::ManagedRuntime => "managed runtime",
            TokenKind::FloatingChannel => "floating channel expression",
            TokenKind::ImageTag => "image tag",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Numeric Versions
// ============================================================================

/// One dot-separated prerelease identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreLabel {
    Numeric(u64),
    Alpha(String),
}

impl PreLabel {
    pub fn parse(label: &str) -> Option<Self> {
        if label.is_empty() {
            return None;
        }
        if label.bytes().all(|b| b.is_ascii_digit()) {
            return label.parse().ok().map(PreLabel::Numeric);
        }
        if label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Some(PreLabel::Alpha(label.to_string()));
        }
        None
    }
}

impl Ord for PreLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PreLabel::Numeric(a), PreLabel::Numeric(b)) => a.cmp(b),
            (PreLabel::Numeric(_), PreLabel::Alpha(_)) => Ordering::Less,
            (PreLabel::Alpha(_), PreLabel::Numeric(_)) => Ordering::Greater,
            (PreLabel::Alpha(a), PreLabel::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PreLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreLabel::Numeric(n) => write!(f, "{}", n),
            PreLabel::Alpha(s) => f.write_str(s),
        }
    }
}

/// The comparable numeric form of any token.
///
/// Unspecified segments are `None` so formatting can reproduce the original
/// precision; comparison treats them as zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NumericVersion {
    pub major: u64,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub prerelease: Vec<PreLabel>,
}

impl NumericVersion {
    pub fn new(major: u64, minor: Option<u64>, patch: Option<u64>) -> Self {
        NumericVersion {
            major,
            minor,
            patch,
            prerelease: Vec::new(),
        }
    }

    /// `major.minor` only, for channel-level comparisons.
    pub fn channel_key(&self) -> (u64, u64) {
        (self.major, self.minor.unwrap_or(0))
    }
}

impl Ord for NumericVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl PartialOrd for NumericVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two versions with standard precedence.
///
/// Missing minor/patch segments compare as zero. A version with prerelease
/// labels ranks below the same version without them; labels compare
/// pairwise, numeric below alphanumeric, and a shorter label list ranks below
/// a longer one that extends it.
pub fn compare(a: &NumericVersion, b: &NumericVersion) -> Ordering {
    let core_a = (a.major, a.minor.unwrap_or(0), a.patch.unwrap_or(0));
    let core_b = (b.major, b.minor.unwrap_or(0), b.patch.unwrap_or(0));
    core_a.cmp(&core_b).then_with(|| {
        match (a.prerelease.is_empty(), b.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.prerelease.cmp(&b.prerelease),
        }
    })
}

// ============================================================================
// Tokens
// ============================================================================

/// The parsed value of a token, one variant per grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    Monikers(MonikerList),
    Semver(SemVersion),
    RuntimeIdentifiers(RuntimeIdentifierList),
    ManagedRuntime(ManagedRuntime),
    Floating(FloatingList),
    ImageTag(ImageReference),
}

/// A version value extracted from a document. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken {
    raw: String,
    kind: TokenKind,
    value: TokenValue,
}

impl VersionToken {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn value(&self) -> &TokenValue {
        &self.value
    }

    /// The highest numeric version the token expresses, if it has one.
    ///
    /// Runtime identifiers are not numeric and return `None`.
    pub fn numeric(&self) -> Option<NumericVersion> {
        match &self.value {
            TokenValue::Monikers(list) => list.highest_upgradable().map(|m| m.version.clone()),
            TokenValue::Semver(v) => Some(v.to_numeric()),
            TokenValue::RuntimeIdentifiers(_) => None,
            TokenValue::ManagedRuntime(r) => Some(r.to_numeric()),
            TokenValue::Floating(list) => list.highest().map(|e| e.expr.to_numeric()),
            TokenValue::ImageTag(image) => image.lowest_run(),
        }
    }

    /// Whether the token used a wildcard or feature-band suffix.
    pub fn is_floating(&self) -> bool {
        match &self.value {
            TokenValue::Floating(list) => list.entries().iter().any(|e| e.expr.is_floating()),
            _ => false,
        }
    }

    /// Whether the token already satisfies `channel`, so no edit may be
    /// produced for it.
    pub fn is_at_least(&self, channel: &UpgradeChannel) -> bool {
        match &self.value {
            TokenValue::Monikers(list) => list.is_at_least(channel),
            TokenValue::Semver(v) => {
                compare(&v.to_numeric(), &channel.sdk_version().to_numeric()) != Ordering::Less
            }
            TokenValue::RuntimeIdentifiers(list) => list.is_portable(),
            TokenValue::ManagedRuntime(r) => r.major >= channel.major(),
            TokenValue::Floating(list) => list.is_at_least(channel),
            TokenValue::ImageTag(image) => image.is_at_least(channel),
        }
    }
}

/// Parse `text` as a token of `kind`.
pub fn parse(text: &str, kind: TokenKind) -> Result<VersionToken, ParseFailure> {
    let value = match kind {
        TokenKind::FrameworkMoniker => TokenValue::Monikers(MonikerList::parse(text)?),
        TokenKind::RegistrySemver => TokenValue::Semver(SemVersion::parse(text)?),
        TokenKind::RuntimeIdentifier => {
            TokenValue::RuntimeIdentifiers(RuntimeIdentifierList::parse(text)?)
        }
        TokenKind::ManagedRuntime => TokenValue::ManagedRuntime(ManagedRuntime::parse(text)?),
        TokenKind::FloatingChannel => TokenValue::Floating(FloatingList::parse(text)?),
        TokenKind::ImageTag => TokenValue::ImageTag(ImageReference::parse(text)?),
    };
    Ok(VersionToken {
        raw: text.to_string(),
        kind,
        value,
    })
}

// ============================================================================
// Formatting
// ============================================================================

/// Document-level details a formatter may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Line terminator used when a list gains a new line.
    pub newline: &'static str,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions { newline: "\n" }
    }
}

/// The text `token` should become for `channel`.
///
/// Formatting preserves the token's own style: precision and wildcard
/// character of floating expressions, platform suffixes of monikers, the
/// non-numeric parts of image tags, and any trailing inline comment. When the
/// token has nothing to upgrade the raw text is returned unchanged.
pub fn format_upgraded(
    token: &VersionToken,
    channel: &UpgradeChannel,
    options: &FormatOptions,
) -> String {
    match &token.value {
        TokenValue::Monikers(list) => list.format_upgraded(channel),
        TokenValue::Semver(_) => channel.sdk_version().to_string(),
        TokenValue::RuntimeIdentifiers(list) => list.format_portable(),
        TokenValue::ManagedRuntime(r) => r.format_upgraded(channel),
        TokenValue::Floating(list) => list.format_upgraded(channel, options),
        TokenValue::ImageTag(image) => image.format_upgraded(channel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u64, minor: Option<u64>, patch: Option<u64>) -> NumericVersion {
        NumericVersion::new(major, minor, patch)
    }

    mod compare_tests {
        use super::*;

        #[test]
        fn missing_segments_are_zero() {
            assert_eq!(compare(&v(8, None, None), &v(8, Some(0), Some(0))), Ordering::Equal);
            assert_eq!(compare(&v(8, Some(1), None), &v(8, Some(0), Some(9))), Ordering::Greater);
        }

        #[test]
        fn prerelease_ranks_below_release() {
            let mut pre = v(8, Some(0), Some(100));
            pre.prerelease = vec![PreLabel::Alpha("rc".into()), PreLabel::Numeric(1)];
            assert_eq!(compare(&pre, &v(8, Some(0), Some(100))), Ordering::Less);
            assert_eq!(compare(&pre, &v(7, Some(0), Some(400))), Ordering::Greater);
        }

        #[test]
        fn prerelease_labels_compare_pairwise() {
            let mut a = v(9, Some(0), Some(100));
            a.prerelease = vec![PreLabel::Alpha("preview".into()), PreLabel::Numeric(2)];
            let mut b = a.clone();
            b.prerelease = vec![PreLabel::Alpha("preview".into()), PreLabel::Numeric(10)];
            assert_eq!(compare(&a, &b), Ordering::Less);

            let mut c = a.clone();
            c.prerelease = vec![PreLabel::Alpha("rc".into())];
            assert_eq!(compare(&a, &c), Ordering::Less);
        }

        #[test]
        fn numeric_label_ranks_below_alpha() {
            assert!(PreLabel::Numeric(99) < PreLabel::Alpha("alpha".into()));
        }
    }

    mod token_tests {
        use super::*;

        fn channel() -> UpgradeChannel {
            UpgradeChannel::parse("8.0").unwrap()
        }

        #[test]
        fn parse_failure_is_a_value() {
            let failure = parse("banana", TokenKind::RegistrySemver).unwrap_err();
            assert_eq!(failure.kind, TokenKind::RegistrySemver);
        }

        #[test]
        fn same_precision_reproduces_raw_when_current() {
            let channel = channel();
            for (text, kind) in [
                ("8.0.x", TokenKind::FloatingChannel),
                ("8.0.1xx", TokenKind::FloatingChannel),
                ("8.x", TokenKind::FloatingChannel),
                ("net8.0", TokenKind::FrameworkMoniker),
                ("dotnet8", TokenKind::ManagedRuntime),
                ("linux-x64", TokenKind::RuntimeIdentifier),
            ] {
                let token = parse(text, kind).unwrap();
                assert!(token.is_at_least(&channel), "{} should be current", text);
                assert_eq!(
                    format_upgraded(&token, &channel, &FormatOptions::default()),
                    text
                );
            }
        }

        #[test]
        fn floating_flag() {
            assert!(parse("6.0.x", TokenKind::FloatingChannel).unwrap().is_floating());
            assert!(!parse("6.0.100", TokenKind::FloatingChannel).unwrap().is_floating());
        }

        #[test]
        fn numeric_of_moniker_list_is_highest() {
            let token = parse("net6.0;net7.0", TokenKind::FrameworkMoniker).unwrap();
            assert_eq!(token.numeric().unwrap().channel_key(), (7, 0));
        }
    }
}
