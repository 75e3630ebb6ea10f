//! Registry semantic versions: `major.minor.patch[-prerelease][+build]`.

use std::fmt;

use serde::{Serialize, Serializer};

use super::{NumericVersion, PreLabel, TokenKind};
use crate::error::ParseFailure;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Vec<PreLabel>,
    /// Build metadata, kept for display only; it never affects ordering.
    pub build: Option<String>,
}

impl SemVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemVersion {
            major,
            minor,
            patch,
            prerelease: Vec::new(),
            build: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let fail = |reason: &str| ParseFailure::new(text, TokenKind::RegistrySemver, reason);

        let (rest, build) = match text.split_once('+') {
            Some((rest, build)) => {
                if build.is_empty()
                    || !build
                        .split('.')
                        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'))
                {
                    return Err(fail("malformed build metadata"));
                }
                (rest, Some(build.to_string()))
            }
            None => (text, None),
        };

        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let mut parts = core.split('.');
        let mut next_number = |name: &str| -> Result<u64, ParseFailure> {
            let part = parts.next().ok_or_else(|| fail(&format!("missing {} segment", name)))?;
            parse_number(part).ok_or_else(|| fail(&format!("{} segment '{}' is not a number", name, part)))
        };
        let major = next_number("major")?;
        let minor = next_number("minor")?;
        let patch = next_number("patch")?;
        if parts.next().is_some() {
            return Err(fail("too many segments"));
        }

        let prerelease = match pre {
            None => Vec::new(),
            Some(pre) => pre
                .split('.')
                .map(|label| {
                    if label.len() > 1 && label.starts_with('0') && label.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                    PreLabel::parse(label)
                })
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| fail("malformed prerelease label"))?,
        };

        Ok(SemVersion {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    pub fn to_numeric(&self) -> NumericVersion {
        NumericVersion {
            major: self.major,
            minor: Some(self.minor),
            patch: Some(self.patch),
            prerelease: self.prerelease.clone(),
        }
    }
}

/// Parse an unsigned decimal with no sign and no leading zeros (except `0`).
pub(crate) fn parse_number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for SemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            f.write_str("-")?;
            for (i, label) in self.prerelease.iter().enumerate() {
                if i > 0 {
                    f.write_str(".")?;
                }
                write!(f, "{}", label)?;
            }
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl Serialize for SemVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
