//! Runtime identifiers and portability normalization.
//!
//! Upgrading a RID never bumps a number: a version-pinned OS such as `win10`
//! or `ubuntu.22.04` is rewritten to the portable name of its family, and the
//! architecture and qualifiers after it are kept as written.

use super::TokenKind;
use crate::error::ParseFailure;

/// Families that are already portable.
const PORTABLE: &[&str] = &[
    "win", "osx", "linux", "freebsd", "illumos", "solaris", "unix", "any",
];

/// Families with no portable equivalent; always left as written.
const NO_EQUIVALENT: &[&str] = &[
    "ios",
    "iossimulator",
    "android",
    "browser",
    "tvos",
    "tvossimulator",
    "maccatalyst",
    "wasi",
    "tizen",
];

/// Version-pinned families and their portable replacement.
const PINNED: &[(&str, &str)] = &[
    ("win", "win"),
    ("osx", "osx"),
    ("alpine", "linux-musl"),
    ("ubuntu", "linux"),
    ("debian", "linux"),
    ("rhel", "linux"),
    ("centos", "linux"),
    ("fedora", "linux"),
    ("opensuse", "linux"),
    ("sles", "linux"),
    ("ol", "linux"),
    ("linuxmint", "linux"),
    ("freebsd", "freebsd"),
];

/// How a RID relates to the portable graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portability {
    Portable,
    Pinned(&'static str),
    NoEquivalent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeIdentifier {
    raw: String,
    /// Family name, lowercased, without version.
    family: String,
    /// Version suffix of the OS part (`10`, `.22.04`), if any.
    os_version: Option<String>,
    /// Everything from the first `-`, e.g. `-x64` or `-musl-arm64`.
    rest: String,
    portability: Portability,
}

impl RuntimeIdentifier {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let fail = |reason: &str| ParseFailure::new(text, TokenKind::RuntimeIdentifier, reason);
        if text.is_empty()
            || !text
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
        {
            return Err(fail("unexpected character"));
        }

        let (os_part, rest) = match text.find('-') {
            Some(i) => (&text[..i], &text[i..]),
            None => (text, ""),
        };
        if rest == "-" || rest.contains("--") {
            return Err(fail("empty segment"));
        }

        let name_len = os_part
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let family = os_part[..name_len].to_ascii_lowercase();
        let version = &os_part[name_len..];
        if family.is_empty() {
            return Err(fail("missing operating system"));
        }
        let os_version = if version.is_empty() {
            None
        } else {
            let digits = version.strip_prefix('.').unwrap_or(version);
            if digits.is_empty()
                || !digits.split('.').all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
            {
                return Err(fail("malformed operating system version"));
            }
            Some(version.to_string())
        };

        let portability = classify(&family, os_version.is_some())
            .ok_or_else(|| fail("unknown operating system"))?;

        Ok(RuntimeIdentifier {
            raw: text.to_string(),
            family,
            os_version,
            rest: rest.to_string(),
            portability,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn os_version(&self) -> Option<&str> {
        self.os_version.as_deref()
    }

    pub fn portability(&self) -> Portability {
        self.portability
    }

    /// The portable form, or the raw text when there is nothing to change.
    pub fn to_portable(&self) -> String {
        match self.portability {
            Portability::Pinned(portable) => {
                // alpine.3.18-musl-x64 must not become linux-musl-musl-x64
                let rest = if portable.ends_with("-musl") {
                    self.rest.strip_prefix("-musl").unwrap_or(&self.rest)
                } else {
                    &self.rest
                };
                format!("{}{}", portable, rest)
            }
            Portability::Portable | Portability::NoEquivalent => self.raw.clone(),
        }
    }
}

fn classify(family: &str, has_version: bool) -> Option<Portability> {
    if NO_EQUIVALENT.contains(&family) {
        return Some(Portability::NoEquivalent);
    }
    if has_version || !PORTABLE.contains(&family) {
        return PINNED
            .iter()
            .find(|(name, _)| *name == family)
            .map(|(_, portable)| Portability::Pinned(portable));
    }
    Some(Portability::Portable)
}

// ============================================================================
// Lists
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum RidItem {
    Parsed(RuntimeIdentifier),
    Opaque(String),
}

/// A `;`-delimited RID list, as found in `RuntimeIdentifiers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeIdentifierList {
    raw: String,
    items: Vec<RidItem>,
}

impl RuntimeIdentifierList {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let items: Vec<RidItem> = text
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match RuntimeIdentifier::parse(s) {
                Ok(rid) => RidItem::Parsed(rid),
                Err(_) => RidItem::Opaque(s.to_string()),
            })
            .collect();
        if !items.iter().any(|i| matches!(i, RidItem::Parsed(_))) {
            return Err(ParseFailure::new(
                text,
                TokenKind::RuntimeIdentifier,
                "no runtime identifier found",
            ));
        }
        Ok(RuntimeIdentifierList {
            raw: text.to_string(),
            items,
        })
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &RuntimeIdentifier> {
        self.items.iter().filter_map(|i| match i {
            RidItem::Parsed(rid) => Some(rid),
            RidItem::Opaque(_) => None,
        })
    }

    /// No item needs normalizing.
    pub fn is_portable(&self) -> bool {
        self.identifiers()
            .all(|rid| !matches!(rid.portability(), Portability::Pinned(_)))
    }

    /// Each item normalized, duplicates dropped keeping first occurrence.
    pub fn format_portable(&self) -> String {
        if self.is_portable() {
            return self.raw.clone();
        }
        let mut seen: Vec<String> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let text = match item {
                RidItem::Parsed(rid) => rid.to_portable(),
                RidItem::Opaque(s) => s.clone(),
            };
            if !seen.contains(&text) {
                seen.push(text);
            }
        }
        seen.join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portable(text: &str) -> String {
        RuntimeIdentifierList::parse(text).unwrap().format_portable()
    }

    #[test]
    fn pinned_windows_becomes_win() {
        assert_eq!(portable("win10-x64"), "win-x64");
        assert_eq!(portable("win7-x86"), "win-x86");
        assert_eq!(portable("win81-arm64"), "win-arm64");
    }

    #[test]
    fn pinned_macos_becomes_osx() {
        assert_eq!(portable("osx.12-arm64"), "osx-arm64");
        assert_eq!(portable("osx.10.14-x64"), "osx-x64");
    }

    #[test]
    fn distros_become_linux() {
        assert_eq!(portable("ubuntu.22.04-x64"), "linux-x64");
        assert_eq!(portable("rhel.8-x64"), "linux-x64");
        assert_eq!(portable("debian-arm"), "linux-arm");
        assert_eq!(portable("alpine.3.18-x64"), "linux-musl-x64");
        assert_eq!(portable("alpine-musl-x64"), "linux-musl-x64");
    }

    #[test]
    fn portable_rids_are_unchanged() {
        for text in ["linux-x64", "linux-musl-arm64", "win-x64", "osx-arm64", "any", "unix"] {
            let list = RuntimeIdentifierList::parse(text).unwrap();
            assert!(list.is_portable(), "{} should be portable", text);
            assert_eq!(list.format_portable(), text);
        }
    }

    #[test]
    fn no_equivalent_is_left_alone() {
        for text in ["ios-arm64", "android-arm64", "browser-wasm", "iossimulator-x64"] {
            let rid = RuntimeIdentifier::parse(text).unwrap();
            assert_eq!(rid.portability(), Portability::NoEquivalent);
            assert_eq!(rid.to_portable(), text);
        }
    }

    #[test]
    fn list_is_normalized_and_deduplicated() {
        assert_eq!(
            portable("win10-x64;win7-x64;ubuntu.20.04-x64;linux-x64"),
            "win-x64;linux-x64"
        );
    }

    #[test]
    fn rejects_unknown() {
        assert!(RuntimeIdentifier::parse("banana-x64").is_err());
        assert!(RuntimeIdentifier::parse("win10-").is_err());
        assert!(RuntimeIdentifier::parse("osx.-x64").is_err());
        assert!(RuntimeIdentifierList::parse("$(Rids)").is_err());
    }
}
