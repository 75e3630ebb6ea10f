//! Target framework monikers and semicolon-delimited moniker lists.

use std::ops::Range;

use super::channel::UpgradeChannel;
use super::{NumericVersion, TokenKind};
use crate::error::ParseFailure;

/// Framework family a moniker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameworkFamily {
    /// `net5.0` and later, optionally with a platform suffix.
    Net,
    /// `netcoreapp1.0` .. `netcoreapp3.1`
    NetCoreApp,
    /// `netstandard2.0`; recognized but never upgraded.
    NetStandard,
    /// `net48`, `net472`; recognized but never upgraded.
    NetFramework,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moniker {
    pub family: FrameworkFamily,
    pub version: NumericVersion,
    /// Text after the first `-`, e.g. `windows` or `ios17.0`.
    pub platform: Option<String>,
}

impl Moniker {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let fail = |reason: &str| ParseFailure::new(text, TokenKind::FrameworkMoniker, reason);
        let lower = text.to_ascii_lowercase();

        if let Some(rest) = lower.strip_prefix("netstandard") {
            let version = if rest.is_empty() {
                NumericVersion::default()
            } else {
                dotted(rest).ok_or_else(|| fail("malformed netstandard version"))?
            };
            return Ok(Moniker {
                family: FrameworkFamily::NetStandard,
                version,
                platform: None,
            });
        }

        if let Some(rest) = lower.strip_prefix("netcoreapp") {
            let version = dotted(rest).ok_or_else(|| fail("malformed netcoreapp version"))?;
            return Ok(Moniker {
                family: FrameworkFamily::NetCoreApp,
                version,
                platform: None,
            });
        }

        let rest = lower
            .strip_prefix("net")
            .ok_or_else(|| fail("unknown framework prefix"))?;

        // net48 / net472 / net35: digits only, no dot
        if (2..=3).contains(&rest.len())
            && matches!(rest.as_bytes()[0], b'1'..=b'4')
            && rest.bytes().all(|b| b.is_ascii_digit())
        {
            let digits: Vec<u64> = rest.bytes().map(|b| u64::from(b - b'0')).collect();
            let version = NumericVersion::new(
                digits[0],
                digits.get(1).copied(),
                digits.get(2).copied(),
            );
            return Ok(Moniker {
                family: FrameworkFamily::NetFramework,
                version,
                platform: None,
            });
        }

        let (number, platform) = match rest.split_once('-') {
            Some((number, platform)) => {
                if platform.is_empty() {
                    return Err(fail("empty platform suffix"));
                }
                // keep the suffix in its original case
                let offset = text.len() - platform.len();
                (number, Some(text[offset..].to_string()))
            }
            None => (rest, None),
        };
        let version = dotted(number).ok_or_else(|| fail("malformed version"))?;
        if version.minor.is_none() {
            return Err(fail("version needs major.minor"));
        }
        if version.major < 5 {
            return Err(fail("netN.M monikers start at net5.0"));
        }
        Ok(Moniker {
            family: FrameworkFamily::Net,
            version,
            platform,
        })
    }

    pub fn is_upgradable(&self) -> bool {
        matches!(
            self.family,
            FrameworkFamily::Net | FrameworkFamily::NetCoreApp
        )
    }

    /// The moniker for `channel`, keeping this moniker's platform suffix.
    pub fn upgraded(&self, channel: &UpgradeChannel) -> String {
        format_moniker(channel, self.platform.as_deref())
    }
}

fn format_moniker(channel: &UpgradeChannel, platform: Option<&str>) -> String {
    match platform {
        Some(platform) => format!("net{}.{}-{}", channel.major(), channel.minor(), platform),
        None => format!("net{}.{}", channel.major(), channel.minor()),
    }
}

/// `M.m` with optional further numeric segments folded into patch.
fn dotted(text: &str) -> Option<NumericVersion> {
    let mut parts = text.split('.');
    let major = parts.next().and_then(number)?;
    let minor = match parts.next() {
        Some(p) => Some(number(p)?),
        None => None,
    };
    let patch = match parts.next() {
        Some(p) => Some(number(p)?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(NumericVersion::new(major, minor, patch))
}

fn number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

// ============================================================================
// Moniker Lists
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonikerItem {
    Parsed(Moniker),
    /// Anything else, such as an MSBuild property reference.
    Opaque(String),
}

/// A `;`-delimited moniker list. A single moniker is a list of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonikerList {
    raw: String,
    items: Vec<(Range<usize>, MonikerItem)>,
}

impl MonikerList {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let mut items = Vec::new();
        let mut offset = 0usize;
        for piece in text.split(';') {
            let start = offset + (piece.len() - piece.trim_start().len());
            let trimmed = piece.trim();
            offset += piece.len() + 1;
            if trimmed.is_empty() {
                continue;
            }
            let item = match Moniker::parse(trimmed) {
                Ok(moniker) => MonikerItem::Parsed(moniker),
                Err(_) => MonikerItem::Opaque(trimmed.to_string()),
            };
            items.push((start..start + trimmed.len(), item));
        }

        if !items
            .iter()
            .any(|(_, item)| matches!(item, MonikerItem::Parsed(_)))
        {
            return Err(ParseFailure::new(
                text,
                TokenKind::FrameworkMoniker,
                "no framework moniker found",
            ));
        }
        Ok(MonikerList {
            raw: text.to_string(),
            items,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn monikers(&self) -> impl Iterator<Item = &Moniker> {
        self.items.iter().filter_map(|(_, item)| match item {
            MonikerItem::Parsed(m) => Some(m),
            MonikerItem::Opaque(_) => None,
        })
    }

    /// Highest upgradable moniker; the first one wins a tie.
    pub fn highest_upgradable(&self) -> Option<&Moniker> {
        let mut best: Option<&Moniker> = None;
        for moniker in self.monikers().filter(|m| m.is_upgradable()) {
            if !best.is_some_and(|b| moniker.version <= b.version) {
                best = Some(moniker);
            }
        }
        best
    }

    /// True when nothing in the list needs the channel: either the highest
    /// upgradable moniker already reaches it or there is nothing upgradable.
    pub fn is_at_least(&self, channel: &UpgradeChannel) -> bool {
        match self.highest_upgradable() {
            Some(m) => m.version.channel_key() >= (channel.major(), channel.minor()),
            None => true,
        }
    }

    /// Replace a sole moniker, or append the channel's moniker to a list of
    /// two or more.
    pub fn format_upgraded(&self, channel: &UpgradeChannel) -> String {
        if self.is_at_least(channel) {
            return self.raw.clone();
        }
        if self.items.len() == 1 {
            let (range, item) = &self.items[0];
            if let MonikerItem::Parsed(moniker) = item {
                let mut out = String::with_capacity(self.raw.len() + 4);
                out.push_str(&self.raw[..range.start]);
                out.push_str(&moniker.upgraded(channel));
                out.push_str(&self.raw[range.end..]);
                return out;
            }
        }

        let platform = self
            .highest_upgradable()
            .and_then(|m| m.platform.as_deref());
        let body = self.raw.trim_end();
        let tail = &self.raw[body.len()..];
        let separator = if body.ends_with(';') { "" } else { ";" };
        format!(
            "{}{}{}{}",
            body,
            separator,
            format_moniker(channel, platform),
            tail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> UpgradeChannel {
        UpgradeChannel::parse("8.0").unwrap()
    }

    mod moniker_tests {
        use super::*;

        #[test]
        fn families() {
            assert_eq!(Moniker::parse("net8.0").unwrap().family, FrameworkFamily::Net);
            assert_eq!(
                Moniker::parse("netcoreapp3.1").unwrap().family,
                FrameworkFamily::NetCoreApp
            );
            assert_eq!(
                Moniker::parse("netstandard2.0").unwrap().family,
                FrameworkFamily::NetStandard
            );
            assert_eq!(Moniker::parse("net48").unwrap().family, FrameworkFamily::NetFramework);
            assert_eq!(
                Moniker::parse("net472").unwrap().version,
                NumericVersion::new(4, Some(7), Some(2))
            );
        }

        #[test]
        fn platform_suffix_keeps_case() {
            let m = Moniker::parse("net6.0-Windows10.0.19041.0").unwrap();
            assert_eq!(m.platform.as_deref(), Some("Windows10.0.19041.0"));
            assert_eq!(m.upgraded(&channel()), "net8.0-Windows10.0.19041.0");
        }

        #[test]
        fn legacy_monikers_are_not_upgradable() {
            assert!(!Moniker::parse("net48").unwrap().is_upgradable());
            assert!(!Moniker::parse("netstandard2.1").unwrap().is_upgradable());
            assert!(Moniker::parse("netcoreapp3.1").unwrap().is_upgradable());
        }

        #[test]
        fn rejects_non_monikers() {
            for text in ["dotnet8", "net", "net4.0", "net8", "net8.0-", "banana"] {
                assert!(Moniker::parse(text).is_err(), "{} should not parse", text);
            }
        }
    }

    mod list_tests {
        use super::*;

        #[test]
        fn sole_moniker_is_replaced() {
            let list = MonikerList::parse("net6.0").unwrap();
            assert_eq!(list.format_upgraded(&channel()), "net8.0");
        }

        #[test]
        fn two_monikers_get_append() {
            let list = MonikerList::parse("net6.0;net7.0").unwrap();
            assert_eq!(list.format_upgraded(&channel()), "net6.0;net7.0;net8.0");
        }

        #[test]
        fn netcoreapp_is_replaced_by_net() {
            let list = MonikerList::parse("netcoreapp3.1").unwrap();
            assert_eq!(list.format_upgraded(&channel()), "net8.0");
        }

        #[test]
        fn append_uses_highest_platform() {
            let list = MonikerList::parse("net48;net6.0-windows").unwrap();
            assert_eq!(
                list.format_upgraded(&channel()),
                "net48;net6.0-windows;net8.0-windows"
            );
        }

        #[test]
        fn trailing_separator_is_reused() {
            let list = MonikerList::parse("net6.0;net7.0;").unwrap();
            assert_eq!(list.format_upgraded(&channel()), "net6.0;net7.0;net8.0");
        }

        #[test]
        fn current_list_is_unchanged() {
            let list = MonikerList::parse("net6.0;net8.0").unwrap();
            assert!(list.is_at_least(&channel()));
            assert_eq!(list.format_upgraded(&channel()), "net6.0;net8.0");
        }

        #[test]
        fn legacy_only_list_is_current() {
            let list = MonikerList::parse("netstandard2.0;net48").unwrap();
            assert!(list.is_at_least(&channel()));
        }

        #[test]
        fn property_references_are_opaque() {
            let list = MonikerList::parse("$(BaseTargets);net6.0").unwrap();
            assert_eq!(list.len(), 2);
            assert_eq!(
                list.format_upgraded(&channel()),
                "$(BaseTargets);net6.0;net8.0"
            );
            assert!(MonikerList::parse("$(OnlyProps)").is_err());
        }
    }
}
