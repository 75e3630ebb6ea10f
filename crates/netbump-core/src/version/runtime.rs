//! Managed serverless runtime names: `dotnet8`, `dotnetcore3.1`.

use super::channel::UpgradeChannel;
use super::{NumericVersion, TokenKind};
use crate::error::ParseFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedRuntime {
    pub major: u64,
    /// Only the legacy `dotnetcoreX.Y` form carries a minor.
    pub minor: Option<u64>,
}

impl ManagedRuntime {
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let fail = |reason: &str| ParseFailure::new(text, TokenKind::ManagedRuntime, reason);

        if let Some(rest) = text.strip_prefix("dotnetcore") {
            let (major, minor) = rest
                .split_once('.')
                .ok_or_else(|| fail("dotnetcore runtimes are written as dotnetcoreX.Y"))?;
            return Ok(ManagedRuntime {
                major: digits(major).ok_or_else(|| fail("malformed major"))?,
                minor: Some(digits(minor).ok_or_else(|| fail("malformed minor"))?),
            });
        }

        let rest = text
            .strip_prefix("dotnet")
            .ok_or_else(|| fail("not a dotnet runtime"))?;
        Ok(ManagedRuntime {
            major: digits(rest).ok_or_else(|| fail("runtime tag must be an integer"))?,
            minor: None,
        })
    }

    pub fn to_numeric(&self) -> NumericVersion {
        NumericVersion::new(self.major, self.minor, None)
    }

    pub fn format_upgraded(&self, channel: &UpgradeChannel) -> String {
        format!("dotnet{}", channel.major())
    }
}

fn digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
