//! The release channel an upgrade run targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::semver::SemVersion;
use super::NumericVersion;
use crate::error::BumpError;

/// Release cadence of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Preview,
    Lts,
    Standard,
}

impl ReleaseKind {
    /// Default cadence for a major version: even majors are long-term support.
    pub fn for_major(major: u64) -> Self {
        if major % 2 == 0 {
            ReleaseKind::Lts
        } else {
            ReleaseKind::Standard
        }
    }
}

impl FromStr for ReleaseKind {
    type Err = BumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(ReleaseKind::Preview),
            "lts" => Ok(ReleaseKind::Lts),
            "standard" | "sts" => Ok(ReleaseKind::Standard),
            other => Err(BumpError::invalid_args(format!(
                "unknown release kind '{}' (expected preview, lts or standard)",
                other
            ))),
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReleaseKind::Preview => "preview",
            ReleaseKind::Lts => "lts",
            ReleaseKind::Standard => "standard",
        })
    }
}

/// Where a channel is in its support lifecycle. Ordered by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportPhase {
    Preview,
    GoLive,
    Active,
    Maintenance,
    Eol,
}

impl FromStr for SupportPhase {
    type Err = BumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(SupportPhase::Preview),
            "go-live" | "golive" => Ok(SupportPhase::GoLive),
            "active" => Ok(SupportPhase::Active),
            "maintenance" => Ok(SupportPhase::Maintenance),
            "eol" => Ok(SupportPhase::Eol),
            other => Err(BumpError::invalid_args(format!(
                "unknown support phase '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SupportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SupportPhase::Preview => "preview",
            SupportPhase::GoLive => "go-live",
            SupportPhase::Active => "active",
            SupportPhase::Maintenance => "maintenance",
            SupportPhase::Eol => "eol",
        })
    }
}

/// Target release for a whole run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeChannel {
    major: u64,
    minor: u64,
    release_kind: ReleaseKind,
    support_phase: SupportPhase,
    sdk_version: SemVersion,
}

impl UpgradeChannel {
    /// Build a channel from all of its parts.
    ///
    /// The SDK version must belong to the channel (same major and minor).
    pub fn new(
        major: u64,
        minor: u64,
        sdk_version: SemVersion,
        release_kind: ReleaseKind,
        support_phase: SupportPhase,
    ) -> Result<Self, BumpError> {
        if sdk_version.major != major || sdk_version.minor != minor {
            return Err(BumpError::invalid_args(format!(
                "SDK version {} does not belong to channel {}.{}",
                sdk_version, major, minor
            )));
        }
        Ok(UpgradeChannel {
            major,
            minor,
            release_kind,
            support_phase,
            sdk_version,
        })
    }

    /// Parse `"8.0"` into a channel with default metadata: SDK `8.0.100`,
    /// release kind from the major's parity, phase `Active`.
    pub fn parse(text: &str) -> Result<Self, BumpError> {
        let bad = || {
            BumpError::invalid_args(format!(
                "channel '{}' must be written as MAJOR.MINOR",
                text
            ))
        };
        let (major, minor) = text.trim().split_once('.').ok_or_else(bad)?;
        let major: u64 = major.parse().map_err(|_| bad())?;
        let minor: u64 = minor.parse().map_err(|_| bad())?;
        let sdk = SemVersion::new(major, minor, 100);
        UpgradeChannel::new(
            major,
            minor,
            sdk,
            ReleaseKind::for_major(major),
            SupportPhase::Active,
        )
    }

    /// Replace the SDK version.
    pub fn with_sdk_version(self, sdk_version: SemVersion) -> Result<Self, BumpError> {
        UpgradeChannel::new(
            self.major,
            self.minor,
            sdk_version,
            self.release_kind,
            self.support_phase,
        )
    }

    /// Replace the release metadata.
    pub fn with_release(mut self, release_kind: ReleaseKind, support_phase: SupportPhase) -> Self {
        self.release_kind = release_kind;
        self.support_phase = support_phase;
        self
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn release_kind(&self) -> ReleaseKind {
        self.release_kind
    }

    pub fn support_phase(&self) -> SupportPhase {
        self.support_phase
    }

    pub fn sdk_version(&self) -> &SemVersion {
        &self.sdk_version
    }

    /// Feature band floor of the SDK: patch with its last two digits zeroed.
    pub fn feature_band(&self) -> u64 {
        (self.sdk_version.patch / 100) * 100
    }

    /// `major.minor` as a numeric version.
    pub fn to_numeric(&self) -> NumericVersion {
        NumericVersion::new(self.major, Some(self.minor), None)
    }

    /// Whether the channel is a long-term support release in active or
    /// maintenance support.
    pub fn is_supported_lts(&self) -> bool {
        self.release_kind == ReleaseKind::Lts
            && matches!(
                self.support_phase,
                SupportPhase::Active | SupportPhase::Maintenance
            )
    }
}

impl fmt::Display for UpgradeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let channel = UpgradeChannel::parse("8.0").unwrap();
        assert_eq!(channel.major(), 8);
        assert_eq!(channel.minor(), 0);
        assert_eq!(channel.sdk_version().to_string(), "8.0.100");
        assert_eq!(channel.release_kind(), ReleaseKind::Lts);
        assert_eq!(channel.support_phase(), SupportPhase::Active);
        assert!(channel.is_supported_lts());
    }

    #[test]
    fn odd_major_is_standard() {
        let channel = UpgradeChannel::parse("9.0").unwrap();
        assert_eq!(channel.release_kind(), ReleaseKind::Standard);
        assert!(!channel.is_supported_lts());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(UpgradeChannel::parse("eight").is_err());
        assert!(UpgradeChannel::parse("8").is_err());
        assert!(UpgradeChannel::parse("8.x").is_err());
    }

    #[test]
    fn feature_band_floors_patch() {
        let channel = UpgradeChannel::parse("8.0")
            .unwrap()
            .with_sdk_version(SemVersion::new(8, 0, 108))
            .unwrap();
        assert_eq!(channel.feature_band(), 100);

        let channel = channel
            .with_sdk_version(SemVersion::parse("8.0.303").unwrap())
            .unwrap();
        assert_eq!(channel.feature_band(), 300);
    }

    #[test]
    fn sdk_must_match_channel() {
        let channel = UpgradeChannel::parse("8.0").unwrap();
        assert!(channel.with_sdk_version(SemVersion::new(7, 0, 400)).is_err());
    }

    #[test]
    fn preview_lts_is_not_supported() {
        let channel = UpgradeChannel::parse("10.0")
            .unwrap()
            .with_release(ReleaseKind::Lts, SupportPhase::Preview);
        assert!(!channel.is_supported_lts());
        let channel = channel.with_release(ReleaseKind::Lts, SupportPhase::Maintenance);
        assert!(channel.is_supported_lts());
    }

    #[test]
    fn phases_are_ordered() {
        assert!(SupportPhase::Preview < SupportPhase::GoLive);
        assert!(SupportPhase::Active < SupportPhase::Maintenance);
        assert_eq!("go-live".parse::<SupportPhase>().unwrap(), SupportPhase::GoLive);
        assert_eq!("LTS".parse::<ReleaseKind>().unwrap(), ReleaseKind::Lts);
    }
}
