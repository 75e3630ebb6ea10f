//! Portable runtime identifiers in MSBuild files.
//!
//! The portable RID graph is the only one the SDK understands from 8.0 on,
//! so earlier channels leave version-pinned identifiers alone.

use super::{DocumentRules, UpgraderSpec, PROJECT_PATTERNS};
use crate::locate::{Segment, Selection, Site};
use crate::version::{TokenKind, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "runtime-identifier",
    patterns: PROJECT_PATTERNS,
    priority: 30,
};

/// First channel major that resolves RIDs through the portable graph only.
const PORTABLE_GRAPH_MAJOR: u64 = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeIdentifiers;

impl DocumentRules for RuntimeIdentifiers {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn applies_to(&self, channel: &UpgradeChannel) -> bool {
        channel.major() >= PORTABLE_GRAPH_MAJOR
    }

    fn select(&self, _path: &str, site: &Site<'_>) -> Option<Selection> {
        match site.leaf()? {
            Segment::Element(name)
                if name == "RuntimeIdentifier" || name == "RuntimeIdentifiers" =>
            {
                Some(Selection::whole(TokenKind::RuntimeIdentifier, 1))
            }
            _ => None,
        }
    }

    fn changelog(&self, _channel: &UpgradeChannel) -> String {
        "Replaced version-specific runtime identifiers with portable ones".to_string()
    }
}
