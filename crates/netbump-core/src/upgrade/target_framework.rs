//! `TargetFramework` and `TargetFrameworks` in MSBuild files.

use super::{DocumentRules, UpgraderSpec, PROJECT_PATTERNS};
use crate::locate::{Segment, Selection, Site};
use crate::version::{TokenKind, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "target-framework",
    patterns: PROJECT_PATTERNS,
    priority: 20,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TargetFrameworks;

impl DocumentRules for TargetFrameworks {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn select(&self, _path: &str, site: &Site<'_>) -> Option<Selection> {
        match site.leaf()? {
            Segment::Element(name) if name == "TargetFramework" || name == "TargetFrameworks" => {
                Some(Selection::whole(TokenKind::FrameworkMoniker, 1))
            }
            _ => None,
        }
    }

    fn changelog(&self, channel: &UpgradeChannel) -> String {
        format!("Target framework net{} added to projects", channel)
    }
}
