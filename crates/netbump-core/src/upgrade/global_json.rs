//! `global.json`: the pinned SDK version.

use super::{DocumentRules, UpgraderSpec};
use crate::locate::{Selection, Site};
use crate::version::{TokenKind, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "global-json",
    patterns: &["**/global.json"],
    priority: 10,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalJson;

impl DocumentRules for GlobalJson {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn select(&self, _path: &str, site: &Site<'_>) -> Option<Selection> {
        (site.path.len() == 2 && site.ends_with_keys(&["sdk", "version"]))
            .then(|| Selection::whole(TokenKind::RegistrySemver, 1))
    }

    fn changelog(&self, channel: &UpgradeChannel) -> String {
        format!("Updated the SDK pinned in global.json to {}", channel.sdk_version())
    }
}
