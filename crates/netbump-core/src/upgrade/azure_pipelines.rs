//! `version` inputs of `UseDotNet` tasks in Azure Pipelines.

use super::{DocumentRules, UpgraderSpec};
use crate::locate::{Selection, Site};
use crate::version::{TokenKind, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "azure-pipelines",
    patterns: &[
        "**/azure-pipelines*.yml",
        "**/azure-pipelines*.yaml",
        ".azure/**/*.yml",
        ".pipelines/**/*.yml",
    ],
    priority: 50,
};

const TASK: &str = "UseDotNet@";

#[derive(Debug, Clone, Copy, Default)]
pub struct AzurePipelines;

impl DocumentRules for AzurePipelines {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn select(&self, _path: &str, site: &Site<'_>) -> Option<Selection> {
        if !site.ends_with_keys(&["inputs", "version"]) {
            return None;
        }
        let task = site.ancestor(1)?.field("task")?;
        task.starts_with(TASK)
            .then(|| Selection::whole(TokenKind::FloatingChannel, 1))
    }

    fn changelog(&self, channel: &UpgradeChannel) -> String {
        format!("Azure Pipelines install the {} SDK", channel)
    }
}
