//! Build output paths in VS Code launch and task configurations.
//!
//! Paths like `${workspaceFolder}/bin/Debug/net6.0/App.dll` name the target
//! framework as a directory. Only that path segment is rewritten.

use std::sync::LazyLock;

use regex::Regex;

use super::{DocumentFormat, DocumentRules, UpgraderSpec};
use crate::locate::{Segment, Selection, Site};
use crate::version::{TokenKind, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "vscode",
    patterns: &[".vscode/launch.json", ".vscode/tasks.json"],
    priority: 80,
};

/// A `netM.m` path segment.
static MONIKER_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[/\\])(net\d+\.\d+)(?:[/\\]|$)").expect("valid moniker segment regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct VsCode;

impl VsCode {
    fn is_path_property(site: &Site<'_>) -> bool {
        match site.leaf() {
            Some(Segment::Key(key)) => key == "program" || key == "cwd",
            Some(Segment::Index(_)) => site
                .ancestor(1)
                .is_some_and(|frame| frame.segment.is_key("args")),
            _ => false,
        }
    }
}

impl DocumentRules for VsCode {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn format_of(&self, _path: &str) -> DocumentFormat {
        DocumentFormat::Json
    }

    fn select(&self, _path: &str, site: &Site<'_>) -> Option<Selection> {
        if !Self::is_path_property(site) {
            return None;
        }
        let moniker = MONIKER_SEGMENT.captures(site.value)?.get(1)?;
        Some(Selection::part(
            TokenKind::FrameworkMoniker,
            1,
            moniker.start()..moniker.end(),
        ))
    }

    fn changelog(&self, channel: &UpgradeChannel) -> String {
        format!("VS Code launch and task paths point at net{} output", channel)
    }
}
