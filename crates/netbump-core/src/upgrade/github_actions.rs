//! `dotnet-version` inputs of `actions/setup-dotnet` steps.

use super::{DocumentRules, UpgraderSpec};
use crate::locate::{Selection, Site};
use crate::version::{TokenKind, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "github-actions",
    patterns: &[".github/workflows/*.yml", ".github/workflows/*.yaml"],
    priority: 40,
};

const SETUP_ACTION: &str = "actions/setup-dotnet@";

#[derive(Debug, Clone, Copy, Default)]
pub struct GithubActions;

impl DocumentRules for GithubActions {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn select(&self, _path: &str, site: &Site<'_>) -> Option<Selection> {
        if !site.ends_with_keys(&["with", "dotnet-version"]) {
            return None;
        }
        let uses = site.ancestor(1)?.field("uses")?;
        uses.starts_with(SETUP_ACTION)
            .then(|| Selection::whole(TokenKind::FloatingChannel, 1))
    }

    fn changelog(&self, channel: &UpgradeChannel) -> String {
        format!("GitHub Actions workflows install the {} SDK", channel)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::DocumentUpgrader;
    use super::*;
    use crate::report::Outcome;

    const WORKFLOW: &str = "\
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - uses: actions/setup-dotnet@v4
        with:
          dotnet-version: |
            6.0.x
            7.0.x
      - run: dotnet build
";

    fn upgrade(source: &str) -> (String, Outcome) {
        let dir = workspace(&[(".github/workflows/ci.yml", source)]);
        let report = run_one(Box::new(DocumentUpgrader(GithubActions)), &dir, "8.0");
        (read(&dir, ".github/workflows/ci.yml"), report.outcome)
    }

    #[test]
    fn multi_line_list_gains_a_line() {
        let (text, outcome) = upgrade(WORKFLOW);
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(
            text,
            WORKFLOW.replace("7.0.x\n", "7.0.x\n            8.0.x\n")
        );
    }

    #[test]
    fn single_value_keeps_quotes_and_comment() {
        let source = "jobs:\n  b:\n    steps:\n      - uses: actions/setup-dotnet@v3\n        with:\n          dotnet-version: '6.x' # current LTS\n";
        let (text, _) = upgrade(source);
        assert_eq!(text, source.replace("'6.x'", "'8.x'"));
    }

    #[test]
    fn feature_band_precision_is_kept() {
        let source = "jobs:\n  b:\n    steps:\n      - uses: actions/setup-dotnet@v4\n        with:\n          dotnet-version: 6.0.1xx\n";
        let (text, _) = upgrade(source);
        assert_eq!(text, source.replace("6.0.1xx", "8.0.1xx"));
    }

    #[test]
    fn other_actions_are_ignored() {
        let source = "jobs:\n  b:\n    steps:\n      - uses: someone/setup-tools@v1\n        with:\n          dotnet-version: 6.0.x\n";
        let (text, outcome) = upgrade(source);
        assert_eq!(outcome, Outcome::None);
        assert_eq!(text, source);
    }

    #[test]
    fn already_listed_channel_is_a_no_op() {
        let source = WORKFLOW.replace("7.0.x", "8.0.x");
        let (text, outcome) = upgrade(&source);
        assert_eq!(outcome, Outcome::None);
        assert_eq!(text, source);
    }
}
