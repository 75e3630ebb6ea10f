//! AWS Lambda managed runtimes and the Lambda tools target framework.
//!
//! Managed runtimes are policy gated: Lambda only offers LTS releases, so a
//! runtime moves only to an LTS channel in active or maintenance support.

use super::{DocumentRules, UpgraderSpec};
use crate::locate::{Segment, Selection, Site};
use crate::version::{TokenKind, UpgradeChannel};

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "aws-lambda",
    patterns: &[
        "**/aws-lambda-tools-defaults.json",
        "**/serverless.template",
        "**/template.yaml",
        "**/template.yml",
        "**/serverless.yml",
        "**/serverless.yaml",
    ],
    priority: 70,
};

const TOOLS_DEFAULTS: &str = "aws-lambda-tools-defaults.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct AwsLambda;

impl DocumentRules for AwsLambda {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn select(&self, path: &str, site: &Site<'_>) -> Option<Selection> {
        let Segment::Key(key) = site.leaf()? else {
            return None;
        };
        let top_level = site.path.len() == 1;
        match key.as_str() {
            // CloudFormation and SAM: Properties.Runtime, Globals.Function.Runtime
            "Runtime" if !top_level => Some(Selection::whole(TokenKind::ManagedRuntime, 1)),
            // Serverless Framework: provider.runtime, functions.<name>.runtime
            "runtime" if !top_level => Some(Selection::whole(TokenKind::ManagedRuntime, 1)),
            "function-runtime" if top_level => Some(Selection::whole(TokenKind::ManagedRuntime, 1)),
            "framework" if top_level && path.ends_with(TOOLS_DEFAULTS) => {
                Some(Selection::whole(TokenKind::FrameworkMoniker, 1))
            }
            _ => None,
        }
    }

    fn changelog(&self, channel: &UpgradeChannel) -> String {
        format!("AWS Lambda functions run on dotnet{}", channel.major())
    }
}
