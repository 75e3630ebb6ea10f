//! Platform package references, upgraded by an external tool.
//!
//! The engine only decides whether the tool needs to run: some project
//! references a package from one of the configured prefixes at a version
//! whose major is below the channel. How the tool picks versions is its own
//! business.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{CategoryReport, UpgradeContext, Upgrader, UpgraderSpec, PROJECT_PATTERNS};
use crate::document::SourceText;
use crate::error::{BumpError, DocumentError};
use crate::locate::{Locator, Segment, Site, XmlDocument};
use crate::report::{Outcome, Stage};
use crate::version::SemVersion;

const SPEC: UpgraderSpec = UpgraderSpec {
    name: "package-versions",
    patterns: PROJECT_PATTERNS,
    priority: 90,
};

/// A package reference below the channel major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleReference {
    pub file: String,
    pub package: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PackageVersions;

/// Package id and version of a `PackageReference` or `PackageVersion` site,
/// whether the version is an attribute or a child element.
fn package_version<'a>(site: &'a Site<'_>) -> Option<(&'a str, &'a str)> {
    let version = match site.leaf()? {
        Segment::Key(k) | Segment::Element(k) if k == "Version" => site.value,
        _ => return None,
    };
    let owner = site.ancestor(1)?;
    let is_package = owner.segment.is_element("PackageReference")
        || owner.segment.is_element("PackageVersion");
    if !is_package {
        return None;
    }
    let id = owner.field("Include").or_else(|| owner.field("Update"))?;
    Some((id, version))
}

impl PackageVersions {
    /// References in `text` that match `prefixes` and sit below `major`.
    pub fn stale_references(
        file: &str,
        text: &str,
        prefixes: &[String],
        major: u64,
    ) -> Result<Vec<StaleReference>, DocumentError> {
        let doc = XmlDocument::parse(text)?;
        let mut stale = Vec::new();
        doc.visit(&mut |site| {
            let Some((id, version)) = package_version(site) else {
                return;
            };
            if !prefixes.iter().any(|p| id.starts_with(p.as_str())) {
                return;
            }
            match SemVersion::parse(version) {
                Ok(v) if v.major < major => stale.push(StaleReference {
                    file: file.to_string(),
                    package: id.to_string(),
                    version: version.to_string(),
                }),
                Ok(_) => {}
                Err(failure) => debug!(%failure, package = id, "unversioned package reference"),
            }
        });
        Ok(stale)
    }
}

impl Upgrader for PackageVersions {
    fn spec(&self) -> &UpgraderSpec {
        &SPEC
    }

    fn upgrade(
        &self,
        files: &[&str],
        ctx: &mut UpgradeContext<'_>,
        report: &mut CategoryReport,
    ) -> Result<(), BumpError> {
        let config = ctx.config;
        let settings = &config.netbump.packages;
        if !settings.enabled {
            debug!("package step disabled");
            return Ok(());
        }
        let major = ctx.channel.major();

        let mut stale = Vec::new();
        for file in files {
            ctx.cancel.check()?;
            report.files_scanned += 1;
            let found = SourceText::read(&ctx.workspace.path_of(file)).and_then(|source| {
                Self::stale_references(file, &source.text, &settings.prefixes, major)
            });
            match found {
                Ok(found) => stale.extend(found),
                Err(e) => {
                    ctx.diagnose(Outcome::Warning, SPEC.name, Some(file), Stage::Parse, e.to_string());
                    report.record(Outcome::Warning);
                }
            }
        }
        if stale.is_empty() {
            return Ok(());
        }

        let prefixes: BTreeSet<&str> = settings
            .prefixes
            .iter()
            .filter(|p| stale.iter().any(|s| s.package.starts_with(p.as_str())))
            .map(String::as_str)
            .collect();
        let mut args = vec![".".to_string(), "--upgrade".to_string()];
        for prefix in &prefixes {
            args.push("--include".to_string());
            args.push(prefix.to_string());
        }

        if ctx.dry_run {
            ctx.diagnose(
                Outcome::None,
                SPEC.name,
                None,
                Stage::Patch,
                format!(
                    "would run {} {} for {} package references",
                    settings.tool,
                    args.join(" "),
                    stale.len()
                ),
            );
            return Ok(());
        }

        ctx.cancel.check()?;
        let root = ctx.workspace.root();
        match ctx.runner.run(&settings.tool, &args, root, settings.timeout()) {
            Ok(output) if output.success() => {
                info!(tool = %settings.tool, references = stale.len(), "package tool succeeded");
                report.record(Outcome::Success);
                report.changelog = Some(format!(
                    "Updated {} package references to .NET {} packages with {}",
                    stale.len(),
                    ctx.channel,
                    settings.tool
                ));
            }
            Ok(output) => {
                let detail = output.stderr.lines().last().unwrap_or("").trim().to_string();
                let message = match output.exit_code {
                    Some(code) => format!("{} exited with {}: {}", settings.tool, code, detail),
                    None => format!("{} did not finish: {}", settings.tool, detail),
                };
                ctx.diagnose(Outcome::Warning, SPEC.name, None, Stage::Patch, message);
                report.record(Outcome::Warning);
            }
            Err(e) => {
                ctx.diagnose(Outcome::Warning, SPEC.name, None, Stage::Patch, e.to_string());
                report.record(Outcome::Warning);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::Orchestrator;
    use super::*;
    use crate::config::Config;
    use crate::decide::UpgradePolicy;
    use crate::version::UpgradeChannel;
    use crate::workspace::Workspace;

    const PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk.Web">
  <ItemGroup>
    <PackageReference Include="Microsoft.EntityFrameworkCore.SqlServer" Version="6.0.25" />
    <PackageReference Include="Serilog" Version="3.1.1" />
    <PackageReference Include="Microsoft.Extensions.Http">
      <Version>8.0.0</Version>
    </PackageReference>
  </ItemGroup>
</Project>
"#;

    fn prefixes() -> Vec<String> {
        Config::default().netbump.packages.prefixes
    }

    #[test]
    fn finds_stale_prefixed_references() {
        let stale = PackageVersions::stale_references("App.csproj", PROJECT, &prefixes(), 8).unwrap();
        assert_eq!(
            stale,
            vec![StaleReference {
                file: "App.csproj".to_string(),
                package: "Microsoft.EntityFrameworkCore.SqlServer".to_string(),
                version: "6.0.25".to_string(),
            }]
        );
    }

    #[test]
    fn element_versions_are_read() {
        let stale = PackageVersions::stale_references("App.csproj", PROJECT, &prefixes(), 9).unwrap();
        assert_eq!(stale.len(), 2);
        assert_eq!(stale[1].package, "Microsoft.Extensions.Http");
    }

    fn run(dir: &tempfile::TempDir, runner: &FakeRunner, dry_run: bool) -> crate::report::RunReport {
        let ws = Workspace::discover::<&str>(dir.path(), &[]).unwrap();
        let channel = UpgradeChannel::parse("8.0").unwrap();
        let policy = UpgradePolicy::default();
        let config = Config::default();
        let mut ctx =
            UpgradeContext::new(&ws, &channel, &policy, &config, runner).with_dry_run(dry_run);
        Orchestrator::new(vec![Box::new(PackageVersions)])
            .run(&mut ctx)
            .unwrap()
    }

    #[test]
    fn tool_runs_with_matching_prefixes() {
        let dir = workspace(&[("src/App/App.csproj", PROJECT)]);
        let runner = FakeRunner::new(0);
        let report = run(&dir, &runner, false);
        assert_eq!(report.outcome, Outcome::Success);
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "dotnet-outdated");
        assert_eq!(
            calls[0].1,
            vec![".", "--upgrade", "--include", "Microsoft.EntityFrameworkCore"]
        );
        assert_eq!(report.changelog.len(), 1);
    }

    #[test]
    fn tool_failure_is_a_warning() {
        let dir = workspace(&[("App.csproj", PROJECT)]);
        let runner = FakeRunner::new(1);
        let report = run(&dir, &runner, false);
        assert_eq!(report.outcome, Outcome::Warning);
        assert!(report.diagnostics[0].message.contains("exited with 1: restore failed"));
        assert!(report.changelog.is_empty());
    }

    #[test]
    fn dry_run_does_not_invoke_the_tool() {
        let dir = workspace(&[("App.csproj", PROJECT)]);
        let runner = FakeRunner::new(0);
        let report = run(&dir, &runner, true);
        assert!(runner.calls.borrow().is_empty());
        assert_eq!(report.outcome, Outcome::None);
        assert!(report.diagnostics[0].message.starts_with("would run dotnet-outdated"));
    }

    #[test]
    fn current_packages_skip_the_tool() {
        let source = PROJECT.replace("6.0.25", "8.0.1");
        let dir = workspace(&[("App.csproj", source.as_str())]);
        let runner = FakeRunner::new(0);
        let report = run(&dir, &runner, false);
        assert!(runner.calls.borrow().is_empty());
        assert_eq!(report.outcome, Outcome::None);
    }
}
