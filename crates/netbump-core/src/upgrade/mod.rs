//! The upgrade orchestrator and its registry of per-category upgraders.
//!
//! Every upgrader declares its name, file patterns and priority as data in
//! an [`UpgraderSpec`]. The [`Orchestrator`] orders the registered upgraders
//! by priority then name, selects each one's files from the workspace and
//! runs them one category at a time.
//!
//! Most categories are document rewrites. Those implement [`DocumentRules`]
//! (where in a document a token lives, plus an optional refinement of the
//! replacement) and are run by [`DocumentUpgrader`], which owns the per-file
//! state machine:
//!
//! ```text
//! Discover -> Parse -> Locate -> Decide -> (NoChange | Patch -> Write) -> Report
//! ```
//!
//! A file that fails to read or parse is reported as a warning and skipped.
//! A failed write is an error for that file only. Nothing one file does stops
//! the files after it; only cancellation ends a run early.

use tracing::{debug, error, info, info_span, warn};

use crate::config::Config;
use crate::decide::{Decision, DecisionEngine, UpgradePolicy};
use crate::diff::generate_unified_diff;
use crate::document::SourceText;
use crate::error::{BumpError, DocumentError};
use crate::external::{CancellationToken, DigestCache, ProcessRunner, RegistryClient};
use crate::locate::{
    Candidate, DockerfileDocument, JsonDocument, Locator, Selection, Site, XmlDocument,
    YamlDocument,
};
use crate::patch::{EditSpan, PatchSet};
use crate::report::{CategoryReport, Diagnostic, FileChange, Outcome, RunReport, Stage};
use crate::version::{FormatOptions, UpgradeChannel};
use crate::workspace::{build_glob_set, Workspace};

pub mod aws_lambda;
pub mod azure_pipelines;
pub mod dockerfile;
pub mod github_actions;
pub mod global_json;
pub mod package_versions;
pub mod runtime_identifier;
pub mod target_framework;
pub mod vscode;

pub use aws_lambda::AwsLambda;
pub use azure_pipelines::AzurePipelines;
pub use dockerfile::Dockerfile;
pub use github_actions::GithubActions;
pub use global_json::GlobalJson;
pub use package_versions::PackageVersions;
pub use runtime_identifier::RuntimeIdentifiers;
pub use target_framework::TargetFrameworks;
pub use vscode::VsCode;

/// MSBuild project and property files.
pub(crate) const PROJECT_PATTERNS: &[&str] = &[
    "**/*.csproj",
    "**/*.fsproj",
    "**/*.vbproj",
    "**/*.props",
    "**/*.targets",
];

// ============================================================================
// Registration
// ============================================================================

/// Static description of an upgrader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgraderSpec {
    /// Category name used in reports, diagnostics and `--disable`.
    pub name: &'static str,
    /// Workspace-relative globs selecting the files this upgrader reads.
    pub patterns: &'static [&'static str],
    /// Lower runs first.
    pub priority: u32,
}

/// One file category.
pub trait Upgrader {
    fn spec(&self) -> &UpgraderSpec;

    /// Upgrade `files`, recording results in `report`.
    ///
    /// Per-file failures become diagnostics; an `Err` ends the whole run and
    /// is only returned on cancellation.
    fn upgrade(
        &self,
        files: &[&str],
        ctx: &mut UpgradeContext<'_>,
        report: &mut CategoryReport,
    ) -> Result<(), BumpError>;
}

// ============================================================================
// Context
// ============================================================================

/// Everything an upgrader may consult or mutate during one run.
pub struct UpgradeContext<'a> {
    workspace: &'a Workspace,
    channel: &'a UpgradeChannel,
    policy: &'a UpgradePolicy,
    config: &'a Config,
    runner: &'a dyn ProcessRunner,
    registry: Option<&'a dyn RegistryClient>,
    digests: DigestCache,
    cancel: CancellationToken,
    dry_run: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> UpgradeContext<'a> {
    pub fn new(
        workspace: &'a Workspace,
        channel: &'a UpgradeChannel,
        policy: &'a UpgradePolicy,
        config: &'a Config,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        UpgradeContext {
            workspace,
            channel,
            policy,
            config,
            runner,
            registry: None,
            digests: DigestCache::new(),
            cancel: CancellationToken::new(),
            dry_run: config.netbump.dry_run,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: &'a dyn RegistryClient) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn channel(&self) -> &'a UpgradeChannel {
        self.channel
    }

    /// Record a diagnostic and log it.
    pub fn diagnose(
        &mut self,
        level: Outcome,
        category: &str,
        file: Option<&str>,
        stage: Stage,
        message: impl Into<String>,
    ) {
        let message = message.into();
        match level {
            Outcome::Error => error!(category, file, %stage, "{}", message),
            Outcome::Warning => warn!(category, file, %stage, "{}", message),
            _ => info!(category, file, %stage, "{}", message),
        }
        self.diagnostics.push(Diagnostic {
            level,
            category: category.to_string(),
            file: file.map(str::to_string),
            stage,
            message,
        });
    }
}

// ============================================================================
// Document Upgraders
// ============================================================================

/// Source format of a document, chosen per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Xml,
    Dockerfile,
}

impl DocumentFormat {
    /// Guess the format from a file extension. Unknown extensions are JSON,
    /// which covers `global.json` and `serverless.template`.
    pub fn from_path(path: &str) -> Self {
        let extension = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("yml" | "yaml") => DocumentFormat::Yaml,
            Some("csproj" | "fsproj" | "vbproj" | "props" | "targets" | "xml") => {
                DocumentFormat::Xml
            }
            _ => DocumentFormat::Json,
        }
    }

    pub fn parse<'s>(self, text: &'s str) -> Result<Box<dyn Locator + 's>, DocumentError> {
        let locator: Box<dyn Locator + 's> = match self {
            DocumentFormat::Json => Box::new(JsonDocument::parse(text)?),
            DocumentFormat::Yaml => Box::new(YamlDocument::parse(text)?),
            DocumentFormat::Xml => Box::new(XmlDocument::parse(text)?),
            DocumentFormat::Dockerfile => Box::new(DockerfileDocument::parse(text)),
        };
        Ok(locator)
    }
}

/// What to do with a decided replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    Replace(String),
    /// Leave the token as it is and warn with the given reason.
    Skip(String),
}

/// The document-specific half of an upgrader.
pub trait DocumentRules {
    fn spec(&self) -> &UpgraderSpec;

    fn format_of(&self, path: &str) -> DocumentFormat {
        DocumentFormat::from_path(path)
    }

    /// Whether the category has anything to do for this channel at all.
    fn applies_to(&self, _channel: &UpgradeChannel) -> bool {
        true
    }

    /// Where in a document of `path` a token lives.
    fn select(&self, path: &str, site: &Site<'_>) -> Option<Selection>;

    /// Adjust a decided replacement before it becomes an edit.
    fn refine(
        &self,
        _candidate: &Candidate,
        replacement: String,
        _ctx: &mut UpgradeContext<'_>,
    ) -> Result<Refinement, BumpError> {
        Ok(Refinement::Replace(replacement))
    }

    /// Changelog line for a category that changed at least one file.
    fn changelog(&self, channel: &UpgradeChannel) -> String;
}

/// Runs [`DocumentRules`] through the per-file pipeline.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpgrader<R>(pub R);

impl<R: DocumentRules> Upgrader for DocumentUpgrader<R> {
    fn spec(&self) -> &UpgraderSpec {
        self.0.spec()
    }

    fn upgrade(
        &self,
        files: &[&str],
        ctx: &mut UpgradeContext<'_>,
        report: &mut CategoryReport,
    ) -> Result<(), BumpError> {
        let channel = ctx.channel;
        if !self.0.applies_to(channel) {
            debug!(category = self.0.spec().name, %channel, "category does not apply to channel");
            return Ok(());
        }
        let policy = ctx.policy;
        let mut engine = DecisionEngine::new(channel, policy);
        for file in files {
            let span = info_span!("file", path = *file);
            let _enter = span.enter();
            report.files_scanned += 1;
            let outcome = self.upgrade_file(file, &mut engine, ctx, report)?;
            report.record(outcome);
        }
        if !report.changes.is_empty() {
            report.changelog = Some(self.0.changelog(channel));
        }
        Ok(())
    }
}

impl<R: DocumentRules> DocumentUpgrader<R> {
    fn upgrade_file(
        &self,
        file: &str,
        engine: &mut DecisionEngine<'_>,
        ctx: &mut UpgradeContext<'_>,
        report: &mut CategoryReport,
    ) -> Result<Outcome, BumpError> {
        let category = self.0.spec().name;

        ctx.cancel.check()?;
        let source = match SourceText::read(&ctx.workspace.path_of(file)) {
            Ok(source) => source,
            Err(e) => {
                ctx.diagnose(Outcome::Warning, category, Some(file), Stage::Parse, e.to_string());
                return Ok(Outcome::Warning);
            }
        };
        let locator = match self.0.format_of(file).parse(&source.text) {
            Ok(locator) => locator,
            Err(e) => {
                ctx.diagnose(Outcome::Warning, category, Some(file), Stage::Parse, e.to_string());
                return Ok(Outcome::Warning);
            }
        };

        let predicate = |site: &Site<'_>| self.0.select(file, site);
        let candidates = locator.find_candidates(&predicate);
        debug!(format = locator.format(), count = candidates.len(), "located");
        if candidates.is_empty() {
            return Ok(Outcome::None);
        }

        let options = FormatOptions {
            newline: source.metadata.newline.as_str(),
        };
        let mut outcome = Outcome::None;
        let mut edits = Vec::new();
        for candidate in &candidates {
            match engine.decide(&candidate.token, &options) {
                Decision::Unchanged => {}
                Decision::Unsupported => {
                    outcome = outcome.combine(Outcome::Warning);
                    if engine.note_unsupported() {
                        let message = engine
                            .policy()
                            .explain(candidate.token.kind(), engine.channel());
                        ctx.diagnose(Outcome::Warning, category, Some(file), Stage::Decide, message);
                    }
                }
                Decision::Replace(text) => match self.0.refine(candidate, text, ctx)? {
                    Refinement::Replace(text) => edits.push(EditSpan::new(candidate.span, text)),
                    Refinement::Skip(reason) => {
                        outcome = outcome.combine(Outcome::Warning);
                        ctx.diagnose(Outcome::Warning, category, Some(file), Stage::Decide, reason);
                    }
                },
            }
        }
        if edits.is_empty() {
            debug!("no change");
            return Ok(outcome);
        }

        let patch = PatchSet::from_unordered(edits);
        let new_text = patch.apply(&source.text);
        let mut change = FileChange {
            path: file.to_string(),
            edits: patch.materialize(file, &source.text),
            written: false,
            diff: generate_unified_diff(file, &source.text, &patch),
        };

        if ctx.dry_run {
            info!(edits = patch.edit_count(), "would patch");
            report.changes.push(change);
            return Ok(outcome.combine(Outcome::Success));
        }
        match source.write_back(&new_text) {
            Ok(()) => {
                info!(edits = patch.edit_count(), "patched");
                change.written = true;
                report.changes.push(change);
                Ok(outcome.combine(Outcome::Success))
            }
            Err(e) => {
                ctx.diagnose(Outcome::Error, category, Some(file), Stage::Write, e.to_string());
                Ok(Outcome::Error)
            }
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Ordered registry of upgraders for one run.
pub struct Orchestrator {
    upgraders: Vec<Box<dyn Upgrader>>,
}

impl Orchestrator {
    /// Register `upgraders`, ordered by priority then name.
    pub fn new(mut upgraders: Vec<Box<dyn Upgrader>>) -> Self {
        upgraders.sort_by_key(|u| (u.spec().priority, u.spec().name));
        Orchestrator { upgraders }
    }

    /// Every built-in upgrader.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Box::new(DocumentUpgrader(GlobalJson::default())),
            Box::new(DocumentUpgrader(TargetFrameworks::default())),
            Box::new(DocumentUpgrader(RuntimeIdentifiers::default())),
            Box::new(DocumentUpgrader(GithubActions::default())),
            Box::new(DocumentUpgrader(AzurePipelines::default())),
            Box::new(DocumentUpgrader(Dockerfile::default())),
            Box::new(DocumentUpgrader(AwsLambda::default())),
            Box::new(DocumentUpgrader(VsCode::default())),
            Box::new(PackageVersions::default()),
        ])
    }

    pub fn specs(&self) -> impl Iterator<Item = &UpgraderSpec> {
        self.upgraders.iter().map(|u| u.spec())
    }

    /// Run every enabled upgrader in order.
    pub fn run(&self, ctx: &mut UpgradeContext<'_>) -> Result<RunReport, BumpError> {
        let channel = ctx.channel;
        let workspace = ctx.workspace;
        let mut report = RunReport::new(
            channel.to_string(),
            channel.sdk_version().to_string(),
            ctx.dry_run,
        );
        info!(
            %channel,
            sdk = %channel.sdk_version(),
            files = workspace.files().len(),
            dry_run = ctx.dry_run,
            "starting upgrade"
        );

        for upgrader in &self.upgraders {
            let spec = upgrader.spec();
            if ctx.config.is_disabled(spec.name) {
                debug!(category = spec.name, "disabled");
                continue;
            }
            ctx.cancel.check()?;

            let patterns = build_glob_set(spec.patterns)?;
            let files = workspace.matching(&patterns);
            let span = info_span!("category", name = spec.name);
            let _enter = span.enter();

            let mut category = CategoryReport::new(spec.name);
            upgrader.upgrade(&files, ctx, &mut category)?;
            debug!(outcome = %category.outcome, changed = category.changes.len(), "category done");
            report.finish_category(category);
        }

        report.diagnostics = std::mem::take(&mut ctx.diagnostics);
        info!(outcome = %report.outcome, "upgrade finished");
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes and a temp-dir harness shared by the upgrader tests.

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::external::ProcessOutput;

    /// Records invocations and answers with a fixed exit code.
    pub struct FakeRunner {
        pub exit_code: i32,
        pub calls: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl FakeRunner {
        pub fn new(exit_code: i32) -> Self {
            FakeRunner {
                exit_code,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(
            &self,
            program: &str,
            args: &[String],
            _cwd: &Path,
            _timeout: Duration,
        ) -> Result<ProcessOutput, BumpError> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec()));
            Ok(ProcessOutput {
                exit_code: Some(self.exit_code),
                stdout: String::new(),
                stderr: if self.exit_code == 0 {
                    String::new()
                } else {
                    "restore failed".to_string()
                },
                timed_out: false,
            })
        }
    }

    /// Answers digest lookups from a fixed table.
    #[derive(Default)]
    pub struct FakeRegistry {
        pub digests: HashMap<String, String>,
        pub lookups: RefCell<usize>,
    }

    impl RegistryClient for FakeRegistry {
        fn resolve_digest(&self, image: &str, tag: &str) -> Result<Option<String>, BumpError> {
            *self.lookups.borrow_mut() += 1;
            Ok(self.digests.get(&format!("{}:{}", image, tag)).cloned())
        }
    }

    pub fn workspace(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    pub fn read(dir: &TempDir, path: &str) -> String {
        fs::read_to_string(dir.path().join(path)).unwrap()
    }

    /// Run one upgrader against `dir` for `channel`.
    pub fn run_one(upgrader: Box<dyn Upgrader>, dir: &TempDir, channel: &str) -> RunReport {
        let registry = FakeRegistry::default();
        run_with(upgrader, dir, &UpgradeChannel::parse(channel).unwrap(), &registry, false)
    }

    pub fn run_with(
        upgrader: Box<dyn Upgrader>,
        dir: &TempDir,
        channel: &UpgradeChannel,
        registry: &FakeRegistry,
        dry_run: bool,
    ) -> RunReport {
        let ws = Workspace::discover::<&str>(dir.path(), &[]).unwrap();
        let policy = UpgradePolicy::default();
        let config = Config::default();
        let runner = FakeRunner::new(0);
        let mut ctx = UpgradeContext::new(&ws, channel, &policy, &config, &runner)
            .with_registry(registry)
            .with_dry_run(dry_run);
        Orchestrator::new(vec![upgrader]).run(&mut ctx).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    mod registry {
        use super::*;

        #[test]
        fn defaults_are_ordered_by_priority() {
            let names: Vec<_> = Orchestrator::with_defaults().specs().map(|s| s.name).collect();
            assert_eq!(
                names,
                vec![
                    "global-json",
                    "target-framework",
                    "runtime-identifier",
                    "github-actions",
                    "azure-pipelines",
                    "dockerfile",
                    "aws-lambda",
                    "vscode",
                    "package-versions",
                ]
            );
        }

        #[test]
        fn format_follows_extension() {
            assert_eq!(DocumentFormat::from_path("a/b.yml"), DocumentFormat::Yaml);
            assert_eq!(DocumentFormat::from_path("App.csproj"), DocumentFormat::Xml);
            assert_eq!(DocumentFormat::from_path("serverless.template"), DocumentFormat::Json);
        }
    }

    mod pipeline {
        use super::*;

        #[test]
        fn parse_failure_is_warning_and_later_files_continue() {
            let dir = workspace(&[
                ("a/global.json", "{ \"sdk\": { \"version\": "),
                ("b/global.json", "{ \"sdk\": { \"version\": \"6.0.100\" } }"),
            ]);
            let report = run_one(Box::new(DocumentUpgrader(GlobalJson::default())), &dir, "8.0");
            assert_eq!(report.outcome, Outcome::Warning);
            assert_eq!(report.categories[0].files_scanned, 2);
            assert_eq!(report.categories[0].changes.len(), 1);
            assert_eq!(report.diagnostics.len(), 1);
            assert_eq!(report.diagnostics[0].stage, Stage::Parse);
            assert_eq!(report.diagnostics[0].file.as_deref(), Some("a/global.json"));
            assert!(read(&dir, "b/global.json").contains("\"8.0.100\""));
        }

        #[test]
        fn dry_run_reports_without_writing() {
            let original = "{ \"sdk\": { \"version\": \"6.0.100\" } }";
            let dir = workspace(&[("global.json", original)]);
            let registry = FakeRegistry::default();
            let channel = UpgradeChannel::parse("8.0").unwrap();
            let report = run_with(
                Box::new(DocumentUpgrader(GlobalJson::default())),
                &dir,
                &channel,
                &registry,
                true,
            );
            assert_eq!(read(&dir, "global.json"), original);
            let change = &report.categories[0].changes[0];
            assert!(!change.written);
            assert_eq!(change.edits[0].new_text, "8.0.100");
            assert!(report.render_diff().contains("+{ \"sdk\": { \"version\": \"8.0.100\" } }"));
        }

        #[test]
        fn no_change_means_no_changelog() {
            let dir = workspace(&[("global.json", "{ \"sdk\": { \"version\": \"8.0.204\" } }")]);
            let report = run_one(Box::new(DocumentUpgrader(GlobalJson::default())), &dir, "8.0");
            assert_eq!(report.outcome, Outcome::None);
            assert!(report.changelog.is_empty());
            assert!(report.categories[0].changelog.is_none());
        }

        #[test]
        fn cancelled_run_stops() {
            let dir = workspace(&[("global.json", "{ \"sdk\": { \"version\": \"6.0.100\" } }")]);
            let ws = Workspace::discover::<&str>(dir.path(), &[]).unwrap();
            let channel = UpgradeChannel::parse("8.0").unwrap();
            let policy = UpgradePolicy::default();
            let config = Config::default();
            let runner = FakeRunner::new(0);
            let cancel = CancellationToken::new();
            cancel.cancel();
            let mut ctx = UpgradeContext::new(&ws, &channel, &policy, &config, &runner)
                .with_cancellation(cancel);
            let err = Orchestrator::with_defaults().run(&mut ctx).unwrap_err();
            assert!(matches!(err, BumpError::Cancelled));
            assert!(read(&dir, "global.json").contains("6.0.100"));
        }

        #[test]
        fn disabled_category_is_skipped() {
            let dir = workspace(&[("global.json", "{ \"sdk\": { \"version\": \"6.0.100\" } }")]);
            let ws = Workspace::discover::<&str>(dir.path(), &[]).unwrap();
            let channel = UpgradeChannel::parse("8.0").unwrap();
            let policy = UpgradePolicy::default();
            let mut config = Config::default();
            config.netbump.disabled.push("global-json".to_string());
            let runner = FakeRunner::new(0);
            let mut ctx = UpgradeContext::new(&ws, &channel, &policy, &config, &runner);
            let report = Orchestrator::new(vec![Box::new(DocumentUpgrader(GlobalJson::default()))])
                .run(&mut ctx)
                .unwrap();
            assert!(report.categories.is_empty());
            assert!(read(&dir, "global.json").contains("6.0.100"));
        }

        #[test]
        fn second_run_is_a_no_op() {
            let dir = workspace(&[("global.json", "{ \"sdk\": { \"version\": \"6.0.100\" } }")]);
            let first = run_one(Box::new(DocumentUpgrader(GlobalJson::default())), &dir, "8.0");
            assert_eq!(first.outcome, Outcome::Success);
            let second = run_one(Box::new(DocumentUpgrader(GlobalJson::default())), &dir, "8.0");
            assert_eq!(second.outcome, Outcome::None);
        }
    }
}
