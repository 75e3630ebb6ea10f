//! CLI front door.
//!
//! Turns parsed command-line options into an [`UpgradeRequest`], builds the
//! target channel and configuration, and drives the orchestrator. The binary
//! owns argument parsing and output; everything here returns
//! `Result<T, BumpError>` so integration tests can call it with fake
//! collaborators.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use netbump_core::config::Config;
use netbump_core::decide::UpgradePolicy;
use netbump_core::error::BumpError;
use netbump_core::external::{CancellationToken, ProcessRunner, RegistryClient};
use netbump_core::report::RunReport;
use netbump_core::upgrade::{Orchestrator, UpgradeContext};
use netbump_core::version::{ReleaseKind, SemVersion, SupportPhase, UpgradeChannel};
use netbump_core::workspace::Workspace;

/// One invocation of `netbump upgrade`.
#[derive(Debug, Clone, Default)]
pub struct UpgradeRequest {
    pub workspace: PathBuf,
    /// Target channel, `MAJOR.MINOR`.
    pub channel: String,
    /// Full SDK version for the channel (defaults to `MAJOR.MINOR.100`).
    pub sdk_version: Option<String>,
    pub release_kind: Option<String>,
    pub support_phase: Option<String>,
    pub dry_run: bool,
    /// Upgraders to skip in addition to the configured ones.
    pub disable: Vec<String>,
    /// Skip the external package upgrade tool.
    pub no_packages: bool,
    /// Skip registry digest lookups.
    pub offline: bool,
}

/// Build the run's target channel from its textual parts.
pub fn build_channel(
    channel: &str,
    sdk_version: Option<&str>,
    release_kind: Option<&str>,
    support_phase: Option<&str>,
) -> Result<UpgradeChannel, BumpError> {
    let mut target = UpgradeChannel::parse(channel)?;
    if let Some(sdk) = sdk_version {
        let sdk = SemVersion::parse(sdk).map_err(|e| BumpError::invalid_args(e.to_string()))?;
        target = target.with_sdk_version(sdk)?;
    }
    let kind = match release_kind {
        Some(kind) => kind.parse::<ReleaseKind>()?,
        None => target.release_kind(),
    };
    let phase = match support_phase {
        Some(phase) => phase.parse::<SupportPhase>()?,
        None => target.support_phase(),
    };
    Ok(target.with_release(kind, phase))
}

/// Load `.netbump/config.toml` and fold the request's overrides into it.
pub fn load_config(request: &UpgradeRequest) -> Result<Config, BumpError> {
    let mut config = Config::load_from_project(&request.workspace)?;
    if request.dry_run {
        config.netbump.dry_run = true;
    }
    if request.no_packages {
        config.netbump.packages.enabled = false;
    }
    if request.offline {
        config.netbump.registry.enabled = false;
    }
    for name in &request.disable {
        if !config.is_disabled(name) {
            config.netbump.disabled.push(name.clone());
        }
    }
    let known: Vec<&str> = Orchestrator::with_defaults().specs().map(|s| s.name).collect();
    if let Some(unknown) = config
        .netbump
        .disabled
        .iter()
        .find(|name| !known.contains(&name.as_str()))
    {
        return Err(BumpError::invalid_args(format!(
            "unknown upgrader '{}' (known: {})",
            unknown,
            known.join(", ")
        )));
    }
    Ok(config)
}

/// Run every enabled upgrader over the request's workspace.
///
/// Per-file problems come back as diagnostics in the report; only run-wide
/// failures are errors.
pub fn run_upgrade(
    request: &UpgradeRequest,
    config: &Config,
    runner: &dyn ProcessRunner,
    registry: Option<&dyn RegistryClient>,
    cancel: CancellationToken,
) -> Result<RunReport, BumpError> {
    let channel = build_channel(
        &request.channel,
        request.sdk_version.as_deref(),
        request.release_kind.as_deref(),
        request.support_phase.as_deref(),
    )?;
    let workspace = Workspace::discover(&request.workspace, &config.netbump.exclude)?;
    debug!(root = %workspace.root().display(), files = workspace.files().len(), "workspace discovered");

    let policy = UpgradePolicy::default();
    let mut ctx = UpgradeContext::new(&workspace, &channel, &policy, config, runner)
        .with_cancellation(cancel);
    if let Some(registry) = registry.filter(|_| config.netbump.registry.enabled) {
        ctx = ctx.with_registry(registry);
    }
    Orchestrator::with_defaults().run(&mut ctx)
}

/// `Err(UpgradeFailed)` when any category ended in error.
pub fn check_report(report: &RunReport) -> Result<(), BumpError> {
    let categories = report.failed_categories();
    if categories.is_empty() {
        Ok(())
    } else {
        Err(BumpError::UpgradeFailed { categories })
    }
}

/// Registered upgrader, as listed by `netbump list`.
#[derive(Debug, Clone, Serialize)]
pub struct UpgraderInfo {
    pub name: String,
    pub priority: u32,
    pub patterns: Vec<String>,
    pub enabled: bool,
}

/// Every built-in upgrader in run order.
pub fn list_upgraders(config: &Config) -> Vec<UpgraderInfo> {
    Orchestrator::with_defaults()
        .specs()
        .map(|spec| UpgraderInfo {
            name: spec.name.to_string(),
            priority: spec.priority,
            patterns: spec.patterns.iter().map(|p| p.to_string()).collect(),
            enabled: !config.is_disabled(spec.name),
        })
        .collect()
}
