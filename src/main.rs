//! Binary entry point for the netbump CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Move the repository in the current directory to .NET 8
//! netbump upgrade --channel 8.0 --sdk-version 8.0.204
//!
//! # Preview the edits as a unified diff without writing anything
//! netbump upgrade --channel 8.0 --dry-run --format diff
//!
//! # Show the registered upgraders and the files they look at
//! netbump list
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use netbump::cli::{check_report, list_upgraders, load_config, run_upgrade, UpgradeRequest};
use netbump::{
    emit_response, BumpError, CancellationToken, Config, ErrorResponse, HttpRegistryClient,
    RegistryClient, RunReport, SystemProcessRunner,
};

// ============================================================================
// CLI Structure
// ============================================================================

/// Version-aware upgrades for .NET repositories.
///
/// netbump rewrites the version tokens a repository pins (target frameworks,
/// SDK versions, CI setup steps, container images, runtime identifiers) to a
/// newer release channel, touching nothing but the tokens themselves.
#[derive(Parser, Debug)]
#[command(name = "netbump", version, about = "Version-aware upgrades for .NET repositories")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Workspace root directory (default: current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Output format for the upgrade command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary with changelog and diagnostics (default).
    #[default]
    Text,
    /// Full run report as JSON.
    Json,
    /// Unified diff of every changed file.
    Diff,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upgrade the workspace to a release channel.
    Upgrade {
        /// Target channel, e.g. `8.0`.
        #[arg(long)]
        channel: String,

        /// Full SDK version for the channel (default: `MAJOR.MINOR.100`).
        #[arg(long)]
        sdk_version: Option<String>,

        /// Release kind of the channel: preview, lts or standard.
        #[arg(long)]
        release_kind: Option<String>,

        /// Support phase of the channel: preview, go-live, active, maintenance or eol.
        #[arg(long)]
        support_phase: Option<String>,

        /// Compute and report edits without writing files.
        #[arg(long)]
        dry_run: bool,

        /// Skip an upgrader by name (repeatable).
        #[arg(long = "disable", value_name = "UPGRADER")]
        disable: Vec<String>,

        /// Do not run the external package upgrade tool.
        #[arg(long)]
        no_packages: bool,

        /// Do not contact container registries.
        #[arg(long)]
        offline: bool,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List the registered upgraders in run order.
    List,
}

impl Command {
    fn wants_json(&self) -> bool {
        matches!(
            self,
            Command::Upgrade {
                format: OutputFormat::Json,
                ..
            } | Command::List
        )
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_format);

    let json_errors = cli.command.wants_json();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.error_code();
            if json_errors {
                let _ = emit_response(&ErrorResponse::from_error(&err), &mut io::stdout());
                let _ = io::stdout().flush();
            } else {
                eprintln!("netbump: {}", err);
            }
            ExitCode::from(code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), BumpError> {
    let workspace = match cli.global.workspace {
        Some(path) => path,
        None => std::env::current_dir()
            .map_err(|e| BumpError::internal(format!("no current directory: {}", e)))?,
    };
    match cli.command {
        Command::Upgrade {
            channel,
            sdk_version,
            release_kind,
            support_phase,
            dry_run,
            disable,
            no_packages,
            offline,
            format,
        } => {
            let request = UpgradeRequest {
                workspace,
                channel,
                sdk_version,
                release_kind,
                support_phase,
                dry_run,
                disable,
                no_packages,
                offline,
            };
            execute_upgrade(&request, format)
        }
        Command::List => execute_list(&workspace),
    }
}

// ============================================================================
// Command Executors
// ============================================================================

fn execute_upgrade(request: &UpgradeRequest, format: OutputFormat) -> Result<(), BumpError> {
    let config = load_config(request)?;
    let registry = HttpRegistryClient::new(config.netbump.registry.timeout());
    let registry: Option<&dyn RegistryClient> = if config.netbump.registry.enabled {
        Some(&registry)
    } else {
        None
    };

    let report = run_upgrade(
        request,
        &config,
        &SystemProcessRunner,
        registry,
        CancellationToken::new(),
    )?;
    emit_report(&report, format)?;
    check_report(&report)
}

fn execute_list(workspace: &std::path::Path) -> Result<(), BumpError> {
    let config = Config::load_from_project(workspace)?;
    emit_response(&list_upgraders(&config), &mut io::stdout())
        .map_err(|e| BumpError::internal(e.to_string()))?;
    let _ = io::stdout().flush();
    Ok(())
}

fn emit_report(report: &RunReport, format: OutputFormat) -> Result<(), BumpError> {
    let mut stdout = io::stdout();
    let written = match format {
        OutputFormat::Json => emit_response(report, &mut stdout),
        OutputFormat::Text => stdout.write_all(report.render_text().as_bytes()),
        OutputFormat::Diff => stdout.write_all(report.render_diff().as_bytes()),
    };
    written
        .and_then(|()| stdout.flush())
        .map_err(|e| BumpError::internal(format!("failed to write output: {}", e)))
}
