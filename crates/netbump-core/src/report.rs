//! Run reporting: outcome scale, diagnostics, changelog and rendering.

use std::fmt;
use std::io::{self, Write};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::BumpError;
use crate::patch::OutputEdit;

// ============================================================================
// Outcomes
// ============================================================================

/// Ordered severity scale; aggregation takes the maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    None,
    Success,
    Warning,
    Error,
}

impl Outcome {
    /// Max-severity aggregation.
    pub fn combine(self, other: Outcome) -> Outcome {
        self.max(other)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::None => "none",
            Outcome::Success => "success",
            Outcome::Warning => "warning",
            Outcome::Error => "error",
        })
    }
}

/// States of the per-file pipeline, recorded on diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discover,
    Parse,
    Locate,
    Decide,
    NoChange,
    Patch,
    Write,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discover => "discover",
            Stage::Parse => "parse",
            Stage::Locate => "locate",
            Stage::Decide => "decide",
            Stage::NoChange => "nochange",
            Stage::Patch => "patch",
            Stage::Write => "write",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: Outcome,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.level, self.category)?;
        if let Some(file) = &self.file {
            write!(f, " {}", file)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A file the run changed, or would change in a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub edits: Vec<OutputEdit>,
    pub written: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub diff: String,
}

/// Result of one upgrader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub name: String,
    pub outcome: Outcome,
    pub files_scanned: usize,
    pub changes: Vec<FileChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
}

impl CategoryReport {
    pub fn new(name: impl Into<String>) -> Self {
        CategoryReport {
            name: name.into(),
            ..CategoryReport::default()
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.outcome = self.outcome.combine(outcome);
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Everything one run produced. Categories and diagnostics are append-only
/// and kept in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub channel: String,
    pub sdk_version: String,
    pub dry_run: bool,
    pub started_at: String,
    pub outcome: Outcome,
    pub categories: Vec<CategoryReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub changelog: Vec<String>,
}

impl RunReport {
    pub fn new(channel: impl Into<String>, sdk_version: impl Into<String>, dry_run: bool) -> Self {
        let started: DateTime<Utc> = SystemTime::now().into();
        RunReport {
            channel: channel.into(),
            sdk_version: sdk_version.into(),
            dry_run,
            started_at: started.to_rfc3339_opts(SecondsFormat::Secs, true),
            outcome: Outcome::None,
            categories: Vec::new(),
            diagnostics: Vec::new(),
            changelog: Vec::new(),
        }
    }

    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Append a finished category, folding its outcome and changelog line
    /// into the run.
    pub fn finish_category(&mut self, category: CategoryReport) {
        self.outcome = self.outcome.combine(category.outcome);
        if let Some(line) = &category.changelog {
            self.changelog.push(line.clone());
        }
        self.categories.push(category);
    }

    /// Names of categories that finished with `Error`.
    pub fn failed_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| c.outcome == Outcome::Error)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn changed_files(&self) -> impl Iterator<Item = &FileChange> {
        self.categories.iter().flat_map(|c| c.changes.iter())
    }

    /// Human-readable summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let verb = if self.dry_run { "would upgrade" } else { "upgraded" };
        out.push_str(&format!(
            "netbump {} to {} (SDK {}): {}\n",
            verb, self.channel, self.sdk_version, self.outcome
        ));
        for category in &self.categories {
            out.push_str(&format!(
                "  {:<20} {:<8} {} scanned, {} changed\n",
                category.name,
                category.outcome.to_string(),
                category.files_scanned,
                category.changes.len()
            ));
        }
        if !self.changelog.is_empty() {
            out.push_str("\nChangelog:\n");
            for line in &self.changelog {
                out.push_str(&format!("  - {}\n", line));
            }
        }
        if !self.diagnostics.is_empty() {
            out.push_str("\nDiagnostics:\n");
            for diagnostic in &self.diagnostics {
                out.push_str(&format!("  {}\n", diagnostic));
            }
        }
        out
    }

    /// Unified diff of every change, in execution order.
    pub fn render_diff(&self) -> String {
        self.changed_files().map(|c| c.diff.as_str()).collect()
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// JSON shape of a run that ended in a `BumpError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_error(err: &BumpError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            error: ErrorInfo {
                code: err.error_code().code(),
                message: err.to_string(),
            },
        }
    }
}

/// Emit a response as pretty JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}
