//! Error types and exit code constants for netbump.
//!
//! This module provides a unified error type (`BumpError`) that bridges
//! domain-specific errors from the subsystems (document I/O, configuration,
//! external tools, registry lookups) into a common format suitable for CLI
//! output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad channel, bad flag combination)
//! - `3`: Discovery errors (workspace missing, unreadable tree)
//! - `4`: Write errors (a patched file could not be persisted)
//! - `5`: Upgrade outcome error (at least one category finished with `Error`)
//! - `10`: Internal errors (bugs, unexpected state)
//! - `130`: Cancelled
//!
//! Version parse failures are not in this hierarchy: they are ordinary values
//! (`ParseFailure`) that callers treat as "not a version of this kind".

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::version::TokenKind;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable numeric codes used as process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// Workspace discovery or read failure.
    DiscoveryError = 3,
    /// Failed to persist a patched file.
    WriteError = 4,
    /// The run completed but a category reported `Error`.
    UpgradeFailed = 5,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
    /// The run was cancelled.
    Cancelled = 130,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Version Parse Failure
// ============================================================================

/// A text did not parse as a version of the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{text}' is not a valid {kind}: {reason}")]
pub struct ParseFailure {
    /// The rejected input.
    pub text: String,
    /// The grammar that was attempted.
    pub kind: TokenKind,
    /// Why the grammar rejected it.
    pub reason: String,
}

impl ParseFailure {
    pub fn new(text: impl Into<String>, kind: TokenKind, reason: impl Into<String>) -> Self {
        ParseFailure {
            text: text.into(),
            kind,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Document Errors
// ============================================================================

/// Failure to read, decode, parse or write a single document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bytes are not valid text in the detected encoding.
    #[error("{path} is not valid {encoding} text")]
    Decode { path: PathBuf, encoding: String },

    /// The text is not a well-formed document of its format.
    #[error("{format} syntax error at {line}:{col}: {message}")]
    Syntax {
        format: &'static str,
        line: u32,
        col: u32,
        message: String,
    },

    /// The file changed on disk between read and write-back.
    #[error("{path} was modified while the upgrade was running")]
    Modified { path: PathBuf },

    /// Persisting the rewritten file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DocumentError {
    /// Whether this error happened during write-back (fatal to the file).
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            DocumentError::Write { .. } | DocumentError::Modified { .. }
        )
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
///
/// Per-file failures never surface here: the orchestrator turns them into
/// diagnostics and keeps going. `BumpError` is reserved for failures that end
/// the whole run.
#[derive(Debug, Error)]
pub enum BumpError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The workspace root does not exist or cannot be walked.
    #[error("workspace error at {path}: {message}")]
    Workspace { path: PathBuf, message: String },

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A document failure that escaped per-file isolation.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// An external tool could not be started.
    #[error("failed to run {program}: {message}")]
    Process { program: String, message: String },

    /// A registry lookup failed in a way that is not "not found".
    #[error("registry lookup for {image}:{tag} failed: {message}")]
    Registry {
        image: String,
        tag: String,
        message: String,
    },

    /// At least one category finished with an `Error` outcome.
    #[error("upgrade finished with errors in: {}", categories.join(", "))]
    UpgradeFailed { categories: Vec<String> },

    /// The run was cancelled at a suspension point.
    #[error("upgrade cancelled")]
    Cancelled,

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl From<&BumpError> for OutputErrorCode {
    fn from(err: &BumpError) -> Self {
        match err {
            BumpError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            BumpError::Config(_) => OutputErrorCode::InvalidArguments,
            BumpError::Workspace { .. } => OutputErrorCode::DiscoveryError,
            BumpError::Document(doc) if doc.is_write_failure() => OutputErrorCode::WriteError,
            BumpError::Document(_) => OutputErrorCode::DiscoveryError,
            BumpError::Process { .. } => OutputErrorCode::InternalError,
            BumpError::Registry { .. } => OutputErrorCode::InternalError,
            BumpError::UpgradeFailed { .. } => OutputErrorCode::UpgradeFailed,
            BumpError::Cancelled => OutputErrorCode::Cancelled,
            BumpError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<BumpError> for OutputErrorCode {
    fn from(err: BumpError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl BumpError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        BumpError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        BumpError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}
