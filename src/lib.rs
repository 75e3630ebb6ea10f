//! netbump - move a .NET repository to a newer release channel.
//!
//! This crate provides the CLI binary for netbump.
//!
//! ## Modules
//!
//! - `cli` - request handling shared by the binary and integration tests

pub mod cli;

// Re-export core types for convenience
pub use netbump_core::config::Config;
pub use netbump_core::error::{BumpError, OutputErrorCode};
pub use netbump_core::external::{
    CancellationToken, HttpRegistryClient, ProcessRunner, RegistryClient, SystemProcessRunner,
};
pub use netbump_core::report::{emit_response, ErrorResponse, Outcome, RunReport};
pub use netbump_core::upgrade::{Orchestrator, UpgradeContext};
pub use netbump_core::version::UpgradeChannel;
