//! Core engine for netbump.
//!
//! This crate moves the version tokens of a .NET source tree to a newer
//! release channel without disturbing anything around them:
//! - Version model for monikers, SDK versions, RIDs, managed runtimes,
//!   floating channel expressions and image tags
//! - Locators that find token sites in YAML, JSON, XML and Dockerfiles with
//!   exact source spans
//! - Upgrade decisions under a support policy
//! - Format-preserving patches and atomic write-back
//! - The orchestrator and its built-in upgraders
//! - External collaborators: tool runner, registry client, digest cache
//! - Run reports, configuration and workspace discovery

pub mod config;
pub mod decide;
pub mod diff;
pub mod document;
pub mod error;
pub mod external;
pub mod locate;
pub mod patch;
pub mod report;
pub mod text;
pub mod upgrade;
pub mod version;
pub mod workspace;
