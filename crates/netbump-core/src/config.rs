//! Configuration handling for netbump

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::BumpError;

/// Directory under the workspace root holding netbump settings.
pub const CONFIG_DIR: &str = ".netbump";

/// netbump configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub netbump: BumpConfig,
}

/// Core netbump settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BumpConfig {
    /// Report edits without writing files
    #[serde(default)]
    pub dry_run: bool,

    /// Extra glob patterns (relative to the workspace root) to skip
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Upgraders that never run
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Package upgrade tool step
    #[serde(default)]
    pub packages: PackageConfig,

    /// Container registry lookups
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Package upgrade step configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Run the external package upgrade tool
    #[serde(default = "default_packages_enabled")]
    pub enabled: bool,

    /// Tool executable, resolved on PATH
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Package id prefixes that follow the platform version
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Seconds before the tool is killed
    #[serde(default = "default_package_timeout")]
    pub timeout_secs: u64,
}

/// Registry lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Resolve pinned image digests
    #[serde(default = "default_registry_enabled")]
    pub enabled: bool,

    /// Seconds per registry request
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

fn default_packages_enabled() -> bool {
    true
}

fn default_tool() -> String {
    "dotnet-outdated".to_string()
}

fn default_prefixes() -> Vec<String> {
    vec![
        "Microsoft.AspNetCore.".to_string(),
        "Microsoft.EntityFrameworkCore".to_string(),
        "Microsoft.Extensions.".to_string(),
    ]
}

fn default_package_timeout() -> u64 {
    300
}

fn default_registry_enabled() -> bool {
    true
}

fn default_registry_timeout() -> u64 {
    10
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            enabled: default_packages_enabled(),
            tool: default_tool(),
            prefixes: default_prefixes(),
            timeout_secs: default_package_timeout(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: default_registry_enabled(),
            timeout_secs: default_registry_timeout(),
        }
    }
}

impl PackageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, BumpError> {
        let content = fs::read_to_string(path)
            .map_err(|e| BumpError::Config(format!("failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| BumpError::Config(format!("failed to parse config file: {}", e)))
    }

    /// Load configuration from .netbump/config.toml in the given workspace root
    pub fn load_from_project(project_root: &Path) -> Result<Self, BumpError> {
        let config_path = project_root.join(CONFIG_DIR).join("config.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Whether the named upgrader is switched off.
    pub fn is_disabled(&self, upgrader: &str) -> bool {
        self.netbump.disabled.iter().any(|d| d == upgrader)
    }
}
