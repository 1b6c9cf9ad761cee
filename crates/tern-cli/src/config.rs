//! The user configuration: cache locations and registry list.
//!
//! The core never reads this file; the CLI loads it, fills in defaults,
//! and hands plain values down. Stored as YAML under the user config
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tern_core::{RegistryConfig, RegistryKind};

use crate::error::{CliError, Result};

fn default_autosync() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Read-only package cache roots searched after the project's
    /// `.packages`.
    #[serde(default)]
    pub package_cache_paths: Vec<PathBuf>,
    /// Registry clone roots; the first receives new clones.
    #[serde(default)]
    pub registry_cache_paths: Vec<PathBuf>,
    /// Configured registries; empty means the default registry.
    #[serde(default)]
    pub registries: Vec<RegistryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<String>,
    /// Sync registries before commands that read them.
    #[serde(default = "default_autosync")]
    pub autosync: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            package_cache_paths: Vec::new(),
            registry_cache_paths: Vec::new(),
            registries: Vec::new(),
            sdk_version: None,
            autosync: true,
        }
    }
}

impl Config {
    /// `<config-dir>/tern/config.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tern/config.yaml")
    }

    /// Load the configuration, filling empty cache path lists with the
    /// defaults under the user cache directory. A missing file is the
    /// default configuration.
    pub fn load(path: &Path) -> Result<Config> {
        let mut config = if path.is_file() {
            let content = fs::read_to_string(path)?;
            serde_yaml::from_str(&content).map_err(|e| {
                CliError::user(format!("Invalid configuration '{}': {e}", path.display()))
            })?
        } else {
            Config::default()
        };

        let cache_root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("tern");
        if config.package_cache_paths.is_empty() {
            config.package_cache_paths = vec![cache_root.join("packages")];
        }
        if config.registry_cache_paths.is_empty() {
            config.registry_cache_paths = vec![cache_root.join("registries")];
        }
        Ok(config)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)
            .map_err(|e| CliError::user(format!("Cannot serialize configuration: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The configured registries, or the default public registry when
    /// none are configured.
    pub fn registry_configs_or_default(&self) -> Vec<RegistryConfig> {
        if !self.registries.is_empty() {
            return self.registries.clone();
        }
        vec![RegistryConfig {
            name: "tern".to_string(),
            kind: RegistryKind::Git,
            path: "github.com/tern-pkg/registry".to_string(),
        }]
    }
}
