// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for k8scache
//!
//! Stores user preferences in a config file.
//! All k8scache data is stored under ~/.k8scache/:
//! - ~/.k8scache/config.json - user configuration
//! - ~/.k8scache/log/ - log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{CopyPolicy, Tenant};

/// Get the base k8scache directory (~/.k8scache/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".k8scache"))
        .context("Could not determine home directory")
}

fn default_field_indices() -> Vec<String> {
    vec!["metadata.name".to_string(), "status.phase".to_string()]
}

/// k8scache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Copy policy for readers built by the CLI
    #[serde(default)]
    pub copy_policy: CopyPolicy,

    /// Tenant applied to requests that do not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_tenant: Option<Tenant>,

    /// Field paths indexed when loading a snapshot
    #[serde(default = "default_field_indices")]
    pub field_indices: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            copy_policy: CopyPolicy::default(),
            default_tenant: None,
            field_indices: default_field_indices(),
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from a specific file, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Write config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.k8scache/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }
}
