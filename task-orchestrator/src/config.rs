//! Configuration loading.
//!
//! One YAML file covers every tunable: store endpoint, scoring weights,
//! batch bounds, recovery windows, and optional overrides for the registry
//! directory and knowledge module index. Every section has working
//! defaults, so a missing file means a fully default configuration rather
//! than an error. `TASK_STORE_URL` overrides the endpoint for local runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::BatchConfig;
use crate::recovery::RecoveryConfig;
use crate::scoring::ScoreWeights;

/// Task store endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    /// Per-request timeout for the HTTP client
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7171".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub store: StoreConfig,
    pub weights: ScoreWeights,
    pub batch: BatchConfig,
    pub recovery: RecoveryConfig,
    /// Registry cache directory; platform data dir when unset
    pub registry_dir: Option<PathBuf>,
    /// Knowledge module index file; built-in table when unset
    pub modules_file: Option<PathBuf>,
}

impl OrchestratorConfig {
    /// Load from a YAML file, or fall back to defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("TASK_STORE_URL") {
            if !url.is_empty() {
                config.store.base_url = url;
            }
        }
        Ok(config)
    }
}
