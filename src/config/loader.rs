// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::backends::BackendSelection;
use crate::config::consts::{
    DEFAULT_BACKEND, DEFAULT_EVENTS, DEFAULT_OUTPUT_DIR, DEFAULT_RESULTS_FILE, DEFAULT_SENTINEL,
};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Run configuration for one invocation of the scheduler.
///
/// Loaded from YAML, or from TOML when the file has a `.toml` extension.
/// Every field is optional.
///
/// # Fields
/// * `backend` - Backend selector string (`local`, `mix`, `proof`, `grid`, ...)
/// * `workers` - Worker count for the distributed and batch backends
/// * `output_dir` - Directory receiving output files, the stat file and the sentinel
/// * `results_file` - Common file for in-memory output slots
/// * `sentinel` - Name of the zero-byte run-completion file
/// * `max_events` - Optional cap on the events one event loop reads (per worker for distributed and batch runs)
/// * `events` - Size of the synthetic event stream the binary generates
///
/// # Example
/// ```yaml
/// backend: proof
/// workers: 4
/// output_dir: out/run-17
/// max_events: 5000
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub backend: String,
    pub workers: usize,
    pub output_dir: PathBuf,
    pub results_file: String,
    pub sentinel: String,
    pub max_events: Option<u64>,
    pub events: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            workers: default_workers(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            results_file: DEFAULT_RESULTS_FILE.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            max_events: None,
            events: DEFAULT_EVENTS,
        }
    }
}

impl RunConfig {
    /// Resolve the backend selector.
    pub fn selection(&self) -> Result<BackendSelection, ConfigError> {
        BackendSelection::parse(&self.backend)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Load a config from a YAML or TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(cfg)
}

/// Load a config and check that it describes a runnable configuration:
/// the selector names a backend and there is at least one worker.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.selection()?;
    if cfg.workers == 0 {
        return Err(ConfigError::Invalid(
            "workers must be at least 1".to_string(),
        ));
    }
    if cfg.sentinel.trim().is_empty() {
        return Err(ConfigError::Invalid("sentinel name is empty".to_string()));
    }
    Ok(cfg)
}
