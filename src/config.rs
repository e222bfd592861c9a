// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf, time::Duration};

/// Root configuration loaded from `vizexec.yaml`.
///
/// This file controls:
/// - Where namespaces (scripts + artifacts) are stored
/// - Which Python / R binaries run user code
/// - Execution limits (timeout, captured output, code size)
/// - Server address and retention sweep
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: Storage,

    /// Interpreter binaries (python / Rscript)
    pub runtime: Runtime,

    pub execution: Execution,

    /// Environment variables injected into every child process
    ///
    /// Example:
    /// MPLCONFIGDIR, R_LIBS_USER
    pub env: BTreeMap<String, String>,

    pub server: Server,

    pub retention: Retention,
}

/// Storage section.
///
/// storage:
///   dir: visualizations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Root directory holding one sub-directory per namespace.
    pub dir: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("visualizations"),
        }
    }
}

/// Runtime binary configuration.
///
/// runtime:
///   python: python3
///   r: Rscript
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Runtime {
    pub python: String,
    pub r: String,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            r: "Rscript".to_string(),
        }
    }
}

/// Execution limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Execution {
    /// Wall-clock limit for one child process. The child is killed when exceeded.
    pub timeout_secs: u64,

    /// Cap per captured stream (stdout, stderr).
    pub max_output_bytes: usize,

    /// Largest accepted `code` payload.
    pub max_code_bytes: usize,
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_output_bytes: 64 * 1024,
            max_code_bytes: 256 * 1024,
        }
    }
}

impl Execution {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    pub addr: String,

    /// Permissive CORS for a browser front end on another origin.
    pub cors: bool,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
            cors: true,
        }
    }
}

/// Namespace retention.
///
/// retention:
///   max_age_hours: 72        # omit to keep namespaces forever
///   sweep_interval_secs: 3600
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retention {
    pub max_age_hours: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            max_age_hours: None,
            sweep_interval_secs: 3600,
        }
    }
}

impl Config {
    /// Load and parse `vizexec.yaml` from disk.
    ///
    /// A missing file is not an error when `allow_missing` is set (the default
    /// config path); defaults are used instead. Environment overrides are
    /// applied last.
    pub fn load(path: &Path, allow_missing: bool) -> Result<Self> {
        let mut cfg = if allow_missing && !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        } else {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            Self::parse(&raw)?
        };

        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(raw).context("Failed to parse YAML config")
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("VIZEXEC_ADDR") {
            self.server.addr = v;
        }
        if let Ok(v) = std::env::var("VIZEXEC_STORAGE_DIR") {
            self.storage.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VIZEXEC_PYTHON") {
            self.runtime.python = v;
        }
        if let Ok(v) = std::env::var("VIZEXEC_RSCRIPT") {
            self.runtime.r = v;
        }
        if let Ok(v) = std::env::var("VIZEXEC_TIMEOUT_SECS") {
            self.execution.timeout_secs = v
                .parse()
                .with_context(|| format!("VIZEXEC_TIMEOUT_SECS is not a number: {v}"))?;
        }
        Ok(())
    }
}
