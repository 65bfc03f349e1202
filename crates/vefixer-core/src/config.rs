use std::collections::{BTreeSet, HashMap};
use std::env;
use std::time::Duration;

use vefixer_domain::TwinProjectConvention;

use crate::target::TargetManager;

/// Directory names never worth descending into.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".tox",
    ".nox",
    "build",
    "dist",
    "target",
    ".cache",
];

pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds (got '{value}')")]
    InvalidTimeout { key: &'static str, value: String },
    #[error("{key} must be a positive byte count (got '{value}')")]
    InvalidCaptureLimit { key: &'static str, value: String },
    #[error("twin projects must look like LEFT=RIGHT (got '{value}')")]
    InvalidTwinPair { value: String },
}

#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Program names for the external tools a migration shells out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPrograms {
    pub mise: String,
    pub poetry: String,
    pub remove: String,
    pub rename: String,
}

impl Default for ToolPrograms {
    fn default() -> Self {
        Self {
            mise: "mise".into(),
            poetry: "poetry".into(),
            remove: "rm".into(),
            rename: "mv".into(),
        }
    }
}

impl ToolPrograms {
    fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, fallback: String| {
            snapshot
                .var(key)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map_or(fallback, ToOwned::to_owned)
        };
        Self {
            mise: pick("VEFIXER_MISE", defaults.mise),
            poetry: pick("VEFIXER_POETRY", defaults.poetry),
            remove: defaults.remove,
            rename: defaults.rename,
        }
    }
}

/// Settings for one run. Built by the CLI, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub ignore: BTreeSet<String>,
    pub target: TargetManager,
    pub dry_run: bool,
    pub debug: bool,
    pub twin_projects: TwinProjectConvention,
    pub command_timeout: Option<Duration>,
    pub max_capture_bytes: usize,
    pub tools: ToolPrograms,
}

impl MigrationConfig {
    #[must_use]
    pub fn new(target: TargetManager) -> Self {
        Self {
            ignore: DEFAULT_IGNORES.iter().map(ToString::to_string).collect(),
            target,
            dry_run: false,
            debug: false,
            twin_projects: TwinProjectConvention::default(),
            command_timeout: None,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            tools: ToolPrograms::default(),
        }
    }

    /// Defaults overlaid with `VEFIXER_*` variables from the process environment.
    pub fn from_env(target: TargetManager) -> Result<Self, ConfigError> {
        Self::from_snapshot(&EnvSnapshot::capture(), target)
    }

    pub fn from_snapshot(snapshot: &EnvSnapshot, target: TargetManager) -> Result<Self, ConfigError> {
        let mut config = Self::new(target);
        config.tools = ToolPrograms::from_snapshot(snapshot);
        if let Some(raw) = snapshot.var("VEFIXER_COMMAND_TIMEOUT") {
            config.command_timeout = parse_timeout("VEFIXER_COMMAND_TIMEOUT", raw)?;
        }
        if let Some(raw) = snapshot.var("VEFIXER_MAX_CAPTURE_BYTES") {
            config.max_capture_bytes = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| ConfigError::InvalidCaptureLimit {
                    key: "VEFIXER_MAX_CAPTURE_BYTES",
                    value: raw.to_string(),
                })?;
        }
        Ok(config)
    }
}

/// `0` disables the timeout.
pub fn parse_timeout(key: &'static str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let seconds = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidTimeout {
            key,
            value: raw.to_string(),
        })?;
    Ok((seconds > 0).then(|| Duration::from_secs(seconds)))
}

pub fn parse_twin_pair(raw: &str) -> Result<(String, String), ConfigError> {
    let invalid = || ConfigError::InvalidTwinPair {
        value: raw.to_string(),
    };
    let (left, right) = raw.split_once('=').ok_or_else(invalid)?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() || left == right || right.contains('=') {
        return Err(invalid());
    }
    Ok((left.to_string(), right.to_string()))
}
