use std::path::PathBuf;

use serde::Serialize;

use vefixer_domain::{EnvironmentCandidate, PythonVersion};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Probing,
    Decision,
    Rebuilding,
    Reinstalling,
    Renaming,
}

/// How dependencies were restored after the rebuild.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reinstall {
    Lockfile { path: PathBuf },
    Requirements { path: PathBuf },
    NoStrategy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Disposition {
    Migrated {
        interpreter: PathBuf,
        reinstall: Reinstall,
        renamed_config: bool,
    },
    /// Already running on the target manager's interpreter.
    Skipped { interpreter: PathBuf },
    Unsupported { target: String },
    Aborted {
        state: MigrationState,
        reason: String,
    },
    Cancelled { state: MigrationState },
}

impl Disposition {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Aborted { .. } | Self::Cancelled { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Migrated { .. } => "migrated",
            Self::Skipped { .. } => "skipped",
            Self::Unsupported { .. } => "unsupported",
            Self::Aborted { .. } => "aborted",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Migrated {
                reinstall,
                renamed_config,
                ..
            } => {
                let mut text = match reinstall {
                    Reinstall::Lockfile { .. } => "rebuilt; lockfile dependencies installed".to_string(),
                    Reinstall::Requirements { path } => {
                        format!("rebuilt; installed {}", path.display())
                    }
                    Reinstall::NoStrategy => "rebuilt; no way to reinstall dependencies".to_string(),
                };
                if *renamed_config {
                    text.push_str("; config renamed");
                }
                text
            }
            Self::Skipped { .. } => "already on target interpreter".to_string(),
            Self::Unsupported { target } => format!("target {target} is not yet supported"),
            Self::Aborted { state, reason } => format!("aborted while {}: {reason}", state_verb(*state)),
            Self::Cancelled { state } => format!("cancelled while {}", state_verb(*state)),
        }
    }
}

fn state_verb(state: MigrationState) -> &'static str {
    match state {
        MigrationState::Probing => "probing",
        MigrationState::Decision => "deciding",
        MigrationState::Rebuilding => "rebuilding",
        MigrationState::Reinstalling => "reinstalling",
        MigrationState::Renaming => "renaming",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnvironmentReport {
    pub root: PathBuf,
    pub interpreter: PathBuf,
    pub version: Option<PythonVersion>,
    pub disposition: Disposition,
    /// Output of the failing command; only kept in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CapturedOutput>,
}

impl EnvironmentReport {
    pub(crate) fn new(candidate: &EnvironmentCandidate, disposition: Disposition) -> Self {
        Self {
            root: candidate.root.clone(),
            interpreter: candidate.interpreter.clone(),
            version: None,
            disposition,
            output: None,
        }
    }
}
