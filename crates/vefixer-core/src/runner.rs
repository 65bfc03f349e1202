//! The only place vefixer touches the outside world beyond reading the
//! filesystem.
//!
//! Every command carries the directory it runs in, so the process-wide
//! working directory is never changed. Dry runs swap in [`SimulatedRunner`],
//! which reports intent and hands back placeholder output without executing
//! anything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use vefixer_domain::PythonVersion;

use crate::cancel::CancelToken;
use crate::config::MigrationConfig;
use crate::process::{run_command, RunLimits};
use crate::target::ImplementedTarget;

/// Stand-in output for a command that succeeded without printing anything.
pub const SUCCESS_SENTINEL: &str = "ok";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPurpose {
    /// Ask the manager where the interpreter for `version` lives. `current` is
    /// the interpreter the environment uses today.
    LocateInterpreter {
        target: ImplementedTarget,
        version: PythonVersion,
        current: PathBuf,
    },
    RemoveEnvironment,
    CreateEnvironment,
    LockInstall,
    RequirementsInstall,
    RenameConfig,
}

impl CommandPurpose {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LocateInterpreter { .. } => "locate-interpreter",
            Self::RemoveEnvironment => "remove-environment",
            Self::CreateEnvironment => "create-environment",
            Self::LockInstall => "lock-install",
            Self::RequirementsInstall => "requirements-install",
            Self::RenameConfig => "rename-config",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub purpose: CommandPurpose,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I, cwd: PathBuf, purpose: CommandPurpose) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd,
            purpose,
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("`{command}` exited with status {code}")]
    Failed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
    #[error("failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },
}

impl CommandError {
    /// Captured (stdout, stderr) when the command ran to a non-zero exit.
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::Failed { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub trait CommandRunner {
    /// Runs `invocation`, returning its trimmed stdout or
    /// [`SUCCESS_SENTINEL`] when it printed nothing.
    fn run(&self, invocation: &Invocation) -> Result<String, CommandError>;
}

/// Executes commands for real.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    max_capture_bytes: usize,
    debug: bool,
    cancel: CancelToken,
}

impl SystemRunner {
    #[must_use]
    pub fn new(config: &MigrationConfig, cancel: CancelToken) -> Self {
        Self {
            timeout: config.command_timeout,
            max_capture_bytes: config.max_capture_bytes,
            debug: config.debug,
            cancel,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let command = invocation.command_line();
        tracing::trace!(
            purpose = invocation.purpose.label(),
            cwd = %invocation.cwd.display(),
            %command,
            "running command"
        );
        let limits = RunLimits {
            timeout: self.timeout,
            max_capture_bytes: self.max_capture_bytes,
            cancel: &self.cancel,
        };
        let output = run_command(&invocation.program, &invocation.args, &invocation.cwd, &limits)
            .map_err(|err| CommandError::Spawn {
                command: command.clone(),
                message: format!("{err:#}"),
            })?;

        if output.cancelled {
            return Err(CommandError::Cancelled { command });
        }
        if output.timed_out {
            return Err(CommandError::TimedOut {
                command,
                timeout: self.timeout.unwrap_or_default(),
            });
        }
        if output.code != 0 {
            if self.debug {
                tracing::warn!(
                    %command,
                    code = output.code,
                    stdout = %output.stdout.trim(),
                    stderr = %output.stderr.trim(),
                    "command failed"
                );
            } else {
                tracing::debug!(%command, code = output.code, stderr = %output.stderr.trim(), "command failed");
            }
            return Err(CommandError::Failed {
                command,
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        tracing::trace!(%command, stdout = %output.stdout.trim(), "command succeeded");
        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            Ok(SUCCESS_SENTINEL.to_string())
        } else {
            Ok(stdout.to_string())
        }
    }
}

/// Dry-run stand-in: logs what would run and returns placeholder output so
/// the orchestrator takes the same branches it would take for real.
#[derive(Debug, Clone)]
pub struct SimulatedRunner {
    data_dir: PathBuf,
}

impl SimulatedRunner {
    #[must_use]
    pub fn new() -> Self {
        let data_dir = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::with_data_dir(data_dir)
    }

    #[must_use]
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn synthesize_interpreter(
        &self,
        target: ImplementedTarget,
        version: &PythonVersion,
        current: &Path,
    ) -> PathBuf {
        if target.owns(current) {
            return current.to_path_buf();
        }
        let mut path = self.data_dir.clone();
        path.extend(target.install_segments());
        path.push(version.as_str());
        path.push("bin");
        path.push("python");
        path
    }
}

impl Default for SimulatedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SimulatedRunner {
    fn run(&self, invocation: &Invocation) -> Result<String, CommandError> {
        tracing::info!(
            cwd = %invocation.cwd.display(),
            "dry-run: would run `{}`",
            invocation.command_line()
        );
        match &invocation.purpose {
            CommandPurpose::LocateInterpreter {
                target,
                version,
                current,
            } => Ok(self
                .synthesize_interpreter(*target, version, current)
                .display()
                .to_string()),
            _ => Ok(SUCCESS_SENTINEL.to_string()),
        }
    }
}
