//! Per-environment migration state machine.
//!
//! `Probing -> Decision -> {Skip | Rebuilding -> Reinstalling -> Renaming}`.
//! Any failure ends the current environment only; the run carries on with
//! the next candidate.

mod state;
mod summary;


use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use vefixer_domain::{
    extract_version, find_environments, resolve_dependency_source, DependencySource,
    EnvironmentCandidate, PythonVersion,
};

use crate::cancel::CancelToken;
use crate::config::MigrationConfig;
use crate::runner::{CommandError, CommandPurpose, CommandRunner, Invocation};
use crate::target::{ImplementedTarget, TargetSupport};

pub use state::{CapturedOutput, Disposition, EnvironmentReport, MigrationState, Reinstall};
pub use summary::{MigrationCounts, MigrationSummary};

const LOCATE_INTERPRETER_SCRIPT: &str = "import sys; print(sys.executable)";

/// Walks `roots` and migrates every environment found, one at a time.
pub fn migrate_all<I, P>(
    roots: I,
    config: &MigrationConfig,
    runner: &dyn CommandRunner,
    cancel: &CancelToken,
) -> MigrationSummary
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut walker = find_environments(roots, &config.ignore);
    let mut environments = Vec::new();
    for candidate in walker.by_ref() {
        if cancel.is_cancelled() {
            tracing::warn!(root = %candidate.root.display(), "cancelled before migrating");
            break;
        }
        let report = migrate_environment(&candidate, config, runner, cancel);
        log_report(&report);
        let stop = matches!(report.disposition, Disposition::Cancelled { .. });
        environments.push(report);
        if stop {
            break;
        }
    }
    MigrationSummary {
        target: config.target,
        dry_run: config.dry_run,
        cancelled: cancel.is_cancelled(),
        environments,
        discovery_issues: walker.issues().iter().map(ToString::to_string).collect(),
    }
}

pub fn migrate_environment(
    candidate: &EnvironmentCandidate,
    config: &MigrationConfig,
    runner: &dyn CommandRunner,
    cancel: &CancelToken,
) -> EnvironmentReport {
    let migration = Migration {
        candidate,
        config,
        runner,
        cancel,
    };
    let mut report = EnvironmentReport::new(candidate, Disposition::Cancelled {
        state: MigrationState::Probing,
    });
    match migration.drive(&mut report) {
        Ok(disposition) => report.disposition = disposition,
        Err(Halt::Aborted {
            state,
            reason,
            output,
        }) => {
            report.disposition = Disposition::Aborted { state, reason };
            report.output = output;
        }
        Err(Halt::Cancelled { state }) => report.disposition = Disposition::Cancelled { state },
    }
    report
}

fn log_report(report: &EnvironmentReport) {
    let root = report.root.display();
    let summary = report.disposition.summary();
    match &report.disposition {
        Disposition::Migrated { .. } | Disposition::Skipped { .. } => {
            tracing::info!(root = %root, "{summary}");
        }
        Disposition::Unsupported { .. }
        | Disposition::Aborted { .. }
        | Disposition::Cancelled { .. } => {
            tracing::warn!(root = %root, "{summary}");
        }
    }
}

enum Halt {
    Aborted {
        state: MigrationState,
        reason: String,
        output: Option<CapturedOutput>,
    },
    Cancelled {
        state: MigrationState,
    },
}

impl Halt {
    fn abort(state: MigrationState, reason: impl Into<String>) -> Self {
        Self::Aborted {
            state,
            reason: reason.into(),
            output: None,
        }
    }
}

struct Migration<'a> {
    candidate: &'a EnvironmentCandidate,
    config: &'a MigrationConfig,
    runner: &'a dyn CommandRunner,
    cancel: &'a CancelToken,
}

impl Migration<'_> {
    fn drive(&self, report: &mut EnvironmentReport) -> Result<Disposition, Halt> {
        // Probing
        self.checkpoint(MigrationState::Probing)?;
        let version = extract_version(&self.candidate.interpreter).ok_or_else(|| {
            Halt::abort(
                MigrationState::Probing,
                format!(
                    "cannot determine the Python version of {}",
                    self.candidate.interpreter.display()
                ),
            )
        })?;
        report.version = Some(version.clone());
        let target = match self.config.target.support() {
            TargetSupport::Implemented(target) => target,
            TargetSupport::Unsupported(name) => {
                return Ok(Disposition::Unsupported {
                    target: name.to_string(),
                })
            }
        };
        let project_dir = self.project_dir()?;
        let names = snapshot_names(&project_dir).map_err(|err| {
            Halt::abort(
                MigrationState::Probing,
                format!("cannot list {}: {err}", project_dir.display()),
            )
        })?;
        let interpreter = self.locate_interpreter(target, &version, &project_dir)?;

        // Decision
        self.checkpoint(MigrationState::Decision)?;
        if same_file(&self.candidate.interpreter, &interpreter) {
            return Ok(Disposition::Skipped { interpreter });
        }

        // Rebuilding
        self.checkpoint(MigrationState::Rebuilding)?;
        let root = self.candidate.root.display().to_string();
        self.run(
            MigrationState::Rebuilding,
            Invocation::new(
                &self.config.tools.remove,
                ["-rf", root.as_str()],
                project_dir.clone(),
                CommandPurpose::RemoveEnvironment,
            ),
        )?;
        self.run(
            MigrationState::Rebuilding,
            Invocation::new(
                &self.config.tools.mise,
                exec_args(&version, ["-m", "venv", root.as_str()]),
                project_dir.clone(),
                CommandPurpose::CreateEnvironment,
            ),
        )?;

        // Reinstalling
        self.checkpoint(MigrationState::Reinstalling)?;
        let source = resolve_dependency_source(
            &project_dir,
            &names,
            target.lock_marker(),
            &self.config.twin_projects,
        );
        let reinstall = match source {
            Some(DependencySource::Lockfile(path)) => {
                self.run(
                    MigrationState::Reinstalling,
                    Invocation::new(
                        &self.config.tools.poetry,
                        ["install"],
                        project_dir.clone(),
                        CommandPurpose::LockInstall,
                    ),
                )?;
                Reinstall::Lockfile { path }
            }
            Some(DependencySource::Requirements(path)) => {
                let python = self.candidate.root.join("bin").join("python");
                let file = path.display().to_string();
                self.run(
                    MigrationState::Reinstalling,
                    Invocation::new(
                        &python.display().to_string(),
                        ["-m", "pip", "install", "-r", file.as_str()],
                        project_dir.clone(),
                        CommandPurpose::RequirementsInstall,
                    ),
                )?;
                Reinstall::Requirements { path }
            }
            None => {
                tracing::info!(
                    project = %project_dir.display(),
                    "no lockfile or requirements found; dependencies not reinstalled"
                );
                return Ok(Disposition::Migrated {
                    interpreter,
                    reinstall: Reinstall::NoStrategy,
                    renamed_config: false,
                });
            }
        };

        // Renaming
        self.checkpoint(MigrationState::Renaming)?;
        let (legacy, current) = target.config_rename();
        let renamed_config = names.contains(legacy);
        if renamed_config {
            self.run(
                MigrationState::Renaming,
                Invocation::new(
                    &self.config.tools.rename,
                    [legacy, current],
                    project_dir.clone(),
                    CommandPurpose::RenameConfig,
                ),
            )?;
        }

        Ok(Disposition::Migrated {
            interpreter,
            reinstall,
            renamed_config,
        })
    }

    fn checkpoint(&self, state: MigrationState) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled { state });
        }
        tracing::debug!(root = %self.candidate.root.display(), ?state, "entering state");
        Ok(())
    }

    fn project_dir(&self) -> Result<PathBuf, Halt> {
        self.candidate
            .project_dir()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                Halt::abort(
                    MigrationState::Probing,
                    format!("{} has no parent directory", self.candidate.root.display()),
                )
            })
    }

    fn locate_interpreter(
        &self,
        target: ImplementedTarget,
        version: &PythonVersion,
        project_dir: &Path,
    ) -> Result<PathBuf, Halt> {
        let invocation = Invocation::new(
            &self.config.tools.mise,
            exec_args(version, ["-c", LOCATE_INTERPRETER_SCRIPT]),
            project_dir.to_path_buf(),
            CommandPurpose::LocateInterpreter {
                target,
                version: version.clone(),
                current: self.candidate.interpreter.clone(),
            },
        );
        let missing = |detail: &dyn std::fmt::Display| {
            format!(
                "no {} interpreter for Python {version}: {detail}",
                target.name()
            )
        };
        let stdout = match self.runner.run(&invocation) {
            Ok(stdout) => stdout,
            Err(err) if err.is_cancelled() => {
                return Err(Halt::Cancelled {
                    state: MigrationState::Probing,
                })
            }
            Err(err) => return Err(self.command_halt(MigrationState::Probing, missing(&err), &err)),
        };
        // The manager may print notices before the interpreter's own output.
        let located = stdout
            .lines()
            .map(str::trim)
            .rev()
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.is_absolute())
            .ok_or_else(|| {
                Halt::abort(
                    MigrationState::Probing,
                    missing(&format!("unexpected output {stdout:?}")),
                )
            })?;
        tracing::debug!(
            version = %version,
            interpreter = %located.display(),
            "located target interpreter"
        );
        Ok(located)
    }

    fn run(&self, state: MigrationState, invocation: Invocation) -> Result<String, Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled { state });
        }
        self.runner.run(&invocation).map_err(|err| {
            if err.is_cancelled() {
                Halt::Cancelled { state }
            } else {
                self.command_halt(state, err.to_string(), &err)
            }
        })
    }

    fn command_halt(&self, state: MigrationState, reason: String, err: &CommandError) -> Halt {
        let output = if self.config.debug {
            err.captured_output().map(|(stdout, stderr)| CapturedOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            })
        } else {
            None
        };
        Halt::Aborted {
            state,
            reason,
            output,
        }
    }
}

fn exec_args<'a>(
    version: &PythonVersion,
    python_args: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut args = vec![
        "exec".to_string(),
        format!("python@{version}"),
        "--".to_string(),
        "python".to_string(),
    ];
    args.extend(python_args.into_iter().map(ToString::to_string));
    args
}

/// File names present in `dir`, taken before the environment is rebuilt.
fn snapshot_names(dir: &Path) -> std::io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        if let Some(name) = entry?.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

/// Whether two paths name the same underlying file. Paths that cannot be
/// inspected never match.
#[cfg(unix)]
fn same_file(left: &Path, right: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(left), fs::metadata(right)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
