#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Side-effecting half of vefixer: running the toolchain manager and
//! migrating discovered environments.

pub mod cancel;
pub mod config;
pub mod migration;
pub mod outcome;
pub mod process;
pub mod runner;
pub mod target;

pub use cancel::CancelToken;
pub use config::{
    parse_twin_pair, ConfigError, EnvSnapshot, MigrationConfig, ToolPrograms, DEFAULT_IGNORES,
};
pub use migration::{
    migrate_all, migrate_environment, CapturedOutput, Disposition, EnvironmentReport,
    MigrationCounts, MigrationState, MigrationSummary, Reinstall,
};
pub use outcome::{CommandStatus, ExecutionOutcome};
pub use process::RunOutput;
pub use runner::{
    CommandError, CommandPurpose, CommandRunner, Invocation, SimulatedRunner, SystemRunner,
    SUCCESS_SENTINEL,
};
pub use target::{ImplementedTarget, TargetManager, TargetSupport};

pub use vefixer_domain::{EnvironmentCandidate, PythonVersion, TwinProjectConvention};
