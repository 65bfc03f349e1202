#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Read-only filesystem logic: finding virtual environments and working out
//! what they were built from.

pub mod discovery;
pub mod requirements;
pub mod version;

pub use discovery::{find_environments, DiscoveryIssue, EnvironmentCandidate, EnvironmentWalker};
pub use requirements::{
    find_requirements, resolve_dependency_source, search_in, DependencySource,
    TwinProjectConvention, REQUIREMENTS_FILE,
};
pub use version::{extract_version, PythonVersion};
