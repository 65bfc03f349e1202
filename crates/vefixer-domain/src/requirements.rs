//! Locating the manifest that describes what an environment needs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub const REQUIREMENTS_FILE: &str = "requirements.txt";
const DOCKER_DIR: &str = "docker";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum DependencySource {
    /// Lock file of a lockfile-based manager, sitting in the project directory.
    Lockfile(PathBuf),
    Requirements(PathBuf),
}

/// Pairs of top-level directory names whose projects mirror each other, so a
/// project under one may keep its requirements in the twin under the other.
///
/// Only the project's immediate parent is considered: `/x/administrator/proj`
/// maps to `/x/eng-tools/proj` and nothing deeper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwinProjectConvention {
    pairs: Vec<(String, String)>,
}

impl Default for TwinProjectConvention {
    fn default() -> Self {
        Self::new([("administrator", "eng-tools")])
    }
}

impl TwinProjectConvention {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(left, right)| (left.into(), right.into()))
                .collect(),
        }
    }

    pub fn disabled() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Name that mirrors `name` under the convention, in either direction.
    pub fn twin_of(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find_map(|(left, right)| {
            if left == name {
                Some(right.as_str())
            } else if right == name {
                Some(left.as_str())
            } else {
                None
            }
        })
    }

    fn twin_project(&self, project_dir: &Path) -> Option<PathBuf> {
        let project_name = project_dir.file_name()?;
        let parent = project_dir.parent()?;
        let twin = self.twin_of(parent.file_name()?.to_str()?)?;
        Some(parent.parent()?.join(twin).join(project_name))
    }
}

/// `requirements.txt` directly in `dir`, else whatever a `docker/`
/// subdirectory holds.
pub fn search_in(dir: &Path) -> Option<PathBuf> {
    let direct = dir.join(REQUIREMENTS_FILE);
    if direct.is_file() {
        return Some(direct);
    }
    let docker = dir.join(DOCKER_DIR);
    if docker.is_dir() {
        return search_in(&docker);
    }
    None
}

pub fn find_requirements(
    project_dir: &Path,
    convention: &TwinProjectConvention,
) -> Option<PathBuf> {
    if let Some(found) = search_in(project_dir) {
        return Some(found);
    }
    let twin = convention.twin_project(project_dir)?;
    tracing::debug!(
        project = %project_dir.display(),
        twin = %twin.display(),
        "searching twin project for requirements"
    );
    search_in(&twin)
}

/// Lock file first, then a requirements listing. `names` is the snapshot of
/// file names taken from `project_dir` before the environment was rebuilt.
pub fn resolve_dependency_source(
    project_dir: &Path,
    names: &BTreeSet<String>,
    lock_marker: &str,
    convention: &TwinProjectConvention,
) -> Option<DependencySource> {
    if names.contains(lock_marker) {
        return Some(DependencySource::Lockfile(project_dir.join(lock_marker)));
    }
    find_requirements(project_dir, convention).map(DependencySource::Requirements)
}
