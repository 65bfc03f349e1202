//! Recursive discovery of virtual environments.
//!
//! An environment is recognised solely by a symlink at `<root>/bin/python`
//! inside a real `bin` directory. The walk never follows symlinked
//! directories, so aliased paths and link cycles cannot produce duplicates.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnvironmentCandidate {
    /// Absolute environment directory (the parent of `bin/`).
    pub root: PathBuf,
    /// `<root>/bin/python`, unresolved.
    pub interpreter_link: PathBuf,
    /// Where the link points once every hop is resolved. A dangling link is
    /// resolved lexically.
    pub interpreter: PathBuf,
}

impl EnvironmentCandidate {
    /// Directory holding the environment; dependency manifests live here.
    pub fn project_dir(&self) -> Option<&Path> {
        self.root.parent()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryIssue {
    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("cannot resolve interpreter link {}: {source}", .path.display())]
    UnresolvableLink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DiscoveryIssue {
    pub fn path(&self) -> &Path {
        match self {
            Self::Unreadable { path, .. } | Self::UnresolvableLink { path, .. } => path,
        }
    }
}

/// Starts a walk over `roots`, skipping any directory whose name is in
/// `ignore` along with its subtree.
pub fn find_environments<I, P>(roots: I, ignore: &BTreeSet<String>) -> EnvironmentWalker
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let roots = roots
        .into_iter()
        .map(|root| absolutize(root.as_ref()))
        .collect::<Vec<_>>();
    EnvironmentWalker {
        roots: roots.into_iter(),
        current: None,
        ignore: ignore.clone(),
        issues: Vec::new(),
    }
}

/// Pull-based walk, one `walkdir` traversal per root in the order given.
/// Finite and one-shot: once it returns `None` it is exhausted for good.
#[derive(Debug)]
pub struct EnvironmentWalker {
    roots: std::vec::IntoIter<PathBuf>,
    current: Option<walkdir::IntoIter>,
    ignore: BTreeSet<String>,
    issues: Vec<DiscoveryIssue>,
}

enum Step {
    Continue,
    Prune,
    Found { root: PathBuf, link: PathBuf },
}

impl EnvironmentWalker {
    /// Problems met so far; each one was skipped.
    pub fn issues(&self) -> &[DiscoveryIssue] {
        &self.issues
    }

    fn record(&mut self, issue: DiscoveryIssue) {
        tracing::warn!(path = %issue.path().display(), "{issue}");
        self.issues.push(issue);
    }

    fn classify(&self, entry: &DirEntry) -> Step {
        // Symlinked directories report as links here and are never entered.
        if !entry.file_type().is_dir() {
            return Step::Continue;
        }
        let dir = entry.path();
        let ignored = entry
            .file_name()
            .to_str()
            .is_some_and(|name| self.ignore.contains(name));
        if entry.depth() > 0 && ignored {
            tracing::trace!(path = %dir.display(), "ignoring directory");
            return Step::Prune;
        }

        let bin = dir.join("bin");
        if is_real_dir(&bin) && is_symlink(&bin.join("python")) {
            return Step::Found {
                root: dir.to_path_buf(),
                link: bin.join("python"),
            };
        }
        if entry.depth() == 0 && entry.file_name() == "bin" && is_symlink(&dir.join("python")) {
            if let Some(root) = dir.parent() {
                return Step::Found {
                    root: root.to_path_buf(),
                    link: dir.join("python"),
                };
            }
        }
        Step::Continue
    }

    fn skip_current_dir(&mut self) {
        if let Some(walk) = self.current.as_mut() {
            walk.skip_current_dir();
        }
    }

    fn candidate(&mut self, root: PathBuf, link: PathBuf) -> Option<EnvironmentCandidate> {
        match resolve_link(&link) {
            Ok(interpreter) => {
                tracing::debug!(
                    root = %root.display(),
                    interpreter = %interpreter.display(),
                    "found environment"
                );
                Some(EnvironmentCandidate {
                    root,
                    interpreter_link: link,
                    interpreter,
                })
            }
            Err(source) => {
                self.record(DiscoveryIssue::UnresolvableLink { path: link, source });
                None
            }
        }
    }
}

impl Iterator for EnvironmentWalker {
    type Item = EnvironmentCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let root = self.roots.next()?;
                self.current = Some(WalkDir::new(root).follow_links(false).into_iter());
            }
            let Some(walk) = self.current.as_mut() else {
                continue;
            };
            let entry = match walk.next() {
                Some(Ok(entry)) => entry,
                Some(Err(source)) => {
                    let path = source.path().map(Path::to_path_buf).unwrap_or_default();
                    self.record(DiscoveryIssue::Unreadable { path, source });
                    continue;
                }
                None => {
                    self.current = None;
                    continue;
                }
            };
            match self.classify(&entry) {
                Step::Continue => {}
                Step::Prune => self.skip_current_dir(),
                Step::Found { root, link } => {
                    self.skip_current_dir();
                    if let Some(candidate) = self.candidate(root, link) {
                        return Some(candidate);
                    }
                }
            }
        }
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}

fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_dir())
}

fn resolve_link(link: &Path) -> io::Result<PathBuf> {
    match fs::canonicalize(link) {
        Ok(resolved) => Ok(resolved),
        Err(_) => {
            let target = fs::read_link(link)?;
            let base = link.parent().unwrap_or_else(|| Path::new("/"));
            Ok(normalize_lexically(&base.join(target)))
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path)
        .map(|abs| normalize_lexically(&abs))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
