use std::fmt;
use std::path::{Component, Path};

use serde::Serialize;

/// Toolchain managers an environment can be migrated to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetManager {
    Mise,
    Pyenv,
    Rtx,
}

impl TargetManager {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mise => "mise",
            Self::Pyenv => "pyenv",
            Self::Rtx => "rtx",
        }
    }

    pub fn support(self) -> TargetSupport {
        match self {
            Self::Mise => TargetSupport::Implemented(ImplementedTarget::Mise),
            Self::Pyenv | Self::Rtx => TargetSupport::Unsupported(self.as_str()),
        }
    }
}

impl fmt::Display for TargetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSupport {
    Implemented(ImplementedTarget),
    /// Recognised but without a migration path yet.
    Unsupported(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImplementedTarget {
    Mise,
}

impl ImplementedTarget {
    pub fn name(self) -> &'static str {
        match self {
            Self::Mise => "mise",
        }
    }

    /// Lock file whose presence selects the lockfile installer.
    pub fn lock_marker(self) -> &'static str {
        match self {
            Self::Mise => "poetry.lock",
        }
    }

    /// Legacy configuration file renamed on migration, and its new name.
    pub fn config_rename(self) -> (&'static str, &'static str) {
        match self {
            Self::Mise => (".rtx.toml", ".mise.toml"),
        }
    }

    /// Consecutive path segments marking the manager's interpreter installs.
    pub fn install_segments(self) -> &'static [&'static str] {
        match self {
            Self::Mise => &["mise", "installs", "python"],
        }
    }

    /// Whether `path` lives under this manager's install tree. Compares whole
    /// path segments rather than substrings.
    pub fn owns(self, path: &Path) -> bool {
        let segments = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>();
        let marker = self.install_segments();
        segments.windows(marker.len()).any(|window| window == marker)
    }
}
