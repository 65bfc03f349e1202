use std::fmt;
use std::path::{Component, Path};

use serde::Serialize;

/// Interpreter version as encoded in a toolchain manager's install path
/// (`MAJOR.MINOR` or `MAJOR.MINOR.PATCH`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PythonVersion(String);

impl PythonVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let parts = raw.split('.').collect::<Vec<_>>();
        if !(2..=3).contains(&parts.len()) {
            return None;
        }
        let numeric = |part: &&str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if parts.iter().all(numeric) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the component that directly follows a literal `python` segment,
/// provided it is a version (`.../python/3.10.7/bin/python3.10`).
pub fn extract_version(path: &Path) -> Option<PythonVersion> {
    let segments = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>();
    segments
        .windows(2)
        .find(|pair| pair[0] == "python" && PythonVersion::parse(pair[1]).is_some())
        .and_then(|pair| PythonVersion::parse(pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extracts_version_following_python_segment() {
        let path = PathBuf::from("/home/dev/.local/share/mise/installs/python/3.11.2/bin/python");
        assert_eq!(
            extract_version(&path).as_ref().map(PythonVersion::as_str),
            Some("3.11.2")
        );
    }

    #[test]
    fn accepts_major_minor_versions() {
        let path = PathBuf::from("/opt/rtx/installs/python/3.12/bin/python3.12");
        assert_eq!(
            extract_version(&path).map(|v| v.to_string()),
            Some("3.12".to_string())
        );
    }

    #[test]
    fn missing_version_segment_yields_none() {
        let path = PathBuf::from("/opt/tools/python/bin/python");
        assert!(extract_version(&path).is_none());
    }

    #[test]
    fn version_must_directly_follow_python() {
        let path = PathBuf::from("/home/dev/.pyenv/versions/3.10.7/bin/python3.10");
        assert!(extract_version(&path).is_none());
    }

    #[test]
    fn later_python_segment_can_carry_the_version() {
        let path = PathBuf::from("/srv/python/latest/python/3.9.18/bin/python");
        assert_eq!(extract_version(&path).map(|v| v.to_string()), Some("3.9.18".into()));
    }

    #[test]
    fn parse_rejects_malformed_versions() {
        for raw in ["3", "3.", ".3", "3.11.2.1", "3.11-dev", "v3.11", "3..1", ""] {
            assert!(PythonVersion::parse(raw).is_none(), "{raw:?} should be rejected");
        }
        assert!(PythonVersion::parse("3.11").is_some());
        assert!(PythonVersion::parse("3.11.2").is_some());
    }
}
