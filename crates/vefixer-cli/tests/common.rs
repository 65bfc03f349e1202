#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::{symlink, PermissionsExt},
    path::{Path, PathBuf},
};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const FAKE_MISE: &str = r#"#!/bin/sh
echo "mise $*" >> "$VEFIXER_TEST_LOG"
version="${2#python@}"
shift 4
install="$VEFIXER_TEST_MISE_ROOT/installs/python/$version/bin/python"
if [ ! -x "$install" ]; then
    echo "mise: python@$version is not installed" >&2
    exit 1
fi
case "$1" in
    -c) echo "$install" ;;
    -m) mkdir -p "$3/bin" && ln -sf "$install" "$3/bin/python" ;;
esac
"#;

const FAKE_POETRY: &str = r#"#!/bin/sh
echo "poetry $* in $(pwd)" >> "$VEFIXER_TEST_LOG"
"#;

const FAKE_PYTHON: &str = r#"#!/bin/sh
echo "python $*" >> "$VEFIXER_TEST_LOG"
"#;

/// A scratch tree with fake `mise`/`poetry` tools and two interpreter
/// installs: an old `rtx` one and the `mise` one environments move to.
pub struct Sandbox {
    _temp: TempDir,
    pub root: PathBuf,
}

impl Sandbox {
    pub fn new(prefix: &str) -> Self {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonical tempdir");
        let sandbox = Self { _temp: temp, root };
        sandbox.write_script("tools/mise", FAKE_MISE);
        sandbox.write_script("tools/poetry", FAKE_POETRY);
        sandbox
    }

    pub fn work(&self) -> PathBuf {
        self.root.join("work")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("commands.log")
    }

    pub fn log(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap_or_default()
    }

    /// Installs a fake interpreter under the given manager's tree.
    pub fn install_python(&self, manager: &str, version: &str) -> PathBuf {
        self.write_script(
            &format!("{manager}/installs/python/{version}/bin/python"),
            FAKE_PYTHON,
        )
    }

    /// Creates `work/<project>/.venv/bin/python` pointing at `interpreter`.
    pub fn environment(&self, project: &str, interpreter: &Path) -> PathBuf {
        let root = self.work().join(project).join(".venv");
        fs::create_dir_all(root.join("bin")).expect("venv bin");
        symlink(interpreter, root.join("bin/python")).expect("python link");
        root
    }

    pub fn touch(&self, rel: &str) -> PathBuf {
        let path = self.work().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "").expect("touch");
        path
    }

    pub fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("vefixer");
        cmd.current_dir(&self.root)
            .env("VEFIXER_MISE", self.root.join("tools/mise"))
            .env("VEFIXER_POETRY", self.root.join("tools/poetry"))
            .env("VEFIXER_TEST_LOG", self.log_path())
            .env("VEFIXER_TEST_MISE_ROOT", self.root.join("mise"))
            .env("XDG_DATA_HOME", self.root.join("data"))
            .env("NO_COLOR", "1")
            .env_remove("VEFIXER_COMMAND_TIMEOUT")
            .env_remove("VEFIXER_MAX_CAPTURE_BYTES");
        cmd
    }

    fn write_script(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, body).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod");
        path
    }
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn environments(payload: &Value) -> &Vec<Value> {
    payload["details"]["environments"]
        .as_array()
        .expect("environments array")
}
