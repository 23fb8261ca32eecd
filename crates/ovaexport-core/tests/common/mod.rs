//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Path to the VMX fixture.
pub fn fixture_vmx() -> &'static Path {
    Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/test.vmx"
    ))
}

/// A scratch directory holding a copy of the fixture VMX and a fake `ovftool`.
pub struct Sandbox {
    pub dir: TempDir,
    pub vmx: PathBuf,
    pub tool: PathBuf,
}

impl Sandbox {
    /// The fake tool records its arguments one per line, prints `stdout`,
    /// writes `stderr` to standard error and exits with `exit_code`.
    #[cfg(unix)]
    pub fn new(stdout: &str, stderr: &str, exit_code: i32) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let vmx = dir.path().join("vm.vmx");
        std::fs::copy(fixture_vmx(), &vmx).unwrap();

        let tool = dir.path().join("ovftool");
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\nprintf '%s' '{}'\nprintf '%s' '{}' >&2\nexit {}\n",
            dir.path().join("args.txt").display(),
            stdout,
            stderr,
            exit_code
        );
        std::fs::write(&tool, script).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir, vmx, tool }
    }

    /// Arguments the fake tool was last called with, or `None` if it never ran.
    pub fn recorded_args(&self) -> Option<Vec<String>> {
        let text = std::fs::read_to_string(self.dir.path().join("args.txt")).ok()?;
        Some(text.lines().map(str::to_string).collect())
    }

    pub fn vmx_contents(&self) -> String {
        std::fs::read_to_string(&self.vmx).unwrap()
    }
}
