//! Stub OpenSCAD executables for integration tests.
//!
//! Each stub answers `--version` like the real tool and then does one
//! scripted thing with the conversion request.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use svg2stl::ConversionConfig;

pub const LOGO_SVG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10">
  <rect x="1" y="1" width="8" height="8"/>
</svg>
"#;

/// Writes an STL that echoes its arguments, working directory and the
/// descriptor it was given.
pub const SUCCEEDS: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "OpenSCAD version 2021.01 (stub)"
  exit 0
fi
args="$*"
for arg in "$@"; do last="$arg"; done
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
{
  echo "solid stub"
  echo "args: $args"
  echo "cwd: $(pwd)"
  cat "$last"
  echo "endsolid stub"
} > "$out"
"#;

/// Complains on stderr and exits 1.
pub const FAILS: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "OpenSCAD version 2021.01 (stub)"
  exit 0
fi
echo "WARNING: ignoring unknown element" >&2
echo "ERROR: stub exploded" >&2
exit 1
"#;

/// Exits 0 but never writes the output file.
pub const SILENT: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "OpenSCAD version 2021.01 (stub)"
  exit 0
fi
echo "nothing to do"
exit 0
"#;

/// Fails even the version probe.
pub const BROKEN: &str = "#!/bin/sh\necho 'libGL missing' >&2\nexit 3\n";

/// Records its pid in `pid_file`, then never returns.
pub fn hangs(pid_file: &Path) -> String {
    format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo stub\n  exit 0\nfi\necho $$ > '{}'\nexec sleep 30\n",
        pid_file.display()
    )
}

/// Starts a background `sleep` without `exec`, records the sleeper's pid in
/// `pid_file` and waits on it, the way a wrapper script around the real
/// binary would.
pub fn forks_and_hangs(pid_file: &Path) -> String {
    format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo stub\n  exit 0\nfi\nsleep 30 &\necho $! > '{}'\nwait\n",
        pid_file.display()
    )
}

/// Fails straight away but leaves a background job holding stdout and
/// stderr; its pid goes to `pid_file`.
pub fn fails_leaving_a_job(pid_file: &Path) -> String {
    format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo stub\n  exit 0\nfi\nsleep 30 &\necho $! > '{}'\necho \"ERROR: gave up early\" >&2\nexit 1\n",
        pid_file.display()
    )
}

/// `true` while the pid in `pid_file` is a live process. Zombies waiting to
/// be reaped by their new parent do not count.
#[cfg(target_os = "linux")]
pub fn is_running(pid_file: &Path) -> bool {
    let pid = std::fs::read_to_string(pid_file).unwrap();
    match std::fs::read_to_string(format!("/proc/{}/stat", pid.trim())) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}

/// Wait up to two seconds for the process in `pid_file` to go away.
#[cfg(target_os = "linux")]
pub async fn assert_exits(pid_file: &Path) {
    for _ in 0..100 {
        if !is_running(pid_file) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("process in {} outlived its conversion", pid_file.display());
}

/// Write an executable script named `name` into `dir`.
pub fn write_stub(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A config whose only OpenSCAD candidate is `tool`.
pub fn config_for(tool: &Path) -> ConversionConfig {
    ConversionConfig::builder()
        .tool_candidates([tool])
        .build()
        .unwrap()
}

/// Sorted file names in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
